/*
MIT License

Copyright (c) 2022 Philipp Schuster

Permission is hereby granted, free of charge, to any person obtaining a copy
of this software and associated documentation files (the "Software"), to deal
in the Software without restriction, including without limitation the rights
to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
copies of the Software, and to permit persons to whom the Software is
furnished to do so, subject to the following conditions:

The above copyright notice and this permission notice shall be included in all
copies or substantial portions of the Software.

THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
SOFTWARE.
*/
//! Module for [`HeapError`].

use core::fmt;

/// Possible errors of [`crate::Heap`].
///
/// All errors are structural: retrying the same operation on an unchanged heap yields the
/// same error again.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum HeapError {
    /// The arena is too small for the heap header and the initial empty block, or a new
    /// block (or its descriptor) doesn't fit into the remaining arena.
    CapacityExceeded,
    /// There are blocks with a big enough chunk size, but all of their chunks are in use.
    OutOfMemory,
    /// The requested size is bigger than every chunk size of the heap, or a block
    /// geometry with a chunk size or chunk amount of zero was requested.
    Unsupported,
    /// The address doesn't belong to the payload of any block, or it doesn't point to the
    /// beginning of a chunk.
    InvalidAddress,
    /// The chunk behind the address is already free.
    DoubleFree,
}

impl fmt::Display for HeapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            Self::CapacityExceeded => "arena capacity exceeded",
            Self::OutOfMemory => "out of memory",
            Self::Unsupported => "unsupported size or block geometry",
            Self::InvalidAddress => "address is not the base of a chunk",
            Self::DoubleFree => "chunk is already free",
        };
        f.write_str(msg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::string::ToString;

    #[test]
    fn test_display() {
        assert_eq!("out of memory", HeapError::OutOfMemory.to_string());
        assert_eq!("chunk is already free", HeapError::DoubleFree.to_string());
    }
}
