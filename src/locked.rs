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
//! Module for [`LockedHeap`].

use crate::{Heap, HeapError, DEFAULT_MAX_BLOCKS};
use core::ptr::NonNull;

/// Synchronized high-level wrapper around [`Heap`] for callers that share one heap between
/// threads. A single spin lock guards the whole heap, because the bitmap bits of
/// neighboring chunks can't be updated independently.
///
/// ```rust
/// use static_block_allocator::{Heap, LockedHeap};
///
/// let mut region = [0_u8; 1024];
/// let heap: LockedHeap = LockedHeap::new(Heap::new(&mut region).unwrap());
/// heap.create_block(16, 8).unwrap();
///
/// let ptr = heap.allocate(10).unwrap();
/// assert_eq!(12.5, heap.usage());
/// heap.release(ptr.cast()).unwrap();
/// ```
#[derive(Debug)]
pub struct LockedHeap<'a, const MAX_BLOCKS: usize = DEFAULT_MAX_BLOCKS>(
    spin::Mutex<Heap<'a, MAX_BLOCKS>>,
);

impl<'a, const MAX_BLOCKS: usize> LockedHeap<'a, MAX_BLOCKS> {
    #[inline]
    pub const fn new(heap: Heap<'a, MAX_BLOCKS>) -> Self {
        Self(spin::Mutex::new(heap))
    }

    /// Locks the heap for a sequence of operations that must not interleave with other
    /// callers.
    #[inline]
    pub fn lock(&self) -> spin::MutexGuard<'_, Heap<'a, MAX_BLOCKS>> {
        self.0.lock()
    }

    /// Wrapper around [`Heap::create_block`].
    #[inline]
    pub fn create_block(&self, chunk_size: u8, chunk_amt: u8) -> Result<(), HeapError> {
        self.0.lock().create_block(chunk_size, chunk_amt)
    }

    /// Wrapper around [`Heap::allocate`].
    #[inline]
    #[must_use = "The pointer must be used and released eventually to prevent memory leaks."]
    pub fn allocate(&self, size: usize) -> Result<NonNull<[u8]>, HeapError> {
        self.0.lock().allocate(size)
    }

    /// Wrapper around [`Heap::release`].
    #[inline]
    pub fn release(&self, ptr: NonNull<u8>) -> Result<(), HeapError> {
        self.0.lock().release(ptr)
    }

    /// Wrapper around [`Heap::usage`].
    #[inline]
    pub fn usage(&self) -> f32 {
        self.0.lock().usage()
    }

    /// Returns the inner heap.
    #[inline]
    pub fn into_inner(self) -> Heap<'a, MAX_BLOCKS> {
        self.0.into_inner()
    }
}
