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
//! Module for [`Block`] and [`BlockInfo`].
//!
//! A block occupies a contiguous range of the arena:
//!
//! ```text
//! |  header  |  bitmap (ceil(amt/8))  |  payload (amt * size)  |
//! ^ offset                                                     ^ end = offset of next block
//! ```
//!
//! The header stores the offset of the next block (u64, little endian, 0 = none), followed
//! by the chunk size and the chunk amount.

use crate::bitmap::bitmap_size;
use crate::HeapError;
use core::ops::Range;

/// Size of the heap header at the beginning of the arena: capacity (u64) and the offset
/// of the first block (u64), both little endian.
pub const HEAP_HEADER_SIZE: usize = 16;

/// Size of the header that precedes the bitmap of every block.
pub const BLOCK_HEADER_SIZE: usize = 10;

/// Returns the number of arena bytes a block with the given geometry occupies,
/// header and bitmap included.
#[inline]
pub const fn block_footprint(chunk_size: u8, chunk_amt: u8) -> usize {
    BLOCK_HEADER_SIZE + bitmap_size(chunk_amt) + chunk_size as usize * chunk_amt as usize
}

/// Descriptor of a block inside the arena. All addresses are offsets relative to the
/// beginning of the arena.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) struct Block {
    offset: usize,
    chunk_size: u8,
    chunk_amt: u8,
}

impl Block {
    /// The empty block that heads every block sequence. It directly follows the heap header.
    pub const SENTINEL: Self = Self::new(HEAP_HEADER_SIZE, 0, 0);

    #[inline]
    pub const fn new(offset: usize, chunk_size: u8, chunk_amt: u8) -> Self {
        Self {
            offset,
            chunk_size,
            chunk_amt,
        }
    }

    #[inline]
    pub const fn offset(&self) -> usize {
        self.offset
    }

    #[inline]
    pub const fn chunk_size(&self) -> u8 {
        self.chunk_size
    }

    #[inline]
    pub const fn chunk_amt(&self) -> u8 {
        self.chunk_amt
    }

    /// Range of the occupancy bitmap inside the arena.
    #[inline]
    pub const fn bitmap_range(&self) -> Range<usize> {
        let begin = self.offset + BLOCK_HEADER_SIZE;
        begin..begin + bitmap_size(self.chunk_amt)
    }

    /// Range of the chunks inside the arena. The upper bound is exclusive.
    #[inline]
    pub const fn payload_range(&self) -> Range<usize> {
        let begin = self.bitmap_range().end;
        begin..begin + self.chunk_size as usize * self.chunk_amt as usize
    }

    /// Offset of the first byte after this block, i.e. where the next block begins.
    #[inline]
    pub const fn end(&self) -> usize {
        self.offset + block_footprint(self.chunk_size, self.chunk_amt)
    }

    /// Returns the arena offset of the chunk with the given index.
    #[inline(always)]
    pub fn chunk_offset(&self, chunk_index: u8) -> usize {
        debug_assert!(
            chunk_index < self.chunk_amt,
            "chunk_index={} is bigger than max chunk index={}",
            chunk_index,
            self.chunk_amt.wrapping_sub(1)
        );
        self.payload_range().start + chunk_index as usize * self.chunk_size as usize
    }

    /// Returns whether the arena offset lies in the payload of this block.
    #[inline]
    pub fn contains(&self, offset: usize) -> bool {
        self.payload_range().contains(&offset)
    }

    /// Returns the chunk index of the given arena offset, which must point to the
    /// beginning of a chunk.
    pub fn chunk_index_of(&self, offset: usize) -> Result<u8, HeapError> {
        if !self.contains(offset) {
            return Err(HeapError::InvalidAddress);
        }
        let relative = offset - self.payload_range().start;
        let chunk_size = self.chunk_size as usize;
        if relative % chunk_size != 0 {
            return Err(HeapError::InvalidAddress);
        }
        Ok((relative / chunk_size) as u8)
    }

    /// Range of the block header inside the arena.
    #[inline]
    pub const fn header_range(&self) -> Range<usize> {
        self.offset..self.offset + BLOCK_HEADER_SIZE
    }

    /// Writes the header of this block. The block has no successor yet.
    ///
    /// The headers make the arena self-describing for external tools; nothing in this crate
    /// parses them back, all operations work on the descriptors.
    pub fn write_header(&self, header: &mut [u8]) {
        debug_assert_eq!(header.len(), BLOCK_HEADER_SIZE);
        header[..8].copy_from_slice(&0_u64.to_le_bytes());
        header[8] = self.chunk_size;
        header[9] = self.chunk_amt;
    }

    /// Links this block to its successor. `header` is the header of this block.
    pub fn write_next(&self, header: &mut [u8], next: &Self) {
        debug_assert_eq!(header.len(), BLOCK_HEADER_SIZE);
        header[..8].copy_from_slice(&(next.offset as u64).to_le_bytes());
    }
}

/// Read-only snapshot of a block, as returned by [`crate::Heap::blocks`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct BlockInfo {
    chunk_size: u8,
    chunk_amt: u8,
    free_chunks: u8,
}

impl BlockInfo {
    #[inline]
    pub(crate) const fn new(chunk_size: u8, chunk_amt: u8, free_chunks: u8) -> Self {
        Self {
            chunk_size,
            chunk_amt,
            free_chunks,
        }
    }

    /// Size of each chunk in bytes.
    #[inline]
    pub const fn chunk_size(&self) -> u8 {
        self.chunk_size
    }

    /// Number of chunks of the block.
    #[inline]
    pub const fn chunk_amt(&self) -> u8 {
        self.chunk_amt
    }

    /// Number of chunks that are currently free.
    #[inline]
    pub const fn free_chunks(&self) -> u8 {
        self.free_chunks
    }

    #[inline]
    pub const fn used_chunks(&self) -> u8 {
        self.chunk_amt - self.free_chunks
    }

    /// Returns the usage of the block in percentage rounded to two decimal places.
    pub fn usage(&self) -> f32 {
        if self.used_chunks() == 0 {
            0.0
        } else {
            let ratio = self.used_chunks() as f32 / self.chunk_amt as f32;
            libm::roundf(ratio * 10000.0) / 100.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentinel_is_empty() {
        let sentinel = Block::SENTINEL;
        assert_eq!(HEAP_HEADER_SIZE, sentinel.offset());
        assert!(sentinel.bitmap_range().is_empty());
        assert!(sentinel.payload_range().is_empty());
        assert_eq!(HEAP_HEADER_SIZE + BLOCK_HEADER_SIZE, sentinel.end());
        assert!(!sentinel.contains(sentinel.end()));
    }

    #[test]
    fn test_geometry() {
        // 12 chunks need two bitmap bytes
        let block = Block::new(100, 8, 12);
        assert_eq!(110..112, block.bitmap_range());
        assert_eq!(112..208, block.payload_range());
        assert_eq!(208, block.end());
        assert_eq!(block.end() - block.offset(), block_footprint(8, 12));
        assert_eq!(112, block.chunk_offset(0));
        assert_eq!(120, block.chunk_offset(1));
        assert_eq!(200, block.chunk_offset(11));
    }

    #[test]
    fn test_chunk_index_of() {
        let block = Block::new(0, 8, 4);
        let base = block.payload_range().start;
        assert_eq!(Ok(0), block.chunk_index_of(base));
        assert_eq!(Ok(3), block.chunk_index_of(base + 24));
        assert_eq!(Err(HeapError::InvalidAddress), block.chunk_index_of(base + 3));
        assert_eq!(Err(HeapError::InvalidAddress), block.chunk_index_of(base - 1));
        // one past the end belongs to the next block
        assert_eq!(Err(HeapError::InvalidAddress), block.chunk_index_of(base + 32));
    }

    #[test]
    fn test_header_encoding() {
        let mut arena = [0xaa_u8; 64];
        let first = Block::new(4, 3, 2);
        let second = Block::new(first.end(), 1, 1);
        assert_eq!(4..14, first.header_range());
        first.write_header(&mut arena[first.header_range()]);
        assert_eq!([0_u8, 0, 0, 0, 0, 0, 0, 0, 3, 2], arena[4..14]);
        first.write_next(&mut arena[first.header_range()], &second);
        assert_eq!(first.end() as u64, u64::from_le_bytes(arena[4..12].try_into().unwrap()));
        assert_eq!([3_u8, 2], arena[12..14]);
        assert!(arena[..4].iter().chain(&arena[14..]).all(|b| *b == 0xaa));
    }

    #[test]
    fn test_block_info_usage() {
        assert_eq!(0.0, BlockInfo::new(8, 16, 16).usage());
        assert_eq!(25.0, BlockInfo::new(8, 16, 12).usage());
        assert_eq!(100.0, BlockInfo::new(8, 16, 0).usage());
        assert_eq!(33.33, BlockInfo::new(8, 3, 2).usage());
        assert_eq!(1, BlockInfo::new(8, 3, 2).used_chunks());
    }
}
