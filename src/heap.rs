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
//! Module for [`Heap`].

use crate::bitmap;
use crate::block::{Block, BLOCK_HEADER_SIZE, HEAP_HEADER_SIZE};
use crate::{BlockInfo, FitStrategy, HeapError};
use core::marker::PhantomData;
use core::ops::Range;
use core::ptr::NonNull;
use core::slice;

/// Default maximum number of blocks of a [`Heap`], including the empty block that heads the
/// block sequence.
pub const DEFAULT_MAX_BLOCKS: usize = 32;

/// Allocator that partitions a caller-supplied arena into blocks of equally sized chunks.
///
/// The arena starts with a heap header followed by an empty sentinel block. Each call to
/// [`Self::create_block`] appends a block directly behind the previous one. A block consists
/// of a header, an occupancy bitmap with one bit per chunk, and the chunks themselves.
/// Allocations take a single chunk from the block chosen by the [`FitStrategy`].
///
/// The heap never returns memory to anyone; it lives as long as the borrowed arena. It is not
/// synchronized. See [`crate::LockedHeap`] if it must be shared.
///
/// `MAX_BLOCKS` is the capacity of the block descriptor table, the sentinel block included.
///
/// The heap only accesses headers and bitmaps after initialization. Chunk payloads belong to
/// the callers that allocated them, so returned pointers stay valid across later heap calls
/// until they are released.
#[derive(Debug)]
pub struct Heap<'a, const MAX_BLOCKS: usize = DEFAULT_MAX_BLOCKS> {
    /// Beginning of the backing memory. All chunk pointers are derived from it.
    base: NonNull<u8>,
    /// Length of the backing memory in bytes.
    capacity: usize,
    /// Block descriptors in creation order. Index 0 is the sentinel.
    blocks: [Block; MAX_BLOCKS],
    /// Number of valid entries in `blocks`, sentinel included.
    block_count: usize,
    /// Strategy used by [`Self::allocate`].
    fit_strategy: FitStrategy,
    /// The heap exclusively borrows the backing memory.
    _region: PhantomData<&'a mut [u8]>,
}

// SAFETY: the heap has exclusive access to its backing memory for `'a`, just like the
// `&'a mut [u8]` it was created from, which is `Send`.
unsafe impl<const MAX_BLOCKS: usize> Send for Heap<'_, MAX_BLOCKS> {}

impl<'a, const MAX_BLOCKS: usize> Heap<'a, MAX_BLOCKS> {
    /// Creates a heap that uses the whole region as arena. See [`Self::init`].
    #[inline]
    pub fn new(region: &'a mut [u8]) -> Result<Self, HeapError> {
        let size = region.len();
        Self::init(region, size)
    }

    /// Creates a heap over the first `size` bytes of `region`.
    ///
    /// Zeroes the arena, writes the heap header and the empty sentinel block. Fails with
    /// [`HeapError::CapacityExceeded`] if the region is smaller than `size` or `size` can't
    /// hold the heap header and the sentinel block.
    pub fn init(region: &'a mut [u8], size: usize) -> Result<Self, HeapError> {
        if size > region.len() {
            log::error!(
                "heap size {} exceeds the provided region of {} bytes",
                size,
                region.len()
            );
            return Err(HeapError::CapacityExceeded);
        }
        if size < HEAP_HEADER_SIZE + BLOCK_HEADER_SIZE || MAX_BLOCKS == 0 {
            log::error!("heap size {} is too small for the heap bookkeeping", size);
            return Err(HeapError::CapacityExceeded);
        }

        let arena = &mut region[..size];
        arena.fill(0);
        arena[..8].copy_from_slice(&(size as u64).to_le_bytes());
        let first_block = Block::SENTINEL.offset() as u64;
        arena[8..HEAP_HEADER_SIZE].copy_from_slice(&first_block.to_le_bytes());
        Block::SENTINEL.write_header(&mut arena[Block::SENTINEL.header_range()]);

        let base = NonNull::from(arena).cast::<u8>();
        log::debug!("initialized heap: capacity={}byte, arena={:?}", size, base);

        Ok(Self {
            base,
            capacity: size,
            blocks: [Block::SENTINEL; MAX_BLOCKS],
            block_count: 1,
            fit_strategy: FitStrategy::default(),
            _region: PhantomData,
        })
    }

    /// Capacity in bytes of the heap, headers included.
    #[inline]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    pub const fn fit_strategy(&self) -> FitStrategy {
        self.fit_strategy
    }

    /// Sets the strategy used by [`Self::allocate`].
    #[inline]
    pub fn set_fit_strategy(&mut self, fit_strategy: FitStrategy) {
        self.fit_strategy = fit_strategy;
    }

    /// Returns the number of created blocks. The sentinel block is not counted.
    #[inline]
    pub const fn block_count(&self) -> usize {
        self.block_count - 1
    }

    /// Returns a snapshot of the block at `index` (creation order, starting at 0).
    pub fn block(&self, index: usize) -> Option<BlockInfo> {
        self.created_blocks().get(index).map(|block| self.info(block))
    }

    /// Returns snapshots of all blocks in creation order.
    pub fn blocks(&self) -> impl Iterator<Item = BlockInfo> + '_ {
        self.created_blocks().iter().map(|block| self.info(block))
    }

    /// Number of arena bytes behind the last block that are not yet used by any block.
    #[inline]
    pub fn free_bytes_remaining(&self) -> usize {
        self.capacity() - self.tail().end()
    }

    /// Total number of chunks over all blocks.
    pub fn chunk_count(&self) -> usize {
        self.blocks().map(|info| info.chunk_amt() as usize).sum()
    }

    /// Number of chunks that are currently in use over all blocks.
    pub fn chunks_in_use(&self) -> usize {
        self.created_blocks()
            .iter()
            .map(|block| bitmap::count_used(self.bitmap(block), block.chunk_amt()) as usize)
            .sum()
    }

    /// Returns the current chunk usage in percentage rounded to two decimal places.
    pub fn usage(&self) -> f32 {
        let chunks_in_use = self.chunks_in_use();
        if chunks_in_use == 0 {
            0.0
        } else {
            let ratio = chunks_in_use as f32 / self.chunk_count() as f32;
            libm::roundf(ratio * 10000.0) / 100.0
        }
    }

    /// Returns whether the pointer lies inside the payload of any block.
    pub fn contains(&self, ptr: *const u8) -> bool {
        self.ptr_to_offset(ptr)
            .is_some_and(|offset| self.created_blocks().iter().any(|block| block.contains(offset)))
    }

    /// Appends a new block with `chunk_amt` chunks of `chunk_size` bytes each directly behind
    /// the last block. All chunks of the new block are free.
    ///
    /// Fails with [`HeapError::Unsupported`] for an empty geometry and with
    /// [`HeapError::CapacityExceeded`] if the block doesn't fit into the arena or the block
    /// table is full. The table holds `MAX_BLOCKS - 1` blocks, so this error can occur while
    /// the arena still has room. A failed call doesn't modify the heap.
    pub fn create_block(&mut self, chunk_size: u8, chunk_amt: u8) -> Result<(), HeapError> {
        log::trace!(
            "called create_block: chunk_size={}, chunk_amt={}",
            chunk_size,
            chunk_amt
        );
        if chunk_size == 0 || chunk_amt == 0 {
            return Err(HeapError::Unsupported);
        }
        if self.block_count == MAX_BLOCKS {
            log::warn!("block table is full: {} blocks", MAX_BLOCKS);
            return Err(HeapError::CapacityExceeded);
        }

        let tail = self.tail();
        let block = Block::new(tail.end(), chunk_size, chunk_amt);
        if block.end() > self.capacity() {
            log::warn!(
                "block of {}byte doesn't fit; only {}byte remaining",
                block.end() - block.offset(),
                self.free_bytes_remaining()
            );
            return Err(HeapError::CapacityExceeded);
        }

        block.write_header(self.bytes_mut(block.header_range()));
        // this part of the arena may contain leftovers of earlier use
        self.bytes_mut(block.bitmap_range()).fill(0);
        tail.write_next(self.bytes_mut(tail.header_range()), &block);

        self.blocks[self.block_count] = block;
        self.block_count += 1;

        log::debug!(
            "created block #{}: offset={}, chunk_size={}, chunk_amt={}, end={}",
            self.block_count() - 1,
            block.offset(),
            chunk_size,
            chunk_amt,
            block.end()
        );
        Ok(())
    }

    /// Allocates one chunk of at least `size` bytes with the configured [`FitStrategy`].
    ///
    /// The returned slice spans the whole chunk. Its content is not zeroed. Zero sized
    /// requests are served like requests of one byte.
    #[inline]
    #[must_use = "The pointer must be used and released eventually to prevent memory leaks."]
    pub fn allocate(&mut self, size: usize) -> Result<NonNull<[u8]>, HeapError> {
        self.allocate_with(size, self.fit_strategy)
    }

    /// Like [`Self::allocate`] but with an explicit [`FitStrategy`].
    ///
    /// Fails with [`HeapError::Unsupported`] if no block has a chunk size of at least `size`
    /// and with [`HeapError::OutOfMemory`] if all such blocks are full.
    #[must_use = "The pointer must be used and released eventually to prevent memory leaks."]
    pub fn allocate_with(
        &mut self,
        size: usize,
        fit_strategy: FitStrategy,
    ) -> Result<NonNull<[u8]>, HeapError> {
        log::trace!("called allocate: size={}, strategy={:?}", size, fit_strategy);
        let size = size.max(1);

        let selected = fit_strategy.select(
            self.blocks().enumerate().map(|(i, info)| (i + 1, info)),
            size,
        );
        let block = match selected {
            Some(index) => self.blocks[index],
            None => {
                let error = if self.blocks().any(|info| info.chunk_size() as usize >= size) {
                    HeapError::OutOfMemory
                } else {
                    HeapError::Unsupported
                };
                log::warn!(
                    "{}: can't serve {}byte. Current usage is: {}%",
                    error,
                    size,
                    self.usage()
                );
                return Err(error);
            }
        };

        let bitmap = self.bytes_mut(block.bitmap_range());
        // an eligible block always has a free chunk
        let chunk_index =
            bitmap::first_free(bitmap, block.chunk_amt()).ok_or(HeapError::OutOfMemory)?;
        bitmap::mark_used(bitmap, chunk_index);

        let offset = block.chunk_offset(chunk_index);
        // SAFETY: the chunk lies inside the arena (checked by create_block) and the base
        // pointer is not null.
        let chunk = unsafe { NonNull::new_unchecked(self.base.as_ptr().add(offset)) };
        let ptr = NonNull::slice_from_raw_parts(chunk, block.chunk_size() as usize);
        log::trace!(
            "alloc: size={}, ptr={:?}, chunk={}, chunk_size={}",
            size,
            ptr.cast::<u8>(),
            chunk_index,
            block.chunk_size()
        );
        Ok(ptr)
    }

    /// Releases the chunk that begins at `ptr`.
    ///
    /// The pointer is never dereferenced. It must be the exact address returned by
    /// [`Self::allocate`]; pointers into the middle of a chunk are rejected with
    /// [`HeapError::InvalidAddress`], as are pointers outside of all block payloads.
    /// Releasing a free chunk fails with [`HeapError::DoubleFree`].
    pub fn release(&mut self, ptr: NonNull<u8>) -> Result<(), HeapError> {
        log::trace!("called release: ptr={:?}", ptr);
        let res = self.release_chunk(ptr.as_ptr());
        if let Err(error) = res {
            log::warn!("release of {:?} rejected: {}", ptr, error);
        }
        res
    }

    fn release_chunk(&mut self, ptr: *const u8) -> Result<(), HeapError> {
        let offset = self.ptr_to_offset(ptr).ok_or(HeapError::InvalidAddress)?;
        // payload ranges have exclusive upper bounds; the first block that contains the
        // offset is the only one
        let block = *self
            .created_blocks()
            .iter()
            .find(|block| block.contains(offset))
            .ok_or(HeapError::InvalidAddress)?;
        let chunk_index = block.chunk_index_of(offset)?;

        let bitmap = self.bytes_mut(block.bitmap_range());
        if bitmap::is_free(bitmap, chunk_index) {
            return Err(HeapError::DoubleFree);
        }
        bitmap::mark_free(bitmap, chunk_index);
        log::trace!("dealloc: ptr={:?}, chunk={}", ptr, chunk_index);
        Ok(())
    }

    /// All blocks except the sentinel.
    #[inline(always)]
    fn created_blocks(&self) -> &[Block] {
        &self.blocks[1..self.block_count]
    }

    #[inline(always)]
    fn tail(&self) -> Block {
        self.blocks[self.block_count - 1]
    }

    #[inline(always)]
    fn bitmap(&self, block: &Block) -> &[u8] {
        self.bytes(block.bitmap_range())
    }

    /// Bookkeeping bytes (headers, bitmaps) of the arena. Never used for chunk payloads.
    #[inline(always)]
    fn bytes(&self, range: Range<usize>) -> &[u8] {
        debug_assert!(range.start <= range.end && range.end <= self.capacity);
        // SAFETY: the range lies inside the exclusively borrowed arena and doesn't overlap
        // any chunk that was handed out.
        unsafe { slice::from_raw_parts(self.base.as_ptr().add(range.start), range.len()) }
    }

    /// Mutable version of [`Self::bytes`].
    #[inline(always)]
    fn bytes_mut(&mut self, range: Range<usize>) -> &mut [u8] {
        debug_assert!(range.start <= range.end && range.end <= self.capacity);
        // SAFETY: see `bytes`; `&mut self` guarantees there is no other view of the range.
        unsafe { slice::from_raw_parts_mut(self.base.as_ptr().add(range.start), range.len()) }
    }

    fn info(&self, block: &Block) -> BlockInfo {
        BlockInfo::new(
            block.chunk_size(),
            block.chunk_amt(),
            bitmap::count_free(self.bitmap(block), block.chunk_amt()),
        )
    }

    /// Returns the arena offset of the pointer, if it points into the arena.
    #[inline(always)]
    fn ptr_to_offset(&self, ptr: *const u8) -> Option<usize> {
        let arena_begin = self.base.as_ptr() as usize;
        let offset = (ptr as usize).checked_sub(arena_begin)?;
        (offset < self.capacity()).then_some(offset)
    }
}
