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
//! Bit-level bookkeeping for the chunks of a single block.
//!
//! A bitmap is a packed occupancy vector: chunk `i` is described by bit `i % 8` of
//! byte `i / 8`. A set bit means "occupied", a cleared bit means "free". The last byte
//! may only be partially used; its padding bits are never reported as free chunks.

/// Returns the number of bytes required to describe `chunk_amt` chunks.
///
/// Uses ceiling division. A truncated size would let the payload of a block overlap the
/// last partial bitmap byte.
#[inline]
pub const fn bitmap_size(chunk_amt: u8) -> usize {
    (chunk_amt as usize + 7) / 8
}

/// Returns the indices into the bitmap array of a given chunk index.
#[inline(always)]
pub(crate) const fn index_to_bitmap_indices(chunk_index: u8) -> (usize, u8) {
    ((chunk_index / 8) as usize, chunk_index % 8)
}

/// Returns whether a chunk is free according to the bitmap.
#[inline(always)]
pub(crate) fn is_free(bitmap: &[u8], chunk_index: u8) -> bool {
    let (byte_i, bit) = index_to_bitmap_indices(chunk_index);
    (bitmap[byte_i] >> bit) & 1 == 0
}

/// Marks a chunk as used, i.e. write a 1 into the bitmap at the right position.
#[inline(always)]
pub(crate) fn mark_used(bitmap: &mut [u8], chunk_index: u8) {
    let (byte_i, bit) = index_to_bitmap_indices(chunk_index);
    bitmap[byte_i] |= 1 << bit;
}

/// Marks a chunk as free, i.e. write a 0 into the bitmap at the right position.
#[inline(always)]
pub(crate) fn mark_free(bitmap: &mut [u8], chunk_index: u8) {
    let (byte_i, bit) = index_to_bitmap_indices(chunk_index);
    bitmap[byte_i] &= !(1 << bit);
}

/// Mask of the bits in byte `byte_i` that describe real chunks.
#[inline(always)]
const fn valid_bits_mask(byte_i: usize, chunk_amt: u8) -> u8 {
    let remaining = chunk_amt as usize - byte_i * 8;
    if remaining >= 8 {
        0xff
    } else {
        (1_u8 << remaining) - 1
    }
}

/// Counts the free chunks among exactly `chunk_amt` bits.
pub(crate) fn count_free(bitmap: &[u8], chunk_amt: u8) -> u8 {
    debug_assert_eq!(bitmap.len(), bitmap_size(chunk_amt));
    let free = bitmap
        .iter()
        .enumerate()
        .map(|(byte_i, byte)| (!byte & valid_bits_mask(byte_i, chunk_amt)).count_ones())
        .sum::<u32>();
    // at most chunk_amt bits can be counted
    free as u8
}

/// Counts the occupied chunks among exactly `chunk_amt` bits.
#[inline]
pub(crate) fn count_used(bitmap: &[u8], chunk_amt: u8) -> u8 {
    chunk_amt - count_free(bitmap, chunk_amt)
}

/// Returns the lowest index of a free chunk or `None` if the block is full.
///
/// `None` is used instead of a sentinel index because `chunk_amt` may be 255, which
/// leaves no spare value in the `u8` index domain.
pub(crate) fn first_free(bitmap: &[u8], chunk_amt: u8) -> Option<u8> {
    debug_assert_eq!(bitmap.len(), bitmap_size(chunk_amt));
    bitmap
        .iter()
        .enumerate()
        .map(|(byte_i, byte)| (byte_i, !byte & valid_bits_mask(byte_i, chunk_amt)))
        .find(|(_, free_bits)| *free_bits != 0)
        .map(|(byte_i, free_bits)| (byte_i * 8 + free_bits.trailing_zeros() as usize) as u8)
}
