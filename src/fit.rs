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
//! Module for [`FitStrategy`].

use crate::BlockInfo;
use core::cmp::Reverse;

/// Policy that selects the block which serves an allocation request.
///
/// All strategies only consider eligible blocks, i.e. blocks with a chunk size of at least
/// the requested size and at least one free chunk. They differ in which eligible block wins.
/// Ties are always resolved in favor of the block that was created first.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum FitStrategy {
    /// The first eligible block in creation order.
    #[default]
    FirstFit,
    /// The eligible block with the smallest chunk size. Minimizes the unused bytes per
    /// chunk but always scans all blocks.
    BestFit,
    /// The eligible block with the most free chunks. Spreads allocations across blocks.
    WorstFit,
}

impl FitStrategy {
    /// Whether a block can serve a request of `size` bytes at all.
    #[inline]
    pub(crate) fn is_eligible(info: &BlockInfo, size: usize) -> bool {
        info.chunk_size() as usize >= size && info.free_chunks() > 0
    }

    /// Returns the position of the selected block in `blocks` or `None` if no block is
    /// eligible. `blocks` must yield the blocks in creation order.
    pub(crate) fn select<I>(self, blocks: I, size: usize) -> Option<usize>
    where
        I: Iterator<Item = (usize, BlockInfo)>,
    {
        let mut eligible = blocks.filter(|(_, info)| Self::is_eligible(info, size));
        let selected = match self {
            Self::FirstFit => eligible.next(),
            Self::BestFit => eligible.min_by_key(|(_, info)| info.chunk_size()),
            // min_by_key keeps the first of equal elements, max_by_key the last one
            Self::WorstFit => eligible.min_by_key(|(_, info)| Reverse(info.free_chunks())),
        };
        selected.map(|(index, _)| index)
    }
}
