//! Static block allocator that partitions a single caller-supplied byte region into blocks
//! of equally sized chunks. It never calls into an underlying system allocator, which makes
//! it usable in `no_std` environments, bootstrap code, and services that need deterministic
//! allocation latency.
//!
//! The arena layout is fully determined by the order of [`Heap::create_block`] calls:
//!
//! ```text
//! | heap header | sentinel | block 0: header, bitmap, chunks | block 1: ... | unused |
//! ```
//!
//! Each allocation takes exactly one chunk. The block is chosen by a [`FitStrategy`] and the
//! chunk with the lowest free index within that block is used.
//!
//! ```rust
//! use static_block_allocator::{Heap, HeapError};
//!
//! let mut region = [0_u8; 4096];
//! let mut heap: Heap = Heap::new(&mut region).unwrap();
//! heap.create_block(8, 16).unwrap();
//! heap.create_block(32, 4).unwrap();
//!
//! // first-fit: the 32 byte block is the first one that can hold 20 bytes
//! let ptr = heap.allocate(20).unwrap();
//! assert_eq!(32, ptr.len());
//! heap.release(ptr.cast()).unwrap();
//! assert_eq!(Err(HeapError::DoubleFree), heap.release(ptr.cast()));
//! ```

#![no_std]
#![deny(
    clippy::all,
    clippy::nursery,
    // clippy::restriction,
    // clippy::pedantic
)]
// now allow a few rules which are denied by the above statement
#![allow(clippy::suboptimal_flops, clippy::redundant_pub_crate)]
#![deny(missing_debug_implementations)]
#![deny(rustdoc::all)]

mod bitmap;
mod block;
mod error;
mod fit;
mod heap;
mod locked;

pub use bitmap::bitmap_size;
pub use block::{block_footprint, BlockInfo, BLOCK_HEADER_SIZE, HEAP_HEADER_SIZE};
pub use error::*;
pub use fit::*;
pub use heap::*;
pub use locked::*;

#[cfg(test)]
#[macro_use]
extern crate std;
