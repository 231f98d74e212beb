//! A first-fit memory allocator over a single fixed-size arena.
//!
//! This crate carves allocations out of one byte buffer that the host hands
//! over at startup and never resizes. All bookkeeping lives in two bounded
//! [`ChunkList`](chunk_list::ChunkList)s, so the allocator needs no memory of
//! its own beyond the [`Heap`](heap::Heap) value. The crate is `no_std` and
//! contains no `unsafe` code; allocations are addressed through opaque
//! [`HeapPtr`](heap::HeapPtr) handles.
//!
//! # Overview
//!
//! ```text
//!   arena (capacity C)
//!   ┌──────┬────────┬──────┬─────────────┬──────────────────────────┐
//!   │ used │  free  │ used │    free     │           free           │
//!   └──────┴────────┴──────┴─────────────┴──────────────────────────┘
//!    allocated list: [0..a)         [b..c)
//!    free list:             [a..b)         [c..d)  [d..C)
//! ```
//!
//! Every byte belongs to exactly one chunk of one list. Freed chunks are
//! appended to the free list as-is and coalesced with their neighbours at the
//! start of the next allocation.
//!
//! # Usage Examples
//!
//! ```rust
//! use allocator::heap::{AllocError, Heap};
//!
//! let mut arena = [0_u8; 100];
//! let mut heap = Heap::<'_, 4, 4>::new(&mut arena);
//!
//! let mut ptrs = Vec::new();
//! for size in [10, 20, 30, 40] {
//!     ptrs.push(heap.alloc(size).unwrap());
//! }
//!
//! // The arena is exhausted; this is recoverable.
//! assert!(matches!(heap.alloc(1), Err(AllocError::OutOfMemory { .. })));
//!
//! heap.free(ptrs[1]).unwrap();
//! heap.free(ptrs[2]).unwrap();
//!
//! // The two holes are coalesced before the search, so 50 bytes fit.
//! let ptr = heap.alloc(50).unwrap().unwrap();
//! assert_eq!(ptr.offset(), 10);
//! ```
//!
//! # Error Handling
//!
//! | Condition | Operation | Error | Recoverable |
//! |-----------|-----------|-------|-------------|
//! | No free chunk large enough | `alloc` | `AllocError::OutOfMemory` | yes |
//! | Allocated list full | `alloc` | `AllocError::ChunkListFull` | no (misconfiguration) |
//! | Unknown or already freed handle | `free` | `FreeError::InvalidPointer` | no (caller bug) |
//! | Free list full | `free` | `FreeError::ChunkListFull` | no (misconfiguration) |
//! | Any call | `collect` | `CollectError::Unsupported` | no |
//!
//! A failing call leaves both chunk lists as they were.
//!
//! ## Thread Safety
//!
//! `Heap` borrows its arena mutably and every mutating operation takes
//! `&mut self`. There is no internal locking; share it behind a mutex if
//! needed.

#![no_std]
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod heap;
