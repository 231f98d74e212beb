//! First-fit allocator over a fixed arena.
//!
//! This module provides [`Heap`], an allocator that carves allocations out of
//! a single caller-supplied byte buffer and records its bookkeeping in two
//! bounded [`ChunkList`]s, one for allocated ranges and one for free ranges.
//!
//! # Algorithm
//!
//! - **Allocation**: coalesces the free list, then takes the lowest-addressed
//!   free chunk that is large enough (**first-fit**). The chunk is split; the
//!   leading part becomes the allocation and the tail, if any, stays free.
//! - **Deallocation**: looks the handle up in the allocated list and moves
//!   the chunk to the free list as-is. Merging with free neighbours is left to
//!   the next allocation.
//! - **Coalescing**: a single left-to-right pass over the free list that folds
//!   each chunk into its predecessor when the two touch.
//!
//! Every byte of the arena always belongs to exactly one chunk of one of the
//! two lists.
//!
//! # Usage Example
//!
//! ```rust
//! use allocator::heap::Heap;
//!
//! let mut arena = [0_u8; 64];
//! let mut heap = Heap::<'_, 8, 8>::new(&mut arena);
//!
//! let ptr = heap.alloc(16).unwrap().unwrap();
//! heap.bytes_mut(ptr).unwrap().fill(0xaa);
//! assert_eq!(heap.bytes(ptr).unwrap(), &[0xaa; 16]);
//!
//! heap.free(Some(ptr)).unwrap();
//! assert_eq!(heap.stats().free_bytes, 64);
//! ```
//!
//! # Performance Characteristics
//!
//! - **Allocation**: O(n) in the number of free chunks
//! - **Deallocation**: O(log n + k), a binary search plus the shifting done by
//!   the two list updates
//! - **Memory Overhead**: none inside the arena; bookkeeping lives in the
//!   fixed-size lists
//!
//! # Thread Safety
//!
//! Every mutating operation takes `&mut self`; callers serialise access.

use core::fmt;

use chunk_list::{Chunk, ChunkList};
use snafu::{OptionExt as _, Snafu, ensure};
use snafu_utils::{HasLocation, Location};

/// Arena size used by the demo workload.
pub const DEFAULT_HEAP_CAPACITY: usize = 640_000;

/// Number of chunks each list of a [`DefaultHeap`] can track.
pub const DEFAULT_CHUNK_LIST_CAPACITY: usize = 1024;

pub type DefaultHeap<'a> = Heap<'a, DEFAULT_CHUNK_LIST_CAPACITY, DEFAULT_CHUNK_LIST_CAPACITY>;

/// Names one of the two chunk lists of a [`Heap`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display, derive_more::IsVariant)]
pub enum ListKind {
    #[display("allocated")]
    Allocated,
    #[display("free")]
    Free,
}

/// Errors returned by [`Heap::alloc`].
#[derive(Debug, Snafu, derive_more::IsVariant)]
#[snafu(module)]
pub enum AllocError {
    #[snafu(display(
        "out of memory: requested={requested}, largest_free={largest_free}"
    ))]
    OutOfMemory {
        requested: usize,
        largest_free: usize,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("{list} chunk list is full: capacity={capacity}"))]
    ChunkListFull {
        list: ListKind,
        capacity: usize,
        #[snafu(implicit)]
        location: Location,
    },
}

/// Errors returned by [`Heap::free`].
#[derive(Debug, Snafu, derive_more::IsVariant)]
#[snafu(module)]
pub enum FreeError {
    #[snafu(display("double free or invalid pointer: ptr={ptr}"))]
    InvalidPointer {
        ptr: HeapPtr,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("{list} chunk list is full: capacity={capacity}"))]
    ChunkListFull {
        list: ListKind,
        capacity: usize,
        #[snafu(implicit)]
        location: Location,
    },
}

/// Errors returned by [`Heap::collect`].
#[derive(Debug, Snafu)]
#[snafu(module)]
pub enum CollectError {
    #[snafu(display("garbage collection is not implemented"))]
    Unsupported {
        #[snafu(implicit)]
        location: Location,
    },
}

impl HasLocation for AllocError {
    fn location(&self) -> Location {
        match self {
            Self::OutOfMemory { location, .. } | Self::ChunkListFull { location, .. } => *location,
        }
    }
}

impl HasLocation for FreeError {
    fn location(&self) -> Location {
        match self {
            Self::InvalidPointer { location, .. } | Self::ChunkListFull { location, .. } => {
                *location
            }
        }
    }
}

impl HasLocation for CollectError {
    fn location(&self) -> Location {
        match self {
            Self::Unsupported { location } => *location,
        }
    }
}

/// Opaque handle to an allocation, holding its offset into the arena.
///
/// Handles are only meaningful for the [`Heap`] that returned them and only
/// until they are freed.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, derive_more::Display,
)]
#[display("{_0:#x}")]
pub struct HeapPtr(usize);

impl HeapPtr {
    /// Rebuilds a handle from an offset previously obtained with
    /// [`offset`](Self::offset).
    ///
    /// The offset is not checked here; [`Heap::free`] rejects offsets that do
    /// not start a live allocation.
    #[must_use]
    pub const fn from_offset(offset: usize) -> Self {
        Self(offset)
    }

    #[must_use]
    pub const fn offset(self) -> usize {
        self.0
    }
}

/// A snapshot of a heap's occupancy.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct HeapStats {
    pub allocated_bytes: usize,
    pub allocated_chunks: usize,
    pub free_bytes: usize,
    pub free_chunks: usize,
    pub largest_free: usize,
}

impl fmt::Display for HeapStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "allocated={} bytes in {} chunks, free={} bytes in {} chunks, largest_free={}",
            self.allocated_bytes,
            self.allocated_chunks,
            self.free_bytes,
            self.free_chunks,
            self.largest_free,
        )
    }
}

/// A first-fit allocator over a borrowed, fixed-size arena.
///
/// `ALLOCATED_CAP` bounds the number of live allocations and `FREE_CAP`
/// bounds the number of free fragments. Neither list ever grows; running out
/// of room in one of them is reported as `ChunkListFull`.
///
/// # Algorithm
///
/// - **Allocation**: first-fit over the coalesced, address-ordered free list,
///   splitting the selected chunk.
/// - **Deallocation**: exact-offset lookup in the allocated list, then a move
///   to the free list without merging.
pub struct Heap<'a, const ALLOCATED_CAP: usize, const FREE_CAP: usize> {
    arena: &'a mut [u8],
    allocated: ChunkList<ALLOCATED_CAP>,
    free: ChunkList<FREE_CAP>,
}

impl<const ALLOCATED_CAP: usize, const FREE_CAP: usize> fmt::Debug
    for Heap<'_, ALLOCATED_CAP, FREE_CAP>
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Heap")
            .field("capacity", &self.arena.len())
            .field("allocated", &self.allocated.as_slice())
            .field("free", &self.free.as_slice())
            .finish_non_exhaustive()
    }
}

impl<const ALLOCATED_CAP: usize, const FREE_CAP: usize> fmt::Display
    for Heap<'_, ALLOCATED_CAP, FREE_CAP>
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "allocated:")?;
        write!(f, "{}", self.allocated)?;
        writeln!(f, "free:")?;
        write!(f, "{}", self.free)
    }
}

impl<'a, const ALLOCATED_CAP: usize, const FREE_CAP: usize> Heap<'a, ALLOCATED_CAP, FREE_CAP> {
    /// Creates a heap managing the whole of `arena`.
    ///
    /// The free list starts out as a single chunk covering the arena (or
    /// empty, for an empty arena).
    pub fn new(arena: &'a mut [u8]) -> Self {
        const {
            assert!(FREE_CAP > 0, "free chunk list must hold at least one chunk");
        }

        let mut free = ChunkList::new();
        if !arena.is_empty() {
            free.insert(Chunk::new(0, arena.len()));
        }
        Self {
            arena,
            allocated: ChunkList::new(),
            free,
        }
    }

    /// Returns the size of the arena in bytes.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.arena.len()
    }

    /// Returns the chunks currently handed out, in address order.
    #[must_use]
    pub fn allocated(&self) -> &ChunkList<ALLOCATED_CAP> {
        &self.allocated
    }

    /// Returns the free chunks, in address order.
    ///
    /// Chunks freed since the last allocation have not been coalesced yet.
    #[must_use]
    pub fn free_chunks(&self) -> &ChunkList<FREE_CAP> {
        &self.free
    }

    #[must_use]
    pub fn stats(&self) -> HeapStats {
        HeapStats {
            allocated_bytes: self.allocated.total_size(),
            allocated_chunks: self.allocated.len(),
            free_bytes: self.free.total_size(),
            free_chunks: self.free.len(),
            largest_free: self.free.largest().map_or(0, |chunk| chunk.size),
        }
    }

    /// Allocates `size` bytes and returns a handle to them.
    ///
    /// A zero-sized request returns `Ok(None)` and leaves the heap untouched.
    /// Otherwise the free list is coalesced and the first chunk (in address
    /// order) holding at least `size` bytes is split.
    ///
    /// When an error is returned, neither list has been modified apart from
    /// the coalescing pass, which does not change the set of free bytes.
    ///
    /// # Errors
    ///
    /// - [`AllocError::OutOfMemory`] if no free chunk is large enough.
    /// - [`AllocError::ChunkListFull`] if the allocated list cannot record
    ///   another allocation.
    pub fn alloc(&mut self, size: usize) -> Result<Option<HeapPtr>, AllocError> {
        if size == 0 {
            return Ok(None);
        }

        self.free.coalesce();

        let Some(index) = self.free.iter().position(|chunk| chunk.size >= size) else {
            let largest_free = self.free.largest().map_or(0, |chunk| chunk.size);
            return alloc_error::OutOfMemorySnafu {
                requested: size,
                largest_free,
            }
            .fail();
        };
        ensure!(
            !self.allocated.is_full(),
            alloc_error::ChunkListFullSnafu {
                list: ListKind::Allocated,
                capacity: ALLOCATED_CAP,
            }
        );

        // Removing the matched chunk frees the slot the tail goes into.
        let chunk = self.free.remove(index);
        self.allocated.insert(Chunk::new(chunk.start, size));
        let tail_size = chunk.size - size;
        if tail_size > 0 {
            self.free.insert(Chunk::new(chunk.start + size, tail_size));
        }

        Ok(Some(HeapPtr(chunk.start)))
    }

    /// Returns the allocation behind `ptr` to the free list.
    ///
    /// `None` is accepted and ignored. The chunk is not merged with its free
    /// neighbours; the next [`alloc`](Self::alloc) does that.
    ///
    /// # Errors
    ///
    /// - [`FreeError::InvalidPointer`] if `ptr` is not the start of a live
    ///   allocation (never allocated, already freed, or an interior offset).
    /// - [`FreeError::ChunkListFull`] if the free list cannot record another
    ///   chunk.
    ///
    /// Both lists are left unchanged on error.
    pub fn free(&mut self, ptr: Option<HeapPtr>) -> Result<(), FreeError> {
        let Some(ptr) = ptr else {
            return Ok(());
        };

        let index = self
            .allocated
            .find(ptr.0)
            .context(free_error::InvalidPointerSnafu { ptr })?;
        ensure!(
            !self.free.is_full(),
            free_error::ChunkListFullSnafu {
                list: ListKind::Free,
                capacity: FREE_CAP,
            }
        );

        let chunk = self.allocated.remove(index);
        self.free.insert(chunk);
        Ok(())
    }

    /// Reclaims allocations that are no longer reachable.
    ///
    /// The intended contract is to trace reachability from a set of root
    /// handles through the arena's contents, free every allocation that was
    /// not reached, and coalesce. No tracing is implemented.
    ///
    /// # Errors
    ///
    /// Always returns [`CollectError::Unsupported`].
    #[track_caller]
    pub fn collect(&mut self) -> Result<(), CollectError> {
        collect_error::UnsupportedSnafu.fail()
    }

    /// Returns the bytes of the live allocation starting at `ptr`.
    #[must_use]
    pub fn bytes(&self, ptr: HeapPtr) -> Option<&[u8]> {
        let index = self.allocated.find(ptr.0)?;
        let chunk = self.allocated.get(index)?;
        self.arena.get(chunk.range())
    }

    /// Returns the bytes of the live allocation starting at `ptr`, mutably.
    #[must_use]
    pub fn bytes_mut(&mut self, ptr: HeapPtr) -> Option<&mut [u8]> {
        let index = self.allocated.find(ptr.0)?;
        let chunk = self.allocated.get(index)?;
        self.arena.get_mut(chunk.range())
    }
}

#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg(test)]
mod tests {
    extern crate alloc;

    use alloc::{vec, vec::Vec};

    use super::*;

    type TestHeap<'a> = Heap<'a, 16, 16>;

    fn with_test_heap<F>(capacity: usize, test_fn: F)
    where
        F: FnOnce(&mut TestHeap<'_>),
    {
        let mut arena = vec![0x11_u8; capacity];
        let mut heap = TestHeap::new(&mut arena);
        test_fn(&mut heap);
        assert_consistent(&heap);
    }

    fn assert_consistent<const A: usize, const F: usize>(heap: &Heap<'_, A, F>) {
        let mut all = heap
            .allocated()
            .iter()
            .chain(heap.free_chunks())
            .copied()
            .collect::<Vec<_>>();
        all.sort_unstable();
        let mut end = 0;
        for chunk in &all {
            assert_eq!(chunk.start, end, "gap or overlap at {chunk:?}");
            end = chunk.end();
        }
        assert_eq!(end, heap.capacity());
    }

    fn free_list(heap: &TestHeap<'_>) -> Vec<(usize, usize)> {
        heap.free_chunks()
            .iter()
            .map(|chunk| (chunk.start, chunk.size))
            .collect()
    }

    #[test]
    fn test_new_heap_is_one_free_chunk() {
        with_test_heap(128, |heap| {
            assert_eq!(heap.capacity(), 128);
            assert!(heap.allocated().is_empty());
            assert_eq!(free_list(heap), [(0, 128)]);
        });
    }

    #[test]
    fn test_empty_arena() {
        with_test_heap(0, |heap| {
            assert!(heap.free_chunks().is_empty());
            let err = heap.alloc(1).unwrap_err();
            assert!(err.is_out_of_memory());
        });
    }

    #[test]
    fn test_basic_allocation() {
        with_test_heap(128, |heap| {
            let ptr = heap.alloc(32).unwrap().unwrap();
            assert_eq!(ptr.offset(), 0);
            assert_eq!(heap.allocated().as_slice(), &[Chunk::new(0, 32)]);
            assert_eq!(free_list(heap), [(32, 96)]);

            heap.free(Some(ptr)).unwrap();
            assert!(heap.allocated().is_empty());
            assert_eq!(free_list(heap), [(0, 32), (32, 96)]);
        });
    }

    #[test]
    fn test_zero_size_allocation_is_a_no_op() {
        with_test_heap(64, |heap| {
            let ptr = heap.alloc(8).unwrap().unwrap();
            heap.free(Some(ptr)).unwrap();
            let before = free_list(heap);

            assert_eq!(heap.alloc(0).unwrap(), None);
            // Not even coalesced.
            assert_eq!(free_list(heap), before);
            assert!(heap.allocated().is_empty());
        });
    }

    #[test]
    fn test_free_none_is_a_no_op() {
        with_test_heap(64, |heap| {
            heap.alloc(8).unwrap().unwrap();
            heap.free(None).unwrap();
            assert_eq!(heap.allocated().len(), 1);
            assert_eq!(free_list(heap), [(8, 56)]);
        });
    }

    #[test]
    fn test_allocate_entire_heap() {
        with_test_heap(256, |heap| {
            let ptr = heap.alloc(256).unwrap().unwrap();
            assert!(heap.free_chunks().is_empty());
            assert!(heap.alloc(1).unwrap_err().is_out_of_memory());

            heap.free(Some(ptr)).unwrap();
            let ptr = heap.alloc(256).unwrap().unwrap();
            assert_eq!(ptr.offset(), 0);
        });
    }

    #[test]
    fn test_out_of_memory_reports_largest_free() {
        with_test_heap(100, |heap| {
            let a = heap.alloc(30).unwrap();
            heap.alloc(10).unwrap();
            heap.free(a).unwrap();

            match heap.alloc(80).unwrap_err() {
                AllocError::OutOfMemory {
                    requested,
                    largest_free,
                    ..
                } => {
                    assert_eq!(requested, 80);
                    assert_eq!(largest_free, 60);
                }
                err @ AllocError::ChunkListFull { .. } => panic!("unexpected error: {err}"),
            }
        });
    }

    #[test]
    fn test_first_fit_picks_lowest_address() {
        with_test_heap(100, |heap| {
            let a = heap.alloc(10).unwrap();
            heap.alloc(5).unwrap();
            let c = heap.alloc(20).unwrap();
            heap.alloc(5).unwrap();
            heap.free(a).unwrap();
            heap.free(c).unwrap();

            // Both holes fit; the lower one wins even though the upper one is
            // closer in size.
            let ptr = heap.alloc(8).unwrap().unwrap();
            assert_eq!(ptr.offset(), 0);
            let ptr = heap.alloc(15).unwrap().unwrap();
            assert_eq!(ptr.offset(), 15);
        });
    }

    #[test]
    fn test_alloc_coalesces_before_searching() {
        with_test_heap(64, |heap| {
            let ptrs = (0..4)
                .map(|_| heap.alloc(16).unwrap())
                .collect::<Vec<_>>();
            heap.free(ptrs[1]).unwrap();
            heap.free(ptrs[2]).unwrap();
            assert_eq!(free_list(heap), [(16, 16), (32, 16)]);

            let ptr = heap.alloc(32).unwrap().unwrap();
            assert_eq!(ptr.offset(), 16);
            assert!(heap.free_chunks().is_empty());
        });
    }

    #[test]
    fn test_invalid_free() {
        with_test_heap(64, |heap| {
            let ptr = heap.alloc(16).unwrap().unwrap();
            let allocated = heap.allocated().clone();
            let free = heap.free_chunks().clone();

            let err = heap.free(Some(HeapPtr::from_offset(4))).unwrap_err();
            assert!(err.is_invalid_pointer());
            let err = heap.free(Some(HeapPtr::from_offset(16))).unwrap_err();
            assert!(err.is_invalid_pointer());
            assert_eq!(heap.allocated(), &allocated);
            assert_eq!(heap.free_chunks(), &free);

            heap.free(Some(ptr)).unwrap();
            let err = heap.free(Some(ptr)).unwrap_err();
            assert!(err.is_invalid_pointer());
        });
    }

    #[test]
    fn test_allocated_list_full() {
        let mut arena = [0_u8; 64];
        let mut heap = Heap::<'_, 2, 4>::new(&mut arena);
        heap.alloc(8).unwrap().unwrap();
        heap.alloc(8).unwrap().unwrap();
        let allocated = heap.allocated().clone();
        let free = heap.free_chunks().clone();

        match heap.alloc(8).unwrap_err() {
            AllocError::ChunkListFull { list, capacity, .. } => {
                assert_eq!(list, ListKind::Allocated);
                assert_eq!(capacity, 2);
            }
            err @ AllocError::OutOfMemory { .. } => panic!("unexpected error: {err}"),
        }
        assert_eq!(heap.allocated(), &allocated);
        assert_eq!(heap.free_chunks(), &free);
        assert_consistent(&heap);
    }

    #[test]
    fn test_free_list_full() {
        let mut arena = [0_u8; 10];
        let mut heap = Heap::<'_, 8, 2>::new(&mut arena);
        let ptrs = (0..4)
            .map(|_| heap.alloc(1).unwrap().unwrap())
            .collect::<Vec<_>>();
        heap.free(Some(ptrs[0])).unwrap();
        assert!(heap.free_chunks().is_full());

        let allocated = heap.allocated().clone();
        let err = heap.free(Some(ptrs[2])).unwrap_err();
        assert!(err.is_chunk_list_full());
        assert_eq!(heap.allocated(), &allocated);
        assert_consistent(&heap);

        // Reusing the hole makes room again.
        assert_eq!(heap.alloc(1).unwrap(), Some(ptrs[0]));
        heap.free(Some(ptrs[2])).unwrap();
        assert_consistent(&heap);
    }

    #[test]
    fn test_collect_is_unsupported() {
        with_test_heap(64, |heap| {
            let ptr = heap.alloc(8).unwrap().unwrap();
            let err = heap.collect().unwrap_err();
            assert!(matches!(err, CollectError::Unsupported { .. }));
            assert!(heap.bytes(ptr).is_some());
        });
    }

    #[test]
    fn test_bytes_access() {
        with_test_heap(64, |heap| {
            let a = heap.alloc(4).unwrap().unwrap();
            let b = heap.alloc(4).unwrap().unwrap();
            heap.bytes_mut(a).unwrap().copy_from_slice(&[1, 2, 3, 4]);
            heap.bytes_mut(b).unwrap().fill(0x33);

            assert_eq!(heap.bytes(a).unwrap(), &[1, 2, 3, 4]);
            assert_eq!(heap.bytes(b).unwrap(), &[0x33; 4]);
            assert!(heap.bytes(HeapPtr::from_offset(2)).is_none());

            heap.free(Some(a)).unwrap();
            assert!(heap.bytes(a).is_none());
        });
    }

    #[test]
    fn test_stats() {
        with_test_heap(100, |heap| {
            let a = heap.alloc(10).unwrap();
            heap.alloc(20).unwrap();
            heap.free(a).unwrap();
            assert_eq!(
                heap.stats(),
                HeapStats {
                    allocated_bytes: 20,
                    allocated_chunks: 1,
                    free_bytes: 80,
                    free_chunks: 2,
                    largest_free: 70,
                }
            );
        });
    }

    #[test]
    fn test_display_dumps_both_lists() {
        let mut arena = [0_u8; 32];
        let mut heap = Heap::<'_, 4, 4>::new(&mut arena);
        heap.alloc(16).unwrap();
        assert_eq!(
            alloc::format!("{heap}"),
            "allocated:\nChunks: (1)\n  start: 0x0, size: 16\n\
             free:\nChunks: (1)\n  start: 0x10, size: 16\n"
        );
    }
}
