//! A fixed-capacity, address-ordered list of byte ranges.
//!
//! `ChunkList` is the bookkeeping store of the arena allocator. It holds
//! [`Chunk`]s, each describing the byte range `start..start + size`, sorted
//! strictly ascending by their start offsets. Entries never overlap; keeping
//! that true is the caller's job, since the list only places entries and does
//! not re-validate them.
//!
//! # Features
//!
//! - **Sorted order**: entries are placed insertion-sort style, so inserting
//!   near the tail is cheap
//! - **Exact lookup**: [`ChunkList::find`] binary-searches on the start offset
//! - **Coalescing**: [`ChunkList::merge_from`] and [`ChunkList::coalesce`]
//!   fold address-adjacent entries into one
//! - **Fixed capacity**: uses `ArrayVec` storage; the list never grows
//!
//! # Examples
//!
//! ```
//! use chunk_list::{Chunk, ChunkList};
//!
//! let mut list = ChunkList::<8>::new();
//! list.insert(Chunk::new(10, 5));
//! list.insert(Chunk::new(0, 10));
//! list.insert(Chunk::new(20, 4));
//! assert_eq!(
//!     list.as_slice(),
//!     &[Chunk::new(0, 10), Chunk::new(10, 5), Chunk::new(20, 4)]
//! );
//!
//! list.coalesce();
//! assert_eq!(list.as_slice(), &[Chunk::new(0, 15), Chunk::new(20, 4)]);
//! ```
//!
//! # Performance
//!
//! - Insert: O(k), where k is the distance of the new entry from the tail
//! - Remove: O(n - index)
//! - Find: O(log n)
//! - Merge/coalesce: O(n), single left-to-right pass
//! - Memory: stack-allocated with fixed capacity

#![cfg_attr(not(test), no_std)]
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

use core::{fmt, ops::Range, slice};

use arrayvec::{ArrayVec, CapacityError};

/// A contiguous byte range, `start..start + size`.
///
/// Chunks compare by `start` first, which is the order a [`ChunkList`] keeps.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Chunk {
    /// Offset of the first byte.
    pub start: usize,
    /// Number of bytes.
    pub size: usize,
}

impl Chunk {
    #[must_use]
    pub const fn new(start: usize, size: usize) -> Self {
        Self { start, size }
    }

    /// Returns the offset one past the last byte of the chunk.
    #[must_use]
    pub const fn end(&self) -> usize {
        self.start + self.size
    }

    #[must_use]
    pub const fn range(&self) -> Range<usize> {
        self.start..self.end()
    }

    /// Returns `true` if `next` begins exactly where this chunk ends.
    #[must_use]
    pub const fn is_followed_by(&self, next: &Self) -> bool {
        self.end() == next.start
    }
}

impl fmt::Display for Chunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "start: {:#x}, size: {}", self.start, self.size)
    }
}

/// A bounded collection of non-overlapping chunks sorted by start offset.
///
/// # Examples
///
/// ```
/// use chunk_list::{Chunk, ChunkList};
///
/// let mut list = ChunkList::<4>::new();
/// list.insert(Chunk::new(8, 8));
/// list.insert(Chunk::new(0, 4));
/// assert_eq!(list.find(8), Some(1));
/// assert_eq!(list.find(9), None);
/// ```
#[derive(Debug, Default, Clone, PartialEq, Eq, Hash)]
pub struct ChunkList<const CAP: usize> {
    chunks: ArrayVec<Chunk, CAP>,
}

impl<const CAP: usize> ChunkList<CAP> {
    /// Creates a new empty `ChunkList`.
    ///
    /// # Examples
    ///
    /// ```
    /// use chunk_list::ChunkList;
    ///
    /// let list = ChunkList::<10>::new();
    /// assert!(list.is_empty());
    /// assert_eq!(list.capacity(), 10);
    /// ```
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn capacity(&self) -> usize {
        CAP
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Returns `true` if no further chunk can be inserted.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.chunks.is_full()
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Chunk> {
        self.chunks.get(index)
    }

    /// Returns an iterator over the chunks in ascending start order.
    pub fn iter(&self) -> slice::Iter<'_, Chunk> {
        self.chunks.iter()
    }

    #[must_use]
    pub fn as_slice(&self) -> &[Chunk] {
        self.chunks.as_slice()
    }

    pub fn clear(&mut self) {
        self.chunks.clear();
    }

    /// Returns the sum of the sizes of all chunks.
    #[must_use]
    pub fn total_size(&self) -> usize {
        self.chunks.iter().map(|chunk| chunk.size).sum()
    }

    /// Returns the largest chunk, preferring the lowest address on ties.
    #[must_use]
    pub fn largest(&self) -> Option<&Chunk> {
        self.chunks
            .iter()
            .reduce(|best, chunk| if chunk.size > best.size { chunk } else { best })
    }

    /// Inserts a chunk, keeping the list sorted, and returns its index.
    ///
    /// The position is found by walking backwards from the tail, so the cost
    /// is proportional to how far from the tail the chunk lands. Indices of
    /// entries at or after the returned index shift up by one.
    ///
    /// The chunk must not overlap any existing entry.
    ///
    /// # Panics
    ///
    /// Panics if the list is already full.
    ///
    /// # Examples
    ///
    /// ```
    /// use chunk_list::{Chunk, ChunkList};
    ///
    /// let mut list = ChunkList::<4>::new();
    /// assert_eq!(list.insert(Chunk::new(10, 2)), 0);
    /// assert_eq!(list.insert(Chunk::new(0, 2)), 0);
    /// assert_eq!(list.insert(Chunk::new(5, 2)), 1);
    /// ```
    pub fn insert(&mut self, chunk: Chunk) -> usize {
        match self.try_insert(chunk) {
            Ok(index) => index,
            Err(_) => panic!("chunk list capacity exceeded: capacity={CAP}, chunk={chunk:?}"),
        }
    }

    /// Inserts a chunk like [`insert`](Self::insert), returning an error
    /// instead of panicking when the list is full.
    ///
    /// The list is left untouched on error.
    pub fn try_insert(&mut self, chunk: Chunk) -> Result<usize, CapacityError<Chunk>> {
        let index = self
            .chunks
            .iter()
            .rposition(|c| c.start < chunk.start)
            .map_or(0, |i| i + 1);
        debug_assert!(
            index == 0 || self.chunks[index - 1].end() <= chunk.start,
            "chunk overlaps its predecessor: {chunk:?}"
        );
        debug_assert!(
            self.chunks.get(index).is_none_or(|next| chunk.end() <= next.start),
            "chunk overlaps its successor: {chunk:?}"
        );
        self.chunks.try_insert(index, chunk)?;
        Ok(index)
    }

    /// Removes and returns the chunk at `index`.
    ///
    /// Every later entry shifts down by one position.
    ///
    /// # Panics
    ///
    /// Panics if `index >= self.len()`.
    pub fn remove(&mut self, index: usize) -> Chunk {
        assert!(
            index < self.chunks.len(),
            "chunk index out of bounds: index={index}, len={}",
            self.chunks.len()
        );
        self.chunks.remove(index)
    }

    /// Returns the index of the chunk starting exactly at `start`.
    ///
    /// Offsets inside a chunk do not match; only its start does.
    #[must_use]
    pub fn find(&self, start: usize) -> Option<usize> {
        self.chunks
            .binary_search_by_key(&start, |chunk| chunk.start)
            .ok()
    }

    /// Rebuilds this list from `src`, coalescing address-adjacent runs.
    ///
    /// `src` is scanned once in ascending order. A chunk that begins where the
    /// previously emitted chunk ends is folded into it; any other chunk is
    /// emitted as-is. Chunks separated by a gap are never merged.
    ///
    /// # Examples
    ///
    /// ```
    /// use chunk_list::{Chunk, ChunkList};
    ///
    /// let src: ChunkList<8> = [Chunk::new(0, 2), Chunk::new(2, 3), Chunk::new(6, 1)]
    ///     .into_iter()
    ///     .collect();
    /// let mut dst = ChunkList::<8>::new();
    /// dst.insert(Chunk::new(100, 1));
    ///
    /// dst.merge_from(&src);
    /// assert_eq!(dst.as_slice(), &[Chunk::new(0, 5), Chunk::new(6, 1)]);
    /// ```
    pub fn merge_from(&mut self, src: &Self) {
        self.chunks.clear();
        for &chunk in src {
            self.push_coalesced(chunk);
        }
    }

    /// Coalesces address-adjacent runs of this list in place.
    ///
    /// Equivalent to merging the list into itself. Applying it twice gives
    /// the same result as applying it once.
    pub fn coalesce(&mut self) {
        let chunks = self.chunks.as_mut_slice();
        let mut merged = 0;
        for i in 0..chunks.len() {
            let chunk = chunks[i];
            if merged > 0 && chunks[merged - 1].is_followed_by(&chunk) {
                chunks[merged - 1].size += chunk.size;
            } else {
                chunks[merged] = chunk;
                merged += 1;
            }
        }
        self.chunks.truncate(merged);
    }

    fn push_coalesced(&mut self, chunk: Chunk) {
        match self.chunks.last_mut() {
            Some(last) if last.is_followed_by(&chunk) => last.size += chunk.size,
            _ => self.chunks.push(chunk),
        }
    }
}

impl<const CAP: usize> fmt::Display for ChunkList<CAP> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Chunks: ({})", self.chunks.len())?;
        for chunk in &self.chunks {
            writeln!(f, "  {chunk}")?;
        }
        Ok(())
    }
}

/// Collects chunks through [`insert`](ChunkList::insert), so the input may be
/// in any order.
///
/// # Panics
///
/// Panics if the iterator yields more than `CAP` chunks.
impl<const CAP: usize> FromIterator<Chunk> for ChunkList<CAP> {
    fn from_iter<T: IntoIterator<Item = Chunk>>(iter: T) -> Self {
        let mut this = Self::new();
        this.extend(iter);
        this
    }
}

impl<const CAP: usize> Extend<Chunk> for ChunkList<CAP> {
    fn extend<T: IntoIterator<Item = Chunk>>(&mut self, iter: T) {
        for chunk in iter {
            self.insert(chunk);
        }
    }
}

impl<'a, const CAP: usize> IntoIterator for &'a ChunkList<CAP> {
    type Item = &'a Chunk;
    type IntoIter = slice::Iter<'a, Chunk>;

    fn into_iter(self) -> Self::IntoIter {
        self.chunks.iter()
    }
}
