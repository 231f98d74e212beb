use std::str::FromStr;

use allocator::heap::{AllocError, Heap, HeapPtr};
use snafu::{ResultExt as _, whatever};
use snafu_utils::GenericError;

/// A canned sequence of allocator calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display)]
pub enum Scenario {
    /// Sizes 0..10, freeing each even-indexed result right away, then 400
    /// bytes and four small allocations.
    #[display("original")]
    Original,
    /// Sizes 0..10, then free every even-indexed allocation.
    #[display("fragmentation")]
    Fragmentation,
    /// Sizes 0..10, free all of them in order, then allocate one byte.
    #[display("coalesce")]
    Coalesce,
}

impl FromStr for Scenario {
    type Err = GenericError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "original" => Ok(Self::Original),
            "fragmentation" => Ok(Self::Fragmentation),
            "coalesce" => Ok(Self::Coalesce),
            _ => whatever!(
                "unknown scenario `{s}`, expected one of: original, fragmentation, coalesce"
            ),
        }
    }
}

impl Scenario {
    pub fn run<const A: usize, const F: usize>(
        self,
        heap: &mut Heap<'_, A, F>,
    ) -> Result<(), GenericError> {
        match self {
            Self::Original => {
                for i in 0..10 {
                    let ptr = alloc(heap, i)?;
                    if i % 2 == 0 {
                        free(heap, ptr)?;
                    }
                }
                alloc(heap, 400)?;
                for i in 1..=4 {
                    alloc(heap, i * 2)?;
                }
            }
            Self::Fragmentation => {
                let ptrs = (0..10)
                    .map(|size| alloc(heap, size))
                    .collect::<Result<Vec<_>, _>>()?;
                for ptr in ptrs.into_iter().step_by(2) {
                    free(heap, ptr)?;
                }
            }
            Self::Coalesce => {
                let ptrs = (0..10)
                    .map(|size| alloc(heap, size))
                    .collect::<Result<Vec<_>, _>>()?;
                for ptr in ptrs {
                    free(heap, ptr)?;
                }
                alloc(heap, 1)?;
            }
        }
        Ok(())
    }
}

/// Allocates `size` bytes, treating an exhausted arena as a soft failure.
fn alloc<const A: usize, const F: usize>(
    heap: &mut Heap<'_, A, F>,
    size: usize,
) -> Result<Option<HeapPtr>, GenericError> {
    match heap.alloc(size) {
        Ok(ptr) => {
            match ptr {
                Some(ptr) => trace!("alloc({size}) -> {ptr}"),
                None => trace!("alloc({size}) -> null"),
            }
            Ok(ptr)
        }
        Err(err @ AllocError::OutOfMemory { .. }) => {
            warn!("alloc({size}) failed: {err}");
            Ok(None)
        }
        Err(err) => Err(err).with_whatever_context(|_| format!("alloc({size}) failed")),
    }
}

fn free<const A: usize, const F: usize>(
    heap: &mut Heap<'_, A, F>,
    ptr: Option<HeapPtr>,
) -> Result<(), GenericError> {
    let Some(ptr) = ptr else {
        trace!("free(null)");
        return Ok(());
    };
    heap.free(Some(ptr))
        .with_whatever_context(|_| format!("free({ptr}) failed"))?;
    trace!("free({ptr})");
    debug!("{} free chunks pending coalescing", heap.free_chunks().len());
    Ok(())
}
