//! Splitting a strided index range into near-equal contiguous blocks.
//!
//! With `step` only indices `0, step, 2*step, ...` below `len` take part.
//! Those `m = ceil(len / step)` positions are cut into `k = min(threads, m)`
//! blocks; the first `m % k` blocks get one extra position, so block
//! sizes differ by at most one and together cover every position once.

use std::fmt;
use std::sync::Arc;

/// A run of `len` consecutive strided positions starting at position `first`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Block {
    pub first: usize,
    pub len: usize,
}

impl Block {
    /// Real list indices covered by this block.
    pub fn indices(&self, step: usize) -> impl Iterator<Item = usize> {
        let first = self.first;
        (0..self.len).map(move |offset| (first + offset) * step)
    }
}

/// Partitions `len` elements taken every `step` into at most `threads` blocks.
///
/// `step` and `threads` must be positive; callers validate them first.
pub fn partition(len: usize, threads: usize, step: usize) -> Vec<Block> {
    if len == 0 || threads == 0 || step == 0 {
        return Vec::new();
    }
    let positions = len.div_ceil(step);
    let blocks = threads.min(positions);
    let base = positions / blocks;
    let extra = positions % blocks;

    let mut first = 0;
    (0..blocks)
        .map(|i| {
            let len = base + usize::from(i < extra);
            let block = Block { first, len };
            first += len;
            block
        })
        .collect()
}

/// Read-only strided view over one block of a shared list.
pub struct Segment<T> {
    values: Arc<[T]>,
    block: Block,
    step: usize,
}

impl<T> Segment<T> {
    pub fn new(values: Arc<[T]>, block: Block, step: usize) -> Self {
        Segment {
            values,
            block,
            step,
        }
    }

    /// Lazily yields the block's elements in list order.
    pub fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        self.block.indices(self.step).map(move |i| &self.values[i])
    }

    pub fn len(&self) -> usize {
        self.block.len
    }

    pub fn is_empty(&self) -> bool {
        self.block.len == 0
    }

    pub fn block(&self) -> Block {
        self.block
    }
}

impl<T: fmt::Debug> fmt::Debug for Segment<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

/// Builds one segment per block over `values`.
pub fn segments<T>(values: &Arc<[T]>, threads: usize, step: usize) -> Vec<Segment<T>> {
    partition(values.len(), threads, step)
        .into_iter()
        .map(|block| Segment::new(Arc::clone(values), block, step))
        .collect()
}
