//! Block-parallel list operations.
//!
//! Every operation follows one shape: split the strided list into at
//! most `threads` blocks ([`crate::partition`]), reduce each block with a
//! per-block function on the executor, then combine the ordered partial
//! results with a finisher built from the same combining rule. An empty
//! list yields the operation's identity without touching the executor.

use std::cmp::Ordering;
use std::convert::Infallible;
use std::fmt::Display;
use std::sync::Arc;

use itertools::Itertools;
use tracing::trace;

use crate::config::{validate_step, validate_threads};
use crate::error::Result;
use crate::executor::{Executor, ThreadPerTask};
use crate::partition::{segments, Segment};

/// Runs list operations over blocks in parallel.
///
/// Built with [`IterativeParallelism::new`] it starts its own threads per
/// call; built with [`IterativeParallelism::with_executor`] it delegates
/// to a shared executor such as a [`crate::ParallelMapper`].
#[derive(Debug, Clone, Default)]
pub struct IterativeParallelism<X = ThreadPerTask> {
    executor: X,
}

impl IterativeParallelism<ThreadPerTask> {
    pub fn new() -> Self {
        IterativeParallelism {
            executor: ThreadPerTask::new(),
        }
    }
}

impl<X: Executor> IterativeParallelism<X> {
    pub fn with_executor(executor: X) -> Self {
        IterativeParallelism { executor }
    }

    pub fn executor(&self) -> &X {
        &self.executor
    }

    // =========================================================================
    // Scalar operations
    // =========================================================================

    /// Largest element of every `step`-th value, or `None` for an empty list.
    ///
    /// Among equal elements the first one wins.
    pub fn maximum<T, C>(
        &self,
        threads: usize,
        values: impl Into<Arc<[T]>>,
        comparator: C,
        step: usize,
    ) -> Result<Option<T>>
    where
        T: Clone + Send + Sync + 'static,
        C: Fn(&T, &T) -> Ordering + Send + Sync + 'static,
    {
        let comparator = Arc::new(comparator);
        let in_block = Arc::clone(&comparator);
        self.run(
            threads,
            values,
            step,
            move |segment| {
                max_first(segment.iter(), |a, b| in_block(*a, *b) == Ordering::Greater).cloned()
            },
            move |partials| {
                max_first(partials.into_iter().flatten(), |a, b| {
                    comparator(a, b) == Ordering::Greater
                })
            },
        )
    }

    /// Smallest element of every `step`-th value; the first one wins on ties.
    pub fn minimum<T, C>(
        &self,
        threads: usize,
        values: impl Into<Arc<[T]>>,
        comparator: C,
        step: usize,
    ) -> Result<Option<T>>
    where
        T: Clone + Send + Sync + 'static,
        C: Fn(&T, &T) -> Ordering + Send + Sync + 'static,
    {
        self.maximum(threads, values, move |a: &T, b: &T| comparator(b, a), step)
    }

    /// Whether every `step`-th value satisfies `predicate`; `true` for an empty list.
    pub fn all<T, P>(
        &self,
        threads: usize,
        values: impl Into<Arc<[T]>>,
        predicate: P,
        step: usize,
    ) -> Result<bool>
    where
        T: Send + Sync + 'static,
        P: Fn(&T) -> bool + Send + Sync + 'static,
    {
        self.run(
            threads,
            values,
            step,
            move |segment| segment.iter().all(|v| predicate(v)),
            |partials| partials.into_iter().all(|ok| ok),
        )
    }

    /// Whether some `step`-th value satisfies `predicate`; `false` for an empty list.
    pub fn any<T, P>(
        &self,
        threads: usize,
        values: impl Into<Arc<[T]>>,
        predicate: P,
        step: usize,
    ) -> Result<bool>
    where
        T: Send + Sync + 'static,
        P: Fn(&T) -> bool + Send + Sync + 'static,
    {
        self.all(threads, values, move |v: &T| !predicate(v), step)
            .map(|all_fail| !all_fail)
    }

    /// Number of `step`-th values satisfying `predicate`.
    pub fn count<T, P>(
        &self,
        threads: usize,
        values: impl Into<Arc<[T]>>,
        predicate: P,
        step: usize,
    ) -> Result<usize>
    where
        T: Send + Sync + 'static,
        P: Fn(&T) -> bool + Send + Sync + 'static,
    {
        self.run(
            threads,
            values,
            step,
            move |segment| segment.iter().filter(|v| predicate(v)).count(),
            |partials| partials.into_iter().sum(),
        )
    }

    // =========================================================================
    // List operations
    // =========================================================================

    /// Concatenation of the `Display` forms of every `step`-th value.
    pub fn join<T>(&self, threads: usize, values: impl Into<Arc<[T]>>, step: usize) -> Result<String>
    where
        T: Display + Send + Sync + 'static,
    {
        self.run(
            threads,
            values,
            step,
            |segment| segment.iter().join(""),
            |partials| partials.concat(),
        )
    }

    /// Every `step`-th value satisfying `predicate`, in list order.
    pub fn filter<T, P>(
        &self,
        threads: usize,
        values: impl Into<Arc<[T]>>,
        predicate: P,
        step: usize,
    ) -> Result<Vec<T>>
    where
        T: Clone + Send + Sync + 'static,
        P: Fn(&T) -> bool + Send + Sync + 'static,
    {
        self.run(
            threads,
            values,
            step,
            move |segment| segment.iter().filter(|v| predicate(v)).cloned().collect::<Vec<_>>(),
            |partials| partials.concat(),
        )
    }

    /// `f` applied to every `step`-th value, in list order.
    pub fn map<T, U, F>(
        &self,
        threads: usize,
        values: impl Into<Arc<[T]>>,
        f: F,
        step: usize,
    ) -> Result<Vec<U>>
    where
        T: Send + Sync + 'static,
        U: Send + 'static,
        F: Fn(&T) -> U + Send + Sync + 'static,
    {
        self.run(
            threads,
            values,
            step,
            move |segment| segment.iter().map(|v| f(v)).collect::<Vec<_>>(),
            |partials| partials.into_iter().flatten().collect(),
        )
    }

    // =========================================================================
    // Reductions
    // =========================================================================

    /// Folds every `step`-th value with `operator`, starting each block from `identity`.
    ///
    /// `operator` should be associative and `identity` neutral for it.
    pub fn reduce<T, O>(
        &self,
        threads: usize,
        values: impl Into<Arc<[T]>>,
        identity: T,
        operator: O,
        step: usize,
    ) -> Result<T>
    where
        T: Clone + Send + Sync + 'static,
        O: Fn(T, T) -> T + Send + Sync + 'static,
    {
        self.map_reduce(threads, values, T::clone, identity, operator, step)
    }

    /// Lifts every `step`-th value with `lift` and folds the lifted values.
    pub fn map_reduce<T, R, L, O>(
        &self,
        threads: usize,
        values: impl Into<Arc<[T]>>,
        lift: L,
        identity: R,
        operator: O,
        step: usize,
    ) -> Result<R>
    where
        T: Send + Sync + 'static,
        R: Clone + Send + Sync + 'static,
        L: Fn(&T) -> R + Send + Sync + 'static,
        O: Fn(R, R) -> R + Send + Sync + 'static,
    {
        let operator = Arc::new(operator);
        let in_block = Arc::clone(&operator);
        let block_identity = identity.clone();
        self.run(
            threads,
            values,
            step,
            move |segment| {
                segment
                    .iter()
                    .map(|v| lift(v))
                    .fold(block_identity.clone(), |acc, v| in_block(acc, v))
            },
            move |partials| partials.into_iter().fold(identity, |acc, v| operator(acc, v)),
        )
    }

    // =========================================================================
    // Driver
    // =========================================================================

    fn run<T, R, P, F>(
        &self,
        threads: usize,
        values: impl Into<Arc<[T]>>,
        step: usize,
        per_block: P,
        finisher: F,
    ) -> Result<R>
    where
        T: Send + Sync + 'static,
        R: Send + 'static,
        P: Fn(Segment<T>) -> R + Send + Sync + 'static,
        F: FnOnce(Vec<R>) -> R,
    {
        validate_threads(threads)?;
        validate_step(step)?;

        let values: Arc<[T]> = values.into();
        let blocks = segments(&values, threads, step);
        if blocks.is_empty() {
            return Ok(finisher(Vec::new()));
        }

        trace!(len = values.len(), blocks = blocks.len(), step, "Running blocks");
        let partials = self
            .executor
            .execute(move |segment| Ok::<R, Infallible>(per_block(segment)), blocks)?;
        Ok(finisher(partials))
    }
}

/// Greatest item, keeping the earliest of equal ones.
fn max_first<U>(items: impl Iterator<Item = U>, greater: impl Fn(&U, &U) -> bool) -> Option<U> {
    items.reduce(|best, next| if greater(&next, &best) { next } else { best })
}
