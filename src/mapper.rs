//! Parallel `map` over a fixed worker pool.
//!
//! Every call gets its own [`CompletionTracker`]; calls share the pool
//! and its queue. A call either returns all results in input order or
//! fails with the first task failure, the others attached as suppressed.

use std::convert::Infallible;
use std::fmt;
use std::sync::Arc;

use tracing::{debug, debug_span};

use crate::config::PoolConfig;
use crate::error::Error;
use crate::executor::Executor;
use crate::pool::{PoolState, WorkerPool};
use crate::task::Task;
use crate::tracker::CompletionTracker;

pub struct ParallelMapper {
    pool: WorkerPool,
}

impl ParallelMapper {
    /// Starts a mapper with `threads` workers and an unbounded queue.
    pub fn new(threads: usize) -> Result<Self, Error> {
        Self::with_config(&PoolConfig::new(threads))
    }

    pub fn with_config(config: &PoolConfig) -> Result<Self, Error> {
        Ok(ParallelMapper {
            pool: WorkerPool::new(config)?,
        })
    }

    /// Applies a fallible `f` to every input on the pool.
    ///
    /// Blocks until every task has been counted. Fails with
    /// [`Error::Closed`] if the mapper was closed before the call; tasks
    /// cut off by a concurrent [`ParallelMapper::close`] fail the call
    /// with [`crate::TaskFailure::Cancelled`].
    pub fn try_map<T, R, E, F, I>(&self, f: F, inputs: I) -> Result<Vec<R>, Error<E>>
    where
        T: Send + 'static,
        R: Send + 'static,
        E: Send + 'static,
        F: Fn(T) -> Result<R, E> + Send + Sync + 'static,
        I: IntoIterator<Item = T>,
    {
        if !self.pool.is_open() {
            return Err(Error::Closed);
        }

        let inputs: Vec<T> = inputs.into_iter().collect();
        let _span = debug_span!("map", tasks = inputs.len()).entered();
        let tracker = Arc::new(CompletionTracker::new(inputs.len()));
        let f = Arc::new(f);
        debug!(tasks = inputs.len(), "Submitting batch");

        for (index, input) in inputs.into_iter().enumerate() {
            let f = Arc::clone(&f);
            let task = Task::new(index, Arc::clone(&tracker), move || f(input));
            // A rejected task is dropped here and reports itself cancelled.
            if self.pool.submit(Box::new(task)).is_err() {
                debug!(index, "Task rejected by closed pool");
            }
        }

        tracker.await_completion()
    }

    /// Applies an infallible `f` to every input on the pool.
    ///
    /// Panics inside `f` are still caught and returned as failures.
    pub fn map<T, R, F, I>(&self, f: F, inputs: I) -> Result<Vec<R>, Error>
    where
        T: Send + 'static,
        R: Send + 'static,
        F: Fn(T) -> R + Send + Sync + 'static,
        I: IntoIterator<Item = T>,
    {
        self.try_map(move |value| Ok::<R, Infallible>(f(value)), inputs)
    }

    /// Stops the pool and joins every worker. Safe to call more than once.
    pub fn close(&self) -> Result<(), Error> {
        self.pool.shutdown()
    }

    pub fn is_closed(&self) -> bool {
        self.pool.state() != PoolState::Open
    }

    pub fn state(&self) -> PoolState {
        self.pool.state()
    }

    pub fn threads(&self) -> usize {
        self.pool.threads()
    }

    /// Worker threads still running; zero once [`ParallelMapper::close`] returned.
    pub fn live_workers(&self) -> usize {
        self.pool.live_workers()
    }
}

impl Executor for ParallelMapper {
    fn execute<I, R, E, F>(&self, f: F, inputs: Vec<I>) -> Result<Vec<R>, Error<E>>
    where
        I: Send + 'static,
        R: Send + 'static,
        E: Send + 'static,
        F: Fn(I) -> Result<R, E> + Send + Sync + 'static,
    {
        self.try_map(f, inputs)
    }
}

impl fmt::Debug for ParallelMapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParallelMapper").field("pool", &self.pool).finish()
    }
}
