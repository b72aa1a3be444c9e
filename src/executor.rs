//! The "run these closures in parallel and give me the results" capability.
//!
//! [`crate::IterativeParallelism`] only depends on [`Executor`]; it can
//! run on fresh threads ([`ThreadPerTask`]) or on a shared
//! [`crate::ParallelMapper`].

use std::sync::Arc;
use std::thread;

use tracing::debug;

use crate::error::Error;
use crate::join::join_all;
use crate::task::Task;
use crate::tracker::CompletionTracker;

pub trait Executor {
    /// Applies `f` to every input in parallel and blocks until all are done.
    ///
    /// Results follow input order. Any `Err` or panic from `f` fails the
    /// whole call with every failure attached.
    fn execute<I, R, E, F>(&self, f: F, inputs: Vec<I>) -> Result<Vec<R>, Error<E>>
    where
        I: Send + 'static,
        R: Send + 'static,
        E: Send + 'static,
        F: Fn(I) -> Result<R, E> + Send + Sync + 'static;
}

impl<X: Executor + ?Sized> Executor for &X {
    fn execute<I, R, E, F>(&self, f: F, inputs: Vec<I>) -> Result<Vec<R>, Error<E>>
    where
        I: Send + 'static,
        R: Send + 'static,
        E: Send + 'static,
        F: Fn(I) -> Result<R, E> + Send + Sync + 'static,
    {
        (**self).execute(f, inputs)
    }
}

impl<X: Executor + ?Sized> Executor for Arc<X> {
    fn execute<I, R, E, F>(&self, f: F, inputs: Vec<I>) -> Result<Vec<R>, Error<E>>
    where
        I: Send + 'static,
        R: Send + 'static,
        E: Send + 'static,
        F: Fn(I) -> Result<R, E> + Send + Sync + 'static,
    {
        (**self).execute(f, inputs)
    }
}

/// Starts one short-lived thread per input and joins all of them.
#[derive(Debug, Clone)]
pub struct ThreadPerTask {
    thread_name: String,
}

impl ThreadPerTask {
    pub fn new() -> Self {
        ThreadPerTask {
            thread_name: "parmap-block".to_string(),
        }
    }

    pub fn with_thread_name(name: impl Into<String>) -> Self {
        ThreadPerTask {
            thread_name: name.into(),
        }
    }
}

impl Default for ThreadPerTask {
    fn default() -> Self {
        Self::new()
    }
}

impl Executor for ThreadPerTask {
    fn execute<I, R, E, F>(&self, f: F, inputs: Vec<I>) -> Result<Vec<R>, Error<E>>
    where
        I: Send + 'static,
        R: Send + 'static,
        E: Send + 'static,
        F: Fn(I) -> Result<R, E> + Send + Sync + 'static,
    {
        let tracker = Arc::new(CompletionTracker::new(inputs.len()));
        let f = Arc::new(f);
        let mut handles = Vec::with_capacity(inputs.len());
        let mut spawn_error = None;

        for (index, input) in inputs.into_iter().enumerate() {
            let task = {
                let f = Arc::clone(&f);
                Task::new(index, Arc::clone(&tracker), move || f(input))
            };
            // After a failed spawn the remaining tasks are dropped unrun,
            // which counts them as cancelled.
            if spawn_error.is_some() {
                drop(task);
                continue;
            }
            let spawned = thread::Builder::new()
                .name(format!("{}-{}", self.thread_name, index))
                .spawn(move || task.execute());
            match spawned {
                Ok(handle) => handles.push(handle),
                Err(e) => spawn_error = Some(e),
            }
        }
        debug!(threads = handles.len(), "Spawned block threads");

        let joined = join_all(handles);
        if let Some(e) = spawn_error {
            return Err(Error::Spawn(e));
        }
        joined?;
        tracker.await_completion()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TaskFailure;
    use std::collections::HashSet;
    use std::convert::Infallible;

    #[test]
    fn keeps_input_order() {
        let out = ThreadPerTask::new()
            .execute(|x: u64| Ok::<_, Infallible>(x * 10), vec![3, 1, 2])
            .unwrap();
        assert_eq!(out, vec![30, 10, 20]);
    }

    #[test]
    fn empty_input_spawns_nothing() {
        let out = ThreadPerTask::new()
            .execute(|x: u8| Ok::<_, Infallible>(x), Vec::new())
            .unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn one_thread_per_input() {
        let names = ThreadPerTask::with_thread_name("blk")
            .execute(
                |_: usize| Ok::<_, Infallible>(thread::current().name().map(str::to_string)),
                (0..4).collect(),
            )
            .unwrap();
        let distinct: HashSet<_> = names.into_iter().flatten().collect();
        let expected: HashSet<_> = (0..4).map(|i| format!("blk-{i}")).collect();
        assert_eq!(distinct, expected);
    }

    #[test]
    fn failures_are_aggregated() {
        let err = ThreadPerTask::new()
            .execute(
                |x: i32| if x % 2 == 0 { Err(x) } else { Ok(x) },
                vec![1, 2, 3, 4],
            )
            .unwrap_err();
        let failure = err.failure().unwrap();
        assert_eq!(failure.len(), 2);
        let mut codes: Vec<_> = failure.iter().filter_map(TaskFailure::as_error).copied().collect();
        codes.sort_unstable();
        assert_eq!(codes, vec![2, 4]);
    }

    #[test]
    fn through_reference_and_arc() {
        let executor = ThreadPerTask::new();
        let by_ref = (&executor)
            .execute(|x: i32| Ok::<_, Infallible>(x + 1), vec![1])
            .unwrap();
        let shared = Arc::new(executor);
        let by_arc = shared
            .execute(|x: i32| Ok::<_, Infallible>(x + 2), vec![1])
            .unwrap();
        assert_eq!((by_ref, by_arc), (vec![2], vec![3]));
    }
}
