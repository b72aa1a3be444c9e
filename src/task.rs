//! Units of work and the guarantee that each one is counted exactly once.

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use tracing::{debug, error, warn};

use crate::error::{panic_message, TaskFailure};
use crate::tracker::CompletionTracker;

/// A type-erased unit of work as seen by the pool workers.
pub trait Job: Send {
    fn run(self: Box<Self>);
}

/// Boxed job stored in the pool queue.
pub type BoxedJob = Box<dyn Job>;

type Work<R, E> = Box<dyn FnOnce() -> Result<R, E> + Send>;

/// One closure of a batch, bound to its result slot and the batch tracker.
///
/// Dropping a task always marks the tracker done. A task dropped before
/// it ran (queue closed, thread never started) first reports
/// [`TaskFailure::Cancelled`], so the submitter is never left waiting.
pub struct Task<R, E> {
    index: usize,
    work: Option<Work<R, E>>,
    tracker: Arc<CompletionTracker<R, E>>,
}

impl<R, E> Task<R, E> {
    pub fn new<F>(index: usize, tracker: Arc<CompletionTracker<R, E>>, work: F) -> Self
    where
        F: FnOnce() -> Result<R, E> + Send + 'static,
    {
        Task {
            index,
            work: Some(Box::new(work)),
            tracker,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// Runs the closure and reports its value or failure.
    pub fn execute(mut self) {
        let Some(work) = self.work.take() else {
            return;
        };
        match catch_unwind(AssertUnwindSafe(work)) {
            Ok(Ok(value)) => {
                if self.tracker.report_result(self.index, value).is_err() {
                    error!(index = self.index, "Task index outside its batch");
                }
            }
            Ok(Err(e)) => {
                debug!(index = self.index, "Task returned an error");
                self.tracker.report_failure(TaskFailure::Error(e));
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                warn!(index = self.index, panic = %message, "Task panicked");
                self.tracker.report_failure(TaskFailure::Panic(message));
            }
        }
    }
}

impl<R, E> Drop for Task<R, E> {
    fn drop(&mut self) {
        if self.work.take().is_some() {
            debug!(index = self.index, "Task dropped before running");
            self.tracker.report_failure(TaskFailure::Cancelled);
        }
        if self.tracker.mark_done().is_err() {
            error!(index = self.index, "Task completed more times than its batch size");
        }
    }
}

impl<R: Send, E: Send> Job for Task<R, E> {
    fn run(self: Box<Self>) {
        (*self).execute();
    }
}

impl<R, E> fmt::Debug for Task<R, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("index", &self.index)
            .field("pending", &self.work.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn executed_task_reports_value() {
        let tracker = Arc::new(CompletionTracker::<u32, ()>::new(1));
        Task::new(0, Arc::clone(&tracker), || Ok(7)).execute();
        assert_eq!(tracker.remaining(), 0);
        assert_eq!(tracker.await_completion().unwrap(), vec![7]);
    }

    #[test]
    fn error_is_funneled() {
        let tracker = Arc::new(CompletionTracker::<u32, &str>::new(1));
        Task::new(0, Arc::clone(&tracker), || Err("bad input")).execute();
        let err = tracker.await_completion().unwrap_err();
        assert_eq!(err.task_error(), Some(&"bad input"));
    }

    #[test]
    fn panic_is_captured() {
        let tracker = Arc::new(CompletionTracker::<u32, ()>::new(1));
        Task::new(0, Arc::clone(&tracker), || panic!("kaboom")).execute();
        match tracker.await_completion() {
            Err(Error::Failed(failure)) => {
                assert_eq!(failure.primary(), &TaskFailure::Panic("kaboom".into()))
            }
            other => panic!("expected panic failure, got {other:?}"),
        }
    }

    #[test]
    fn dropped_task_is_cancelled() {
        let tracker = Arc::new(CompletionTracker::<u32, ()>::new(2));
        Task::new(0, Arc::clone(&tracker), || Ok(1)).execute();
        drop(Task::new(1, Arc::clone(&tracker), || Ok(2)));

        assert_eq!(tracker.remaining(), 0);
        let err = tracker.await_completion().unwrap_err();
        assert!(err.failure().unwrap().primary().is_cancelled());
    }

    #[test]
    fn boxed_job_runs() {
        let tracker = Arc::new(CompletionTracker::<String, ()>::new(1));
        let job: BoxedJob = Box::new(Task::new(0, Arc::clone(&tracker), || Ok("done".to_string())));
        job.run();
        assert_eq!(tracker.await_completion().unwrap(), vec!["done".to_string()]);
    }
}
