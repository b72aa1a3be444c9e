//! Batch completion tracking.
//!
//! A [`CompletionTracker`] belongs to one batch: the submitter waits on
//! it while the batch's tasks report into it. Results land in
//! index-addressed slots, so output order follows input order no matter
//! which task finishes first. [`WaitGroup`] is the bare counter without
//! results or failures.

use std::fmt;

use parking_lot::{Condvar, Mutex};

use crate::error::{Error, Failure, TaskFailure};

struct Batch<R, E> {
    remaining: usize,
    results: Vec<Option<R>>,
    failure: Option<Failure<E>>,
    collected: bool,
}

/// Remaining-task counter, ordered result slots and failure funnel for one batch.
pub struct CompletionTracker<R, E> {
    batch: Mutex<Batch<R, E>>,
    all_done: Condvar,
    size: usize,
}

impl<R, E> CompletionTracker<R, E> {
    /// Tracker for a batch of `size` tasks.
    pub fn new(size: usize) -> Self {
        CompletionTracker {
            batch: Mutex::new(Batch {
                remaining: size,
                results: (0..size).map(|_| None).collect(),
                failure: None,
                collected: false,
            }),
            all_done: Condvar::new(),
            size,
        }
    }

    /// Stores the value produced by task `index`.
    pub fn report_result(&self, index: usize, value: R) -> Result<(), Error<E>> {
        let mut batch = self.batch.lock();
        match batch.results.get_mut(index) {
            Some(slot) => {
                *slot = Some(value);
                Ok(())
            }
            None => Err(Error::IllegalState("result index out of range")),
        }
    }

    /// Records a failure. The first one becomes primary, the rest are suppressed.
    pub fn report_failure(&self, failure: TaskFailure<E>) {
        let mut batch = self.batch.lock();
        match batch.failure.as_mut() {
            Some(primary) => primary.add_suppressed(failure),
            None => batch.failure = Some(Failure::new(failure)),
        }
    }

    /// Counts one task as finished, waking the submitter on the last one.
    ///
    /// Fails without changing anything if every task was already counted.
    pub fn mark_done(&self) -> Result<(), Error<E>> {
        let mut batch = self.batch.lock();
        if batch.remaining == 0 {
            return Err(Error::IllegalState("mark_done called on a completed batch"));
        }
        batch.remaining -= 1;
        if batch.remaining == 0 {
            self.all_done.notify_all();
        }
        Ok(())
    }

    /// Blocks until every task is counted, then hands out the results or the failure.
    ///
    /// Results are handed out once; later calls fail with `IllegalState`.
    pub fn await_completion(&self) -> Result<Vec<R>, Error<E>> {
        let mut batch = self.batch.lock();
        while batch.remaining > 0 {
            self.all_done.wait(&mut batch);
        }
        if batch.collected {
            return Err(Error::IllegalState("batch results already collected"));
        }
        batch.collected = true;

        if let Some(failure) = batch.failure.take() {
            batch.results.clear();
            return Err(Error::Failed(failure));
        }
        std::mem::take(&mut batch.results)
            .into_iter()
            .collect::<Option<Vec<R>>>()
            .ok_or(Error::IllegalState("task finished without reporting"))
    }

    pub fn remaining(&self) -> usize {
        self.batch.lock().remaining
    }

    pub fn size(&self) -> usize {
        self.size
    }
}

impl<R, E> fmt::Debug for CompletionTracker<R, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let batch = self.batch.lock();
        f.debug_struct("CompletionTracker")
            .field("size", &self.size)
            .field("remaining", &batch.remaining)
            .field("failed", &batch.failure.is_some())
            .finish()
    }
}

/// Counter that lets one thread wait until `count` others have called [`WaitGroup::done`].
#[derive(Debug)]
pub struct WaitGroup {
    remaining: Mutex<usize>,
    zero: Condvar,
}

impl WaitGroup {
    pub fn new(count: usize) -> Self {
        WaitGroup {
            remaining: Mutex::new(count),
            zero: Condvar::new(),
        }
    }

    pub fn done(&self) -> Result<(), Error> {
        let mut remaining = self.remaining.lock();
        if *remaining == 0 {
            return Err(Error::IllegalState("done called on a drained wait group"));
        }
        *remaining -= 1;
        if *remaining == 0 {
            self.zero.notify_all();
        }
        Ok(())
    }

    pub fn wait(&self) {
        let mut remaining = self.remaining.lock();
        while *remaining > 0 {
            self.zero.wait(&mut remaining);
        }
    }

    pub fn remaining(&self) -> usize {
        *self.remaining.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn empty_batch_completes_immediately() {
        let tracker: CompletionTracker<u8, ()> = CompletionTracker::new(0);
        assert_eq!(tracker.await_completion().unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn results_keep_slot_order() {
        let tracker: CompletionTracker<&str, ()> = CompletionTracker::new(3);
        for (index, value) in [(2, "c"), (0, "a"), (1, "b")] {
            tracker.report_result(index, value).unwrap();
            tracker.mark_done().unwrap();
        }
        assert_eq!(tracker.await_completion().unwrap(), vec!["a", "b", "c"]);
    }

    #[test]
    fn first_failure_is_primary() {
        let tracker: CompletionTracker<u32, &str> = CompletionTracker::new(3);
        tracker.report_result(0, 1).unwrap();
        tracker.report_failure(TaskFailure::Error("first"));
        tracker.report_failure(TaskFailure::Error("second"));
        for _ in 0..3 {
            tracker.mark_done().unwrap();
        }

        let failure = match tracker.await_completion() {
            Err(Error::Failed(failure)) => failure,
            other => panic!("expected failure, got {other:?}"),
        };
        assert_eq!(failure.task_error(), Some(&"first"));
        assert_eq!(failure.suppressed(), &[TaskFailure::Error("second")]);
    }

    #[test]
    fn mark_done_past_zero_fails_fast() {
        let tracker: CompletionTracker<(), ()> = CompletionTracker::new(1);
        tracker.mark_done().unwrap();
        assert!(matches!(tracker.mark_done(), Err(Error::IllegalState(_))));
        assert_eq!(tracker.remaining(), 0);
    }

    #[test]
    fn out_of_range_slot_is_rejected() {
        let tracker: CompletionTracker<u8, ()> = CompletionTracker::new(2);
        assert!(matches!(tracker.report_result(2, 0), Err(Error::IllegalState(_))));
    }

    #[test]
    fn results_are_collected_once() {
        let tracker: CompletionTracker<u8, ()> = CompletionTracker::new(1);
        tracker.report_result(0, 5).unwrap();
        tracker.mark_done().unwrap();
        assert_eq!(tracker.await_completion().unwrap(), vec![5]);
        assert!(matches!(tracker.await_completion(), Err(Error::IllegalState(_))));
    }

    #[test]
    fn missing_result_is_an_error() {
        let tracker: CompletionTracker<u8, ()> = CompletionTracker::new(1);
        tracker.mark_done().unwrap();
        assert!(matches!(tracker.await_completion(), Err(Error::IllegalState(_))));
    }

    #[test]
    fn await_blocks_until_last_task() {
        let tracker: Arc<CompletionTracker<usize, ()>> = Arc::new(CompletionTracker::new(4));
        let workers: Vec<_> = (0..4)
            .map(|i| {
                let tracker = Arc::clone(&tracker);
                thread::spawn(move || {
                    thread::sleep(Duration::from_millis(10 * (4 - i as u64)));
                    tracker.report_result(i, i * i).unwrap();
                    tracker.mark_done().unwrap();
                })
            })
            .collect();

        assert_eq!(tracker.await_completion().unwrap(), vec![0, 1, 4, 9]);
        for worker in workers {
            worker.join().unwrap();
        }
    }

    #[test]
    fn wait_group_counts_down() {
        let group = Arc::new(WaitGroup::new(3));
        let handles: Vec<_> = (0..3)
            .map(|_| {
                let group = Arc::clone(&group);
                thread::spawn(move || group.done().unwrap())
            })
            .collect();

        group.wait();
        assert_eq!(group.remaining(), 0);
        assert!(matches!(group.done(), Err(Error::IllegalState(_))));
        for handle in handles {
            handle.join().unwrap();
        }
    }
}
