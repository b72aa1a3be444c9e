//! Blocking FIFO queue shared by task producers and pool workers.
//!
//! One mutex guards the items and the closed flag. Two condition
//! variables separate the waiters: `not_empty` for consumers blocked in
//! [`TaskQueue::poll`], `not_full` for producers blocked in
//! [`TaskQueue::add`] on a bounded queue. Each successful add/poll wakes
//! exactly one waiter on the opposite side; closing wakes everyone.

use std::collections::VecDeque;
use std::fmt;

use parking_lot::{Condvar, Mutex};
use tracing::trace;

use crate::error::ConfigError;

/// Returned by [`TaskQueue::add`] when the queue is closed; gives the item back.
#[derive(Debug, PartialEq, Eq)]
pub struct Closed<T>(pub T);

impl<T> Closed<T> {
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> fmt::Display for Closed<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "queue is closed")
    }
}

impl<T: fmt::Debug> std::error::Error for Closed<T> {}

struct State<T> {
    items: VecDeque<T>,
    closed: bool,
}

pub struct TaskQueue<T> {
    state: Mutex<State<T>>,
    not_empty: Condvar,
    not_full: Condvar,
    capacity: Option<usize>,
}

impl<T> TaskQueue<T> {
    pub fn unbounded() -> Self {
        Self::build(None)
    }

    /// A queue holding at most `capacity` items; `capacity` must be positive.
    pub fn bounded(capacity: usize) -> Result<Self, ConfigError> {
        Self::with_capacity(Some(capacity))
    }

    /// Bounded for `Some(capacity)`, unbounded for `None`.
    pub fn with_capacity(capacity: Option<usize>) -> Result<Self, ConfigError> {
        match capacity {
            Some(0) => Err(ConfigError::InvalidCapacity(0)),
            capacity => Ok(Self::build(capacity)),
        }
    }

    fn build(capacity: Option<usize>) -> Self {
        let items = match capacity {
            Some(capacity) => VecDeque::with_capacity(capacity),
            None => VecDeque::new(),
        };
        TaskQueue {
            state: Mutex::new(State {
                items,
                closed: false,
            }),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
            capacity,
        }
    }

    /// Appends `item` at the tail.
    ///
    /// Blocks while a bounded queue is full. Fails with the item handed
    /// back if the queue is closed, including while waiting for space.
    pub fn add(&self, item: T) -> Result<(), Closed<T>> {
        let mut state = self.state.lock();
        while !state.closed && self.is_full(&state) {
            self.not_full.wait(&mut state);
        }
        if state.closed {
            return Err(Closed(item));
        }
        state.items.push_back(item);
        self.not_empty.notify_one();
        Ok(())
    }

    /// Removes and returns the head, blocking until one is available.
    ///
    /// Returns `None` once the queue is closed, even if items remain;
    /// those are handed to whoever called [`TaskQueue::close`].
    pub fn poll(&self) -> Option<T> {
        let mut state = self.state.lock();
        while !state.closed && state.items.is_empty() {
            self.not_empty.wait(&mut state);
        }
        if state.closed {
            return None;
        }
        let item = state.items.pop_front();
        self.not_full.notify_one();
        item
    }

    /// Removes the head without blocking.
    pub fn try_poll(&self) -> Option<T> {
        let mut state = self.state.lock();
        if state.closed {
            return None;
        }
        let item = state.items.pop_front();
        if item.is_some() {
            self.not_full.notify_one();
        }
        item
    }

    /// Closes the queue and returns every item still waiting.
    ///
    /// All blocked producers and consumers wake up. Closing twice is
    /// harmless; the second call returns nothing.
    pub fn close(&self) -> Vec<T> {
        let mut state = self.state.lock();
        state.closed = true;
        let drained: Vec<T> = state.items.drain(..).collect();
        self.not_empty.notify_all();
        self.not_full.notify_all();
        trace!(drained = drained.len(), "Task queue closed");
        drained
    }

    pub fn len(&self) -> usize {
        self.state.lock().items.len()
    }

    /// Snapshot only: the answer may be stale as soon as the lock is released.
    pub fn is_empty(&self) -> bool {
        self.state.lock().items.is_empty()
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    fn is_full(&self, state: &State<T>) -> bool {
        matches!(self.capacity, Some(capacity) if state.items.len() >= capacity)
    }
}

impl<T> Default for TaskQueue<T> {
    fn default() -> Self {
        Self::unbounded()
    }
}

impl<T> fmt::Debug for TaskQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("TaskQueue")
            .field("len", &state.items.len())
            .field("capacity", &self.capacity)
            .field("closed", &state.closed)
            .finish()
    }
}
