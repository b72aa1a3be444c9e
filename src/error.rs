//! Error types shared by the queue, pool, mapper and driver.
//!
//! Failures are split by who caused them:
//!
//! - [`ConfigError`] - bad construction parameters, raised before any thread exists
//! - [`TaskFailure`] - one task went wrong (user error, panic, or never ran)
//! - [`Failure`] - the first task failure of a batch with every later one attached
//! - [`Error`] - what the public operations return

use std::convert::Infallible;
use std::fmt;
use std::io;

use thiserror::Error;

// =============================================================================
// Configuration errors
// =============================================================================

/// Invalid construction parameters.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("thread count must be positive, got {0}")]
    InvalidThreads(usize),

    #[error("step must be at least 1, got {0}")]
    InvalidStep(usize),

    #[error("queue capacity must be positive, got {0}")]
    InvalidCapacity(usize),

    #[error("failed to parse pool config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to read pool config: {0}")]
    Io(#[from] io::Error),
}

// =============================================================================
// Per-task failures
// =============================================================================

/// Why a single task did not produce a value.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TaskFailure<E> {
    /// The user function returned `Err`.
    #[error("{0}")]
    Error(E),

    /// The user function panicked; holds the panic message.
    #[error("task panicked: {0}")]
    Panic(String),

    /// The task was discarded before it ran.
    #[error("task cancelled before it ran")]
    Cancelled,
}

impl<E> TaskFailure<E> {
    /// The user error, if this failure carries one.
    pub fn as_error(&self) -> Option<&E> {
        match self {
            TaskFailure::Error(e) => Some(e),
            _ => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, TaskFailure::Cancelled)
    }
}

// =============================================================================
// Aggregated batch failure
// =============================================================================

/// The first failure reported by a batch, with every later failure kept
/// as a suppressed entry in report order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure<E> {
    primary: TaskFailure<E>,
    suppressed: Vec<TaskFailure<E>>,
}

impl<E> Failure<E> {
    pub fn new(primary: TaskFailure<E>) -> Self {
        Failure {
            primary,
            suppressed: Vec::new(),
        }
    }

    pub fn add_suppressed(&mut self, failure: TaskFailure<E>) {
        self.suppressed.push(failure);
    }

    pub fn primary(&self) -> &TaskFailure<E> {
        &self.primary
    }

    pub fn suppressed(&self) -> &[TaskFailure<E>] {
        &self.suppressed
    }

    /// Total number of failures, primary included.
    pub fn len(&self) -> usize {
        1 + self.suppressed.len()
    }

    pub fn into_primary(self) -> TaskFailure<E> {
        self.primary
    }

    pub fn into_parts(self) -> (TaskFailure<E>, Vec<TaskFailure<E>>) {
        (self.primary, self.suppressed)
    }

    /// The user error that became the primary failure, if any.
    pub fn task_error(&self) -> Option<&E> {
        self.primary.as_error()
    }

    /// Every failure in report order, primary first.
    pub fn iter(&self) -> impl Iterator<Item = &TaskFailure<E>> {
        std::iter::once(&self.primary).chain(self.suppressed.iter())
    }
}

impl<E: fmt::Display> fmt::Display for Failure<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.primary)?;
        if !self.suppressed.is_empty() {
            write!(f, " ({} more suppressed)", self.suppressed.len())?;
        }
        Ok(())
    }
}

impl<E: fmt::Debug + fmt::Display> std::error::Error for Failure<E> {}

// =============================================================================
// Top-level error
// =============================================================================

/// Error returned by the public operations of this crate.
///
/// `E` is the error type of the user function; operations whose user
/// functions cannot fail use the default `Infallible`.
#[derive(Error, Debug)]
pub enum Error<E = Infallible> {
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The mapper (or pool) has been closed.
    #[error("mapper is closed")]
    Closed,

    /// A lifecycle rule was broken, e.g. a counter driven below zero.
    #[error("illegal state: {0}")]
    IllegalState(&'static str),

    #[error("failed to spawn thread: {0}")]
    Spawn(#[source] io::Error),

    /// Some threads panicked outside of any task; all threads were still joined.
    #[error("{count} thread(s) panicked while being joined")]
    ThreadPanicked { count: usize },

    /// At least one task of the batch failed.
    #[error("{0}")]
    Failed(Failure<E>),
}

impl<E> Error<E> {
    /// The batch failure, if this error is one.
    pub fn failure(&self) -> Option<&Failure<E>> {
        match self {
            Error::Failed(failure) => Some(failure),
            _ => None,
        }
    }

    /// The primary user error, if the batch failed with one.
    pub fn task_error(&self) -> Option<&E> {
        self.failure().and_then(Failure::task_error)
    }
}

impl Error<Infallible> {
    /// Widens an error produced by an infallible operation.
    pub fn widen<E>(self) -> Error<E> {
        match self {
            Error::Config(e) => Error::Config(e),
            Error::Closed => Error::Closed,
            Error::IllegalState(msg) => Error::IllegalState(msg),
            Error::Spawn(e) => Error::Spawn(e),
            Error::ThreadPanicked { count } => Error::ThreadPanicked { count },
            Error::Failed(failure) => {
                let (primary, suppressed) = failure.into_parts();
                let mut widened = Failure::new(widen_failure(primary));
                for failure in suppressed {
                    widened.add_suppressed(widen_failure(failure));
                }
                Error::Failed(widened)
            }
        }
    }
}

fn widen_failure<E>(failure: TaskFailure<Infallible>) -> TaskFailure<E> {
    match failure {
        TaskFailure::Error(never) => match never {},
        TaskFailure::Panic(msg) => TaskFailure::Panic(msg),
        TaskFailure::Cancelled => TaskFailure::Cancelled,
    }
}

/// Result alias used across the crate.
pub type Result<T, E = Infallible> = std::result::Result<T, Error<E>>;

/// Extracts a readable message from a panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
