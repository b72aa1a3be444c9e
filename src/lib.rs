//! # parmap
//!
//! Task-parallel list processing on plain OS threads.
//!
//! ## Building blocks
//!
//! 1. [`TaskQueue`] - blocking FIFO, bounded or unbounded
//! 2. [`WorkerPool`] - fixed set of workers draining the queue
//! 3. [`CompletionTracker`] - per-batch counter, ordered results and failure funnel
//! 4. [`ParallelMapper`] - `map(f, inputs)` on top of the three above
//! 5. [`IterativeParallelism`] - max/min/all/any/count/join/filter/map/reduce
//!    over strided blocks, on its own threads or on a mapper
//!
//! ## Example
//!
//! ```rust
//! use parmap::{IterativeParallelism, ParallelMapper};
//!
//! let mapper = ParallelMapper::new(2).unwrap();
//! assert_eq!(mapper.map(|x: i32| x * 2, vec![1, 2, 3]).unwrap(), vec![2, 4, 6]);
//!
//! let ip = IterativeParallelism::with_executor(&mapper);
//! let max = ip.maximum(3, vec![5, 1, 9, 3, 7, 2], i32::cmp, 1).unwrap();
//! assert_eq!(max, Some(9));
//!
//! mapper.close().unwrap();
//! ```
//!
//! ## Failures
//!
//! A call returns either every result in input order or one
//! [`Error::Failed`] holding the first task failure, with the rest kept
//! as suppressed entries. User errors come back unchanged inside
//! [`TaskFailure::Error`]; panics are caught and reported as
//! [`TaskFailure::Panic`], so a worker never dies with a task.

pub mod config;
pub mod error;
pub mod executor;
pub mod iterative;
pub mod join;
pub mod logging;
pub mod mapper;
pub mod partition;
pub mod pool;
pub mod queue;
pub mod task;
pub mod tracker;

pub use config::PoolConfig;
pub use error::{ConfigError, Error, Failure, Result, TaskFailure};
pub use executor::{Executor, ThreadPerTask};
pub use iterative::IterativeParallelism;
pub use mapper::ParallelMapper;
pub use partition::{partition, Block, Segment};
pub use pool::{PoolState, WorkerPool};
pub use queue::{Closed, TaskQueue};
pub use task::{BoxedJob, Job, Task};
pub use tracker::{CompletionTracker, WaitGroup};
