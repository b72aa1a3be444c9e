//! Fixed-size worker pool draining a [`TaskQueue`].
//!
//! Workers loop `poll -> run` until the queue is closed. Shutdown walks
//! the lifecycle `Open -> Closing -> Closed`: close the queue, cancel
//! whatever was still queued, then join every worker before returning.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::{Condvar, Mutex};
use tracing::{debug, info, info_span};

use crate::config::PoolConfig;
use crate::error::Error;
use crate::join::join_all;
use crate::queue::{Closed, TaskQueue};
use crate::task::BoxedJob;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolState {
    Open,
    Closing,
    Closed,
}

struct Lifecycle {
    state: PoolState,
    workers: Vec<JoinHandle<()>>,
}

pub struct WorkerPool {
    queue: Arc<TaskQueue<BoxedJob>>,
    lifecycle: Mutex<Lifecycle>,
    /// Signalled when the state reaches `Closed`.
    closed: Condvar,
    live: Arc<AtomicUsize>,
    threads: usize,
}

/// Decrements the live-worker count however the worker loop ends.
struct LiveGuard(Arc<AtomicUsize>);

impl Drop for LiveGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl WorkerPool {
    /// Validates `config` and starts `config.threads` workers.
    pub fn new(config: &PoolConfig) -> Result<Self, Error> {
        config.validate()?;

        let queue = Arc::new(TaskQueue::with_capacity(config.queue_capacity)?);
        let live = Arc::new(AtomicUsize::new(0));
        let mut workers = Vec::with_capacity(config.threads);

        for index in 0..config.threads {
            let name = format!("{}-{}", config.thread_name, index);
            let spawned = thread::Builder::new().name(name).spawn({
                let queue = Arc::clone(&queue);
                let guard = LiveGuard(Arc::clone(&live));
                live.fetch_add(1, Ordering::SeqCst);
                move || worker_loop(&queue, guard)
            });
            match spawned {
                Ok(handle) => workers.push(handle),
                Err(e) => {
                    queue.close();
                    // Workers that did start exit on the closed queue; the
                    // spawn error is what the caller needs to see.
                    let _ = join_all::<std::convert::Infallible>(workers);
                    return Err(Error::Spawn(e));
                }
            }
        }

        info!(
            threads = config.threads,
            capacity = ?config.queue_capacity,
            "Worker pool started"
        );
        Ok(WorkerPool {
            queue,
            lifecycle: Mutex::new(Lifecycle {
                state: PoolState::Open,
                workers,
            }),
            closed: Condvar::new(),
            live,
            threads: config.threads,
        })
    }

    /// Queues a job. Hands the job back if the pool is no longer open.
    pub fn submit(&self, job: BoxedJob) -> Result<(), Closed<BoxedJob>> {
        self.queue.add(job)
    }

    /// Stops every worker and waits for all of them.
    ///
    /// Jobs still queued are dropped, which cancels them. Only the first
    /// call does the work; a call made while it runs waits for it, so no
    /// worker is alive once any call returns.
    pub fn shutdown(&self) -> Result<(), Error> {
        let _span = info_span!("pool_shutdown", threads = self.threads).entered();

        // The lifecycle lock is not held while joining: a running job may
        // still query the pool state before it finishes.
        let workers = {
            let mut lifecycle = self.lifecycle.lock();
            match lifecycle.state {
                PoolState::Closed => return Ok(()),
                PoolState::Closing => {
                    debug!("Waiting for a concurrent shutdown");
                    while lifecycle.state == PoolState::Closing {
                        self.closed.wait(&mut lifecycle);
                    }
                    return Ok(());
                }
                PoolState::Open => {}
            }
            lifecycle.state = PoolState::Closing;
            std::mem::take(&mut lifecycle.workers)
        };
        debug!(threads = self.threads, "Worker pool closing");

        let orphaned = self.queue.close();
        let cancelled = orphaned.len();
        drop(orphaned);

        let joined = join_all(workers);
        self.lifecycle.lock().state = PoolState::Closed;
        self.closed.notify_all();

        info!(cancelled, "Worker pool closed");
        joined
    }

    pub fn state(&self) -> PoolState {
        self.lifecycle.lock().state
    }

    pub fn is_open(&self) -> bool {
        self.state() == PoolState::Open
    }

    pub fn threads(&self) -> usize {
        self.threads
    }

    /// Number of worker threads that have not exited yet.
    pub fn live_workers(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    /// Jobs waiting in the queue right now.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }
}

fn worker_loop(queue: &TaskQueue<BoxedJob>, _guard: LiveGuard) {
    let name = thread::current().name().unwrap_or("worker").to_string();
    debug!(worker = %name, "Worker started");
    while let Some(job) = queue.poll() {
        job.run();
    }
    debug!(worker = %name, "Worker exiting");
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            tracing::error!(error = %e, "Worker pool shutdown failed");
        }
    }
}

impl fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerPool")
            .field("threads", &self.threads)
            .field("state", &self.state())
            .field("live", &self.live_workers())
            .field("queue", &self.queue)
            .finish()
    }
}
