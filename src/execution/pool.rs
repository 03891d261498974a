//! Worker pools that dispatched chunks run on.
//!
//! The queue never spawns threads. It hands zero-argument tasks to a
//! [`TaskPool`] and relies on [`TaskPool::run_batch`] returning only after
//! every task has finished. Tasks may borrow from the caller's stack, which
//! is what lets kernels capture host data and accessors by reference.

use crate::core::config::DispatchConfig;
use crate::core::error::{ConfigurationError, OffloadResult};
use std::fmt;
use std::sync::Arc;

/// A unit of work submitted to a pool.
pub type Task<'s> = Box<dyn FnOnce() + Send + 's>;

/// Shared handle to a pool.
pub type SharedPool = Arc<dyn TaskPool>;

/// Submit-and-join facility the dispatcher schedules onto.
pub trait TaskPool: Send + Sync {
    /// Number of tasks the pool can run concurrently.
    fn num_workers(&self) -> usize;

    /// Run every task and return once all of them have completed.
    ///
    /// Tasks must not panic; the dispatcher catches kernel panics before they
    /// reach the pool.
    fn run_batch<'s>(&self, tasks: Vec<Task<'s>>);
}

/// Multi-threaded pool backed by a dedicated rayon thread pool.
pub struct WorkerPool {
    pool: rayon::ThreadPool,
}

impl WorkerPool {
    /// Create a pool with `threads` workers (0 = available parallelism).
    pub fn new(threads: usize) -> OffloadResult<Self> {
        Self::from_config(&DispatchConfig::new().with_worker_threads(threads))
    }

    /// Create a pool sized and named from a configuration.
    pub fn from_config(config: &DispatchConfig) -> OffloadResult<Self> {
        let threads = config.resolved_worker_threads();
        let prefix = config.thread_name_prefix.clone();
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(move |i| format!("{}-{}", prefix, i))
            .build()
            .map_err(|e| ConfigurationError::InvalidOption {
                option: "worker_threads",
                reason: e.to_string(),
            })?;

        log::debug!("started worker pool with {} threads", pool.current_num_threads());
        Ok(Self { pool })
    }

    /// Wrap this pool in a shared handle.
    pub fn shared(self) -> SharedPool {
        Arc::new(self)
    }
}

impl TaskPool for WorkerPool {
    fn num_workers(&self) -> usize {
        self.pool.current_num_threads()
    }

    fn run_batch<'s>(&self, tasks: Vec<Task<'s>>) {
        self.pool.scope(move |scope| {
            for task in tasks {
                scope.spawn(move |_| task());
            }
        });
    }
}

impl fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerPool")
            .field("threads", &self.pool.current_num_threads())
            .finish()
    }
}

/// Degenerate pool that runs every task on the calling thread, in order.
#[derive(Debug, Clone, Copy, Default)]
pub struct InlinePool;

impl InlinePool {
    /// Wrap this pool in a shared handle.
    pub fn shared(self) -> SharedPool {
        Arc::new(self)
    }
}

impl TaskPool for InlinePool {
    fn num_workers(&self) -> usize {
        1
    }

    fn run_batch<'s>(&self, tasks: Vec<Task<'s>>) {
        for task in tasks {
            task();
        }
    }
}
