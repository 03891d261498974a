//! The dispatch entry point.
//!
//! A [`Queue`] holds a handle to a worker pool and a [`DispatchConfig`]. It
//! keeps no other state between submissions, so queues are cheap to create
//! and several may share one pool.
//!
//! Both [`Queue::submit`] and [`Queue::parallel_for`] block until every
//! work-item of the call has finished. Buffers dropped right after a call
//! returns therefore always see completed results.

use crate::core::config::DispatchConfig;
use crate::core::error::{KernelOutput, OffloadResult};
use crate::core::index::{Range, WorkItem};
use crate::execution::dispatch::DispatchStats;
use crate::execution::handler::Handler;
use crate::execution::pool::{SharedPool, WorkerPool};
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Completion record of a submission.
///
/// Submissions are synchronous, so an event is already complete when the
/// caller receives it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Event {
    stats: DispatchStats,
}

impl Event {
    fn new(stats: DispatchStats) -> Self {
        Self { stats }
    }

    /// Wait for the submission to finish. Returns immediately.
    pub fn wait(&self) {}

    /// Dispatch statistics for the submission.
    pub fn stats(&self) -> &DispatchStats {
        &self.stats
    }

    /// Number of work-items the submission ran.
    pub fn work_items(&self) -> usize {
        self.stats.work_items
    }

    /// Wall time spent dispatching.
    pub fn duration(&self) -> Duration {
        self.stats.duration
    }
}

/// Running totals over every submission made through a queue and its clones.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStats {
    /// Command groups submitted.
    pub submissions: usize,
    /// Submissions that returned an error.
    pub failed_submissions: usize,
    /// Work-items executed.
    pub work_items: usize,
    /// Time spent inside dispatches.
    pub busy: Duration,
}

impl QueueStats {
    fn record(&mut self, result: &OffloadResult<Event>) {
        self.submissions += 1;
        match result {
            Ok(event) => {
                self.work_items += event.stats.work_items;
                self.busy += event.stats.duration;
            }
            Err(_) => self.failed_submissions += 1,
        }
    }
}

/// Dispatches command groups onto a worker pool.
#[derive(Clone)]
pub struct Queue {
    pool: SharedPool,
    config: DispatchConfig,
    stats: Arc<Mutex<QueueStats>>,
}

impl Queue {
    /// Create a queue with its own pool sized to the available parallelism.
    pub fn new() -> OffloadResult<Self> {
        Self::from_config(DispatchConfig::default())
    }

    /// Create a queue with its own pool built from `config`.
    pub fn from_config(config: DispatchConfig) -> OffloadResult<Self> {
        config.validate()?;
        let pool = WorkerPool::from_config(&config)?.shared();
        Ok(Self::assemble(pool, config))
    }

    /// Create a queue on an existing pool with default dispatch options.
    pub fn with_pool(pool: SharedPool) -> Self {
        Self::assemble(pool, DispatchConfig::default())
    }

    /// Create a queue on an existing pool with explicit dispatch options.
    ///
    /// `config.worker_threads` is ignored; the pool decides its own size.
    pub fn with_pool_and_config(pool: SharedPool, config: DispatchConfig) -> OffloadResult<Self> {
        config.validate()?;
        Ok(Self::assemble(pool, config))
    }

    fn assemble(pool: SharedPool, config: DispatchConfig) -> Self {
        Self {
            pool,
            config,
            stats: Arc::new(Mutex::new(QueueStats::default())),
        }
    }

    /// Number of workers in the underlying pool.
    pub fn num_workers(&self) -> usize {
        self.pool.num_workers()
    }

    /// The dispatch options in use.
    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    /// The pool this queue schedules onto.
    pub fn pool(&self) -> &SharedPool {
        &self.pool
    }

    /// Totals over every submission so far.
    pub fn stats(&self) -> QueueStats {
        *self.stats.lock()
    }

    /// Run a command group.
    ///
    /// `cgf` is called on the current thread with a fresh [`Handler`]. Any
    /// `parallel_for` it issues has completed by the time this returns. The
    /// first kernel failure (lowest linear id) is returned as an error after
    /// every other work-item has run.
    pub fn submit<F>(&self, cgf: F) -> OffloadResult<Event>
    where
        F: FnOnce(&Handler<'_>),
    {
        let handler = Handler::new(self.pool.as_ref(), &self.config);
        cgf(&handler);

        let result = handler.finish().map(|outcome| match outcome {
            Some(stats) => Event::new(stats),
            None => {
                log::warn!("command group finished without a parallel_for");
                Event::default()
            }
        });
        self.stats.lock().record(&result);
        result
    }

    /// Shorthand for a command group holding a single `parallel_for`.
    ///
    /// Suited to kernels that capture host data directly rather than through
    /// buffers.
    pub fn parallel_for<const N: usize, I, K, R>(
        &self,
        range: impl Into<Range<N>>,
        kernel: K,
    ) -> OffloadResult<Event>
    where
        I: WorkItem<N>,
        K: Fn(I) -> R + Sync,
        R: KernelOutput,
    {
        let range = range.into();
        self.submit(move |h| h.parallel_for(range, kernel))
    }

    /// Wait for all submitted work. Returns immediately, since every
    /// submission is already complete when it returns.
    pub fn wait(&self) {}
}

impl fmt::Debug for Queue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Queue")
            .field("workers", &self.pool.num_workers())
            .field("config", &self.config)
            .field("stats", &*self.stats.lock())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::{ConfigurationError, KernelError, OffloadError};
    use crate::core::index::{Id, Item};
    use crate::execution::pool::InlinePool;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_queue_from_config() {
        let queue = Queue::from_config(DispatchConfig::new().with_worker_threads(3)).unwrap();
        assert_eq!(queue.num_workers(), 3);
    }

    #[test]
    fn test_queue_rejects_bad_config() {
        let err = Queue::from_config(DispatchConfig::new().with_min_chunk_size(0)).unwrap_err();
        assert!(matches!(
            err,
            OffloadError::Configuration(ConfigurationError::InvalidOption { .. })
        ));
    }

    #[test]
    fn test_direct_parallel_for() {
        let queue = Queue::from_config(DispatchConfig::new().with_worker_threads(2)).unwrap();
        let cells: Vec<AtomicUsize> = (0..30).map(|_| AtomicUsize::new(0)).collect();

        let event = queue
            .parallel_for(Range::new([5, 6]), |item: Item<2>| {
                cells[item.get_linear_id()].store(item.get(0) * 10 + item.get(1), Ordering::Relaxed);
            })
            .unwrap();
        event.wait();

        assert_eq!(event.work_items(), 30);
        assert_eq!(cells[2 * 6 + 3].load(Ordering::Relaxed), 23);
        assert_eq!(cells[4 * 6 + 5].load(Ordering::Relaxed), 45);
    }

    #[test]
    fn test_submit_without_parallel_for() {
        let queue = Queue::with_pool(InlinePool.shared());
        let event = queue.submit(|_h| {}).unwrap();
        assert_eq!(event.work_items(), 0);
    }

    #[test]
    fn test_submit_propagates_kernel_error() {
        let queue = Queue::with_pool(InlinePool.shared());
        let ran = AtomicUsize::new(0);
        let err = queue
            .parallel_for(Range::new([10]), |id: Id<1>| -> Result<(), String> {
                ran.fetch_add(1, Ordering::Relaxed);
                if id[0] >= 6 {
                    Err("threshold exceeded".to_string())
                } else {
                    Ok(())
                }
            })
            .unwrap_err();

        assert_eq!(ran.load(Ordering::Relaxed), 10);
        assert!(matches!(
            err,
            OffloadError::Kernel(KernelError::Failed { linear_id: 6, .. })
        ));
        assert_eq!(queue.stats().failed_submissions, 1);
    }

    #[test]
    fn test_queues_share_a_pool() {
        let pool = WorkerPool::new(2).unwrap().shared();
        let a = Queue::with_pool(Arc::clone(&pool));
        let b = Queue::with_pool(pool);
        let total = AtomicUsize::new(0);

        a.parallel_for(Range::new([100]), |_: Id<1>| {
            total.fetch_add(1, Ordering::Relaxed);
        })
        .unwrap();
        b.parallel_for(Range::new([50]), |_: Id<1>| {
            total.fetch_add(1, Ordering::Relaxed);
        })
        .unwrap();

        assert_eq!(total.load(Ordering::Relaxed), 150);
        assert_eq!(a.num_workers(), b.num_workers());
    }

    #[test]
    fn test_stats_shared_between_clones() {
        let queue = Queue::with_pool(InlinePool.shared());
        let clone = queue.clone();
        queue.parallel_for(Range::new([12]), |_: Id<1>| {}).unwrap();
        clone.parallel_for(Range::new([3, 3]), |_: Id<2>| {}).unwrap();
        clone.submit(|_h| {}).unwrap();

        let stats = queue.stats();
        assert_eq!(stats.submissions, 3);
        assert_eq!(stats.failed_submissions, 0);
        assert_eq!(stats.work_items, 21);
    }

    #[test]
    fn test_successive_submits_are_ordered() {
        let queue = Queue::from_config(DispatchConfig::new().with_worker_threads(4)).unwrap();
        let values: Vec<AtomicUsize> = (0..256).map(|_| AtomicUsize::new(1)).collect();

        queue
            .parallel_for(Range::new([256]), |id: Id<1>| {
                values[id[0]].fetch_add(1, Ordering::Relaxed);
            })
            .unwrap();
        queue
            .parallel_for(Range::new([256]), |id: Id<1>| {
                let v = values[id[0]].load(Ordering::Relaxed);
                values[id[0]].store(v * 10, Ordering::Relaxed);
            })
            .unwrap();
        queue.wait();

        assert!(values.iter().all(|v| v.load(Ordering::Relaxed) == 20));
    }
}
