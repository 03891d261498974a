//! Kernel dispatch over a worker pool.
//!
//! One call to [`dispatch`] runs a kernel once for every coordinate of a
//! range:
//!
//! 1. `[0, range.count())` is cut into contiguous chunks.
//! 2. Each chunk becomes one pool task that decodes its flat indices back
//!    into work-items and invokes the kernel for each.
//! 3. Each task sends a [`ChunkReport`] over a channel when it is done.
//! 4. After the pool's batch barrier the calling thread drains the channel
//!    and surfaces the failure with the lowest linear id, if any.
//!
//! A failing or panicking work-item never stops the rest of its chunk.

use crate::core::config::DispatchConfig;
use crate::core::error::{KernelError, KernelOutput, OffloadError, OffloadResult};
use crate::core::index::{Range, WorkItem};
use crate::execution::partition::{Chunk, ChunkIterator};
use crate::execution::pool::{Task, TaskPool};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::time::{Duration, Instant};

/// Statistics for one dispatched batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    /// Number of work-items executed.
    pub work_items: usize,
    /// Number of chunks the index space was cut into.
    pub chunks: usize,
    /// Number of workers in the pool.
    pub workers: usize,
    /// Number of work-items whose kernel failed or panicked.
    pub failures: usize,
    /// Wall time from partitioning to the end of the barrier.
    pub duration: Duration,
}

/// Outcome of one chunk, sent from the worker to the caller.
#[derive(Debug)]
pub struct ChunkReport {
    /// The chunk that was run.
    pub chunk: Chunk,
    /// Work-items invoked (always `chunk.len()`).
    pub executed: usize,
    /// Work-items that failed.
    pub failures: usize,
    /// Lowest-indexed failure in this chunk.
    pub first_error: Option<KernelError>,
}

/// Run `kernel` once per coordinate of `range` on `pool` and block until done.
pub fn dispatch<const N: usize, I, K, R>(
    pool: &dyn TaskPool,
    config: &DispatchConfig,
    range: Range<N>,
    kernel: &K,
) -> OffloadResult<DispatchStats>
where
    I: WorkItem<N>,
    K: Fn(I) -> R + Sync,
    R: KernelOutput,
{
    let start_time = Instant::now();
    let count = range.try_count("dispatch range")?;
    let workers = pool.num_workers();
    let chunks = ChunkIterator::for_workers(count, workers, config);
    let chunk_count = chunks.chunk_count();

    log::debug!(
        "dispatching {} work-items over range {} as {} chunks of {} on {} workers",
        count,
        range,
        chunk_count,
        chunks.chunk_size(),
        workers
    );

    let (tx, rx) = crossbeam::channel::unbounded::<ChunkReport>();
    let tasks: Vec<Task<'_>> = chunks
        .map(|chunk| {
            let tx = tx.clone();
            Box::new(move || {
                let report = run_chunk(&range, chunk, kernel);
                // The receiver lives until after the barrier.
                let _ = tx.send(report);
            }) as Task<'_>
        })
        .collect();
    drop(tx);

    pool.run_batch(tasks);

    let mut stats = DispatchStats {
        chunks: chunk_count,
        workers,
        ..DispatchStats::default()
    };
    let mut first_error: Option<KernelError> = None;

    for report in rx.try_iter() {
        log::trace!(
            "chunk {} [{}, {}) finished with {} failures",
            report.chunk.index,
            report.chunk.start,
            report.chunk.end,
            report.failures
        );
        stats.work_items += report.executed;
        stats.failures += report.failures;
        if let Some(err) = report.first_error {
            let replace = first_error
                .as_ref()
                .map_or(true, |current| err.linear_id() < current.linear_id());
            if replace {
                first_error = Some(err);
            }
        }
    }
    stats.duration = start_time.elapsed();

    if stats.work_items != count {
        log::error!(
            "pool ran {} of {} work-items over range {}",
            stats.work_items,
            count,
            range
        );
        return Err(OffloadError::Incomplete {
            expected: count,
            executed: stats.work_items,
        });
    }

    if let Some(err) = first_error {
        log::warn!(
            "{} of {} work-items failed; reporting work-item {}",
            stats.failures,
            count,
            err.linear_id()
        );
        return Err(err.into());
    }

    log::debug!("dispatch of {} work-items finished in {:?}", count, stats.duration);
    Ok(stats)
}

/// Invoke the kernel for every index of one chunk.
fn run_chunk<const N: usize, I, K, R>(range: &Range<N>, chunk: Chunk, kernel: &K) -> ChunkReport
where
    I: WorkItem<N>,
    K: Fn(I) -> R,
    R: KernelOutput,
{
    let mut report = ChunkReport {
        chunk,
        executed: 0,
        failures: 0,
        first_error: None,
    };

    for linear in chunk.indices() {
        let item = I::from_linear(range, linear);
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| kernel(item).into_outcome()));
        report.executed += 1;

        let error = match outcome {
            Ok(Ok(())) => continue,
            Ok(Err(source)) => KernelError::Failed {
                linear_id: linear,
                source,
            },
            Err(payload) => KernelError::Panicked {
                linear_id: linear,
                message: panic_message(payload.as_ref()),
            },
        };

        report.failures += 1;
        if report.first_error.is_none() {
            report.first_error = Some(error);
        }
    }

    report
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
