//! Partitioning of a flat index space into contiguous chunks.
//!
//! The dispatcher cuts `[0, count)` into chunks and hands each one to a
//! worker. Chunks are contiguous, non-overlapping, and together cover the
//! whole space, which is what makes every index run exactly once.

use crate::core::config::DispatchConfig;
use std::ops::Range as FlatRange;

/// A contiguous run of flat indices handed to one worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunk {
    /// Position of this chunk in dispatch order.
    pub index: usize,
    /// First flat index (inclusive).
    pub start: usize,
    /// One past the last flat index.
    pub end: usize,
}

impl Chunk {
    /// Create a new chunk.
    pub fn new(index: usize, start: usize, end: usize) -> Self {
        Self { index, start, end }
    }

    /// Number of indices in this chunk.
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    /// Whether this chunk holds no indices.
    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    /// The flat indices as a std range.
    pub fn indices(&self) -> FlatRange<usize> {
        self.start..self.end
    }
}

/// Pick a chunk size for `count` items spread over `workers` workers.
///
/// Aims for `chunks_per_worker` chunks per worker but never goes below
/// `min_chunk_size` (or 1).
pub fn chunk_size_for(count: usize, workers: usize, config: &DispatchConfig) -> usize {
    let target_chunks = workers.max(1) * config.chunks_per_worker.max(1);
    let even = count / target_chunks + usize::from(count % target_chunks != 0);
    even.max(config.min_chunk_size).max(1)
}

/// Iterator over the chunks of `[0, count)`.
#[derive(Debug, Clone)]
pub struct ChunkIterator {
    count: usize,
    chunk_size: usize,
    next_start: usize,
    next_index: usize,
}

impl ChunkIterator {
    /// Create a chunk iterator with a fixed chunk size.
    pub fn new(count: usize, chunk_size: usize) -> Self {
        Self {
            count,
            chunk_size: chunk_size.max(1),
            next_start: 0,
            next_index: 0,
        }
    }

    /// Create a chunk iterator sized for a pool and configuration.
    pub fn for_workers(count: usize, workers: usize, config: &DispatchConfig) -> Self {
        Self::new(count, chunk_size_for(count, workers, config))
    }

    /// Get the total number of chunks.
    pub fn chunk_count(&self) -> usize {
        self.count / self.chunk_size + usize::from(self.count % self.chunk_size != 0)
    }

    /// Size of every chunk except possibly the last.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }
}

impl Iterator for ChunkIterator {
    type Item = Chunk;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next_start >= self.count {
            return None;
        }

        let start = self.next_start;
        let end = start.saturating_add(self.chunk_size).min(self.count);
        let chunk = Chunk::new(self.next_index, start, end);

        self.next_start = end;
        self.next_index += 1;
        Some(chunk)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.count.saturating_sub(self.next_start);
        let remaining = left / self.chunk_size + usize::from(left % self.chunk_size != 0);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for ChunkIterator {}
