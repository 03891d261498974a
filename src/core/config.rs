//! Dispatch configuration.
//!
//! Controls how many workers a queue's pool owns and how finely the flat
//! index space is cut into chunks. Can be built in code with the `with_*`
//! methods or loaded from TOML:
//!
//! ```toml
//! worker_threads = 8
//! chunks_per_worker = 4
//! min_chunk_size = 256
//! ```

use crate::core::error::{ConfigurationError, OffloadResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default number of chunks handed to each worker per dispatch.
pub const DEFAULT_CHUNKS_PER_WORKER: usize = 4;

/// Default lower bound on work-items per chunk.
pub const DEFAULT_MIN_CHUNK_SIZE: usize = 64;

/// Configuration for a queue and its worker pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Number of worker threads (0 = available parallelism).
    pub worker_threads: usize,
    /// Target number of chunks per worker for each dispatch.
    pub chunks_per_worker: usize,
    /// Smallest chunk the partitioner will produce (except the tail chunk).
    pub min_chunk_size: usize,
    /// Prefix for worker thread names.
    pub thread_name_prefix: String,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            worker_threads: 0,
            chunks_per_worker: DEFAULT_CHUNKS_PER_WORKER,
            min_chunk_size: DEFAULT_MIN_CHUNK_SIZE,
            thread_name_prefix: "offload-worker".to_string(),
        }
    }
}

impl DispatchConfig {
    /// Create a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of worker threads.
    pub fn with_worker_threads(mut self, threads: usize) -> Self {
        self.worker_threads = threads;
        self
    }

    /// Set the number of chunks per worker.
    pub fn with_chunks_per_worker(mut self, chunks: usize) -> Self {
        self.chunks_per_worker = chunks;
        self
    }

    /// Set the minimum chunk size.
    pub fn with_min_chunk_size(mut self, size: usize) -> Self {
        self.min_chunk_size = size;
        self
    }

    /// Set the worker thread name prefix.
    pub fn with_thread_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.thread_name_prefix = prefix.into();
        self
    }

    /// Resolve `worker_threads`, substituting available parallelism for 0.
    pub fn resolved_worker_threads(&self) -> usize {
        if self.worker_threads > 0 {
            return self.worker_threads;
        }
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(2)
    }

    /// Check that every option is usable.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.chunks_per_worker == 0 {
            return Err(ConfigurationError::InvalidOption {
                option: "chunks_per_worker",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.min_chunk_size == 0 {
            return Err(ConfigurationError::InvalidOption {
                option: "min_chunk_size",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// Parse and validate a configuration from TOML text.
    pub fn from_toml_str(text: &str) -> OffloadResult<Self> {
        let config: DispatchConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> OffloadResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }
}
