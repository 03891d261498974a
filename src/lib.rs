//! # cpu_offload - CPU fallback for parallel-for kernel dispatch
//!
//! `cpu_offload` runs offload-style kernels on a pool of CPU worker threads.
//! It provides the pieces such kernels are written against:
//!
//! - **Index spaces**: `Range<N>`, `Id<N>` and `Item<N>` with a single
//!   row-major linearization rule (last dimension fastest)
//! - **Queues**: command groups submitted through a [`Handler`], or a direct
//!   `parallel_for`; every call blocks until all of its work-items have run
//! - **Buffers**: private storage over host memory, written back exactly
//!   once when the buffer goes out of scope
//! - **Sampled images**: clamp-to-edge reads over flat voxel arrays with
//!   nearest or multilinear filtering
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use cpu_offload::prelude::*;
//!
//! let queue = Queue::new()?;
//! let mut data: Vec<i32> = (0..64).collect();
//! {
//!     let buffer = Buffer::from_host(&mut data, Range::new([64]))?;
//!     queue.submit(|h| {
//!         let acc = Accessor::new(&buffer, h);
//!         h.parallel_for(Range::new([64]), move |id: Id<1>| acc.update(id, |v| *v *= 2));
//!     })?;
//! }
//! assert_eq!(data[63], 126);
//! ```
//!
//! ## Architecture
//!
//! - [`core`]: index types, errors and configuration
//! - [`execution`]: worker pools, partitioning, handler and queue
//! - [`memory`]: buffers and accessors
//! - [`sampling`]: samplers and sampled images
//!
//! Kernels that fail (by returning `Err` or panicking) do not stop the rest
//! of the batch. The failure with the lowest linear id is returned from
//! `submit` once every work-item has run.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod core;
pub mod execution;
pub mod memory;
pub mod sampling;

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use cpu_offload::prelude::*;
/// ```
pub mod prelude {
    // Index space
    pub use crate::core::index::{Id, Item, Range, WorkItem};

    // Errors and configuration
    pub use crate::core::config::DispatchConfig;
    pub use crate::core::error::{
        ConfigurationError, KernelError, KernelOutput, KernelResult, OffloadError, OffloadResult,
    };

    // Execution
    pub use crate::execution::dispatch::DispatchStats;
    pub use crate::execution::handler::Handler;
    pub use crate::execution::pool::{InlinePool, SharedPool, TaskPool, WorkerPool};
    pub use crate::execution::queue::{Event, Queue, QueueStats};

    // Memory
    pub use crate::memory::accessor::{AccessMode, Accessor};
    pub use crate::memory::buffer::Buffer;

    // Sampling
    pub use crate::sampling::image::{Float4, SampledImage, Voxel};
    pub use crate::sampling::sampler::{
        AddressingMode, CoordinateNormalization, FilteringMode, ImageSampler,
    };
}

pub use execution::handler::Handler;

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name.
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Install `env_logger` as the `log` backend, configured from `RUST_LOG`.
///
/// Safe to call more than once; later calls do nothing.
pub fn init_logging() {
    if env_logger::builder().try_init().is_ok() {
        log::debug!("{} {} logging initialised", NAME, VERSION);
    }
}
