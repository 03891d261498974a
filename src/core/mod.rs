//! Core types shared by the dispatcher, buffers and images.
//!
//! - Index space types (`Range`, `Id`, `Item`)
//! - Error types and kernel outcomes
//! - Dispatch configuration

pub mod index;
pub mod error;
pub mod config;

// Re-export commonly used types
pub use index::{Id, Item, Range, WorkItem};
pub use error::{ConfigurationError, KernelError, KernelOutput, KernelResult, OffloadError, OffloadResult};
pub use config::DispatchConfig;
