//! Buffers and the accessors kernels use to reach them.

pub mod buffer;
pub mod accessor;

pub use buffer::Buffer;
pub use accessor::{AccessMode, Accessor};
