//! Read-only image sampling with clamp-to-edge addressing.

pub mod sampler;
pub mod image;

pub use sampler::{AddressingMode, CoordinateNormalization, FilteringMode, ImageSampler};
pub use image::{Float4, SampledImage, Voxel};
