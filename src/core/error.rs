//! Error types for the offload runtime.
//!
//! Uses thiserror for structured errors. The taxonomy is deliberately small:
//! - [`KernelError`]: a kernel body failed or panicked for one work-item
//! - [`ConfigurationError`]: malformed ranges, sizes, options or command groups
//!
//! Addressing is never an error. Sampled-image reads clamp every coordinate.

use std::error::Error as StdError;
use thiserror::Error;

/// Boxed error returned by fallible kernels.
pub type BoxedKernelError = Box<dyn StdError + Send + Sync + 'static>;

/// Top-level error type for the runtime.
#[derive(Error, Debug)]
pub enum OffloadError {
    #[error("Kernel error: {0}")]
    Kernel(#[from] KernelError),

    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Dispatch incomplete: ran {executed} of {expected} work-items")]
    Incomplete { expected: usize, executed: usize },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// A failure raised by a user kernel for one work-item.
#[derive(Error, Debug)]
pub enum KernelError {
    #[error("kernel failed at work-item {linear_id}: {source}")]
    Failed {
        linear_id: usize,
        #[source]
        source: BoxedKernelError,
    },

    #[error("kernel panicked at work-item {linear_id}: {message}")]
    Panicked { linear_id: usize, message: String },
}

impl KernelError {
    /// Flat index of the work-item that raised this error.
    pub fn linear_id(&self) -> usize {
        match self {
            KernelError::Failed { linear_id, .. } | KernelError::Panicked { linear_id, .. } => {
                *linear_id
            }
        }
    }

    /// Whether the kernel panicked rather than returning an error.
    pub fn is_panic(&self) -> bool {
        matches!(self, KernelError::Panicked { .. })
    }
}

/// Errors detected synchronously when something is constructed or submitted.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("dimension {dim} of {what} has zero extent")]
    ZeroExtent { what: &'static str, dim: usize },

    #[error("size mismatch: range needs {expected} elements, host data has {got}")]
    SizeMismatch { expected: usize, got: usize },

    #[error("element count of {what} does not fit in usize")]
    ExtentOverflow { what: &'static str },

    #[error("sampled image needs at least one channel")]
    ZeroChannels,

    #[error("sampled image supports at most 4 channels, got {0}")]
    TooManyChannels(usize),

    #[error("{axis} extent must be 1 for a {dims}-D sampled image, got {extent}")]
    UnusedAxisExtent {
        axis: &'static str,
        dims: usize,
        extent: usize,
    },

    #[error("sampled images have 1 to 3 spatial dimensions, got {0}")]
    UnsupportedDimensionality(usize),

    #[error("a command group may issue only one parallel_for")]
    DuplicateParallelFor,

    #[error("invalid option '{option}': {reason}")]
    InvalidOption { option: &'static str, reason: String },
}

/// Result type alias for runtime operations.
pub type OffloadResult<T> = Result<T, OffloadError>;

/// Result type alias for a single kernel invocation.
pub type KernelResult<T> = Result<T, KernelError>;

/// Conversion from a kernel's return value into a per-work-item outcome.
///
/// Kernels may return `()` or `Result<(), E>`; the dispatcher treats both
/// uniformly.
pub trait KernelOutput {
    /// Turn the kernel's return value into an outcome.
    fn into_outcome(self) -> Result<(), BoxedKernelError>;
}

impl KernelOutput for () {
    #[inline]
    fn into_outcome(self) -> Result<(), BoxedKernelError> {
        Ok(())
    }
}

impl<E> KernelOutput for Result<(), E>
where
    E: Into<BoxedKernelError>,
{
    #[inline]
    fn into_outcome(self) -> Result<(), BoxedKernelError> {
        self.map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kernel_error_linear_id() {
        let err = KernelError::Panicked {
            linear_id: 17,
            message: "boom".to_string(),
        };
        assert_eq!(err.linear_id(), 17);
        assert!(err.is_panic());
        assert!(err.to_string().contains("17"));
    }

    #[test]
    fn test_kernel_output_conversions() {
        assert!(().into_outcome().is_ok());
        let ok: Result<(), String> = Ok(());
        assert!(ok.into_outcome().is_ok());
        let failed: Result<(), &str> = Err("negative voxel");
        let err = failed.into_outcome().unwrap_err();
        assert_eq!(err.to_string(), "negative voxel");
    }

    #[test]
    fn test_error_conversion() {
        let err: OffloadError = ConfigurationError::ZeroChannels.into();
        assert!(matches!(err, OffloadError::Configuration(ConfigurationError::ZeroChannels)));
        assert!(err.to_string().starts_with("Configuration error"));
    }
}
