//! Sampler configuration: coordinate normalization, addressing and filtering.

use serde::{Deserialize, Serialize};

/// How sample coordinates are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CoordinateNormalization {
    /// Coordinates are given directly in voxel units.
    #[default]
    Unnormalized,
}

impl CoordinateNormalization {
    /// Map a sample coordinate along an axis of `extent` voxels to voxel units.
    #[inline]
    pub fn to_voxel(self, coord: f32, _extent: usize) -> f32 {
        match self {
            CoordinateNormalization::Unnormalized => coord,
        }
    }
}

/// How voxel indices outside the image are mapped back inside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AddressingMode {
    /// Clamp each index to `[0, extent - 1]`.
    #[default]
    ClampToEdge,
}

impl AddressingMode {
    /// Resolve an integer voxel index along an axis of `extent` voxels.
    ///
    /// Defined for every input; `extent` must be non-zero.
    #[inline]
    pub fn resolve(self, index: i64, extent: usize) -> usize {
        match self {
            AddressingMode::ClampToEdge => index.clamp(0, extent as i64 - 1) as usize,
        }
    }

    /// Pull a continuous voxel coordinate into `[-1, extent]`.
    ///
    /// Every corner a linear read gathers from the result stays
    /// representable, and clamps to the same edge voxel the raw coordinate
    /// would. NaN maps to 0.
    #[inline]
    pub fn clamp_coord(self, coord: f32, extent: usize) -> f32 {
        match self {
            AddressingMode::ClampToEdge => {
                if coord.is_nan() {
                    0.0
                } else {
                    coord.clamp(-1.0, extent as f32)
                }
            }
        }
    }
}

/// How neighbouring voxels are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum FilteringMode {
    /// Take the voxel nearest to the coordinate.
    #[default]
    Nearest,
    /// Multilinear blend of the surrounding voxels.
    Linear,
}

/// Immutable sampling configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ImageSampler {
    /// Coordinate interpretation.
    pub normalization: CoordinateNormalization,
    /// Out-of-range policy.
    pub addressing: AddressingMode,
    /// Interpolation policy.
    pub filtering: FilteringMode,
}

impl ImageSampler {
    /// Create a sampler from its three modes.
    pub fn new(
        normalization: CoordinateNormalization,
        addressing: AddressingMode,
        filtering: FilteringMode,
    ) -> Self {
        Self {
            normalization,
            addressing,
            filtering,
        }
    }

    /// Unnormalized, clamp-to-edge, nearest.
    pub fn nearest() -> Self {
        Self::new(
            CoordinateNormalization::Unnormalized,
            AddressingMode::ClampToEdge,
            FilteringMode::Nearest,
        )
    }

    /// Unnormalized, clamp-to-edge, linear.
    pub fn linear() -> Self {
        Self::new(
            CoordinateNormalization::Unnormalized,
            AddressingMode::ClampToEdge,
            FilteringMode::Linear,
        )
    }
}
