//! Read-only sampled view over a flat voxel array.
//!
//! The wrapped array is ordered `[depth][height][width][channels]`, channel
//! innermost. Reads take coordinates in voxel units, clamp them to the
//! image, and either pick the nearest voxel or blend the `2^N` voxels around
//! the coordinate, where `N` is the number of spatial axes sampled.
//!
//! Integer coordinate `k` addresses voxel `k` exactly: there is no
//! half-voxel offset.

use crate::core::error::ConfigurationError;
use crate::sampling::sampler::{FilteringMode, ImageSampler};
use std::ops::Index;

/// Maximum number of channels a sampled image can carry.
pub const MAX_CHANNELS: usize = 4;

/// Stored sample types that can be read through a [`SampledImage`].
pub trait Voxel: Copy + Send + Sync {
    /// Convert to the sampling type.
    fn to_f32(self) -> f32;
}

macro_rules! impl_voxel {
    ($($t:ty),*) => {
        $(
            impl Voxel for $t {
                #[inline]
                fn to_f32(self) -> f32 {
                    self as f32
                }
            }
        )*
    };
}

impl_voxel!(u8, u16, i16, u32, i32, f32, f64);

/// Four-slot sample result; channel `c` lives in slot `c`, unused slots are 0.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Float4 {
    /// Channel 0.
    pub x: f32,
    /// Channel 1.
    pub y: f32,
    /// Channel 2.
    pub z: f32,
    /// Channel 3.
    pub w: f32,
}

impl Float4 {
    /// Create from four slots.
    pub fn new(x: f32, y: f32, z: f32, w: f32) -> Self {
        Self { x, y, z, w }
    }

    /// The slots as an array.
    pub fn to_array(self) -> [f32; 4] {
        [self.x, self.y, self.z, self.w]
    }

    fn from_array(v: [f32; 4]) -> Self {
        Self::new(v[0], v[1], v[2], v[3])
    }
}

impl Index<usize> for Float4 {
    type Output = f32;

    fn index(&self, channel: usize) -> &f32 {
        match channel {
            0 => &self.x,
            1 => &self.y,
            2 => &self.z,
            3 => &self.w,
            _ => panic!("Float4 has 4 slots, got index {}", channel),
        }
    }
}

/// A sampled view over externally owned voxels with `N` spatial axes.
///
/// `N = 1` samples along width only, `N = 2` over width and height, and
/// `N = 3` over all three. Axes beyond `N` must have extent 1.
#[derive(Debug, Clone, Copy)]
pub struct SampledImage<'a, T, const N: usize> {
    data: &'a [T],
    extents: [usize; 3],
    channels: usize,
    sampler: ImageSampler,
}

impl<'a, T: Voxel, const N: usize> SampledImage<'a, T, N> {
    /// Wrap `data` as a `width × height × depth` image with `channels`
    /// interleaved channels.
    pub fn new(
        data: &'a [T],
        width: usize,
        height: usize,
        depth: usize,
        channels: usize,
        sampler: ImageSampler,
    ) -> Result<Self, ConfigurationError> {
        if N == 0 || N > 3 {
            return Err(ConfigurationError::UnsupportedDimensionality(N));
        }
        if channels == 0 {
            return Err(ConfigurationError::ZeroChannels);
        }
        if channels > MAX_CHANNELS {
            return Err(ConfigurationError::TooManyChannels(channels));
        }

        let extents = [width, height, depth];
        for (dim, &extent) in extents.iter().enumerate() {
            if extent == 0 {
                return Err(ConfigurationError::ZeroExtent {
                    what: "sampled image",
                    dim,
                });
            }
        }
        for (axis, name) in [(1, "height"), (2, "depth")] {
            if axis >= N && extents[axis] != 1 {
                return Err(ConfigurationError::UnusedAxisExtent {
                    axis: name,
                    dims: N,
                    extent: extents[axis],
                });
            }
        }

        let expected = width
            .checked_mul(height)
            .and_then(|n| n.checked_mul(depth))
            .and_then(|n| n.checked_mul(channels))
            .ok_or(ConfigurationError::ExtentOverflow {
                what: "sampled image",
            })?;
        if data.len() != expected {
            return Err(ConfigurationError::SizeMismatch {
                expected,
                got: data.len(),
            });
        }

        Ok(Self {
            data,
            extents,
            channels,
            sampler,
        })
    }

    /// `[width, height, depth]`.
    pub fn dims(&self) -> [usize; 3] {
        self.extents
    }

    /// Extent along x.
    pub fn width(&self) -> usize {
        self.extents[0]
    }

    /// Extent along y.
    pub fn height(&self) -> usize {
        self.extents[1]
    }

    /// Extent along z.
    pub fn depth(&self) -> usize {
        self.extents[2]
    }

    /// Channels per voxel.
    pub fn channels(&self) -> usize {
        self.channels
    }

    /// The sampler this image reads with.
    pub fn sampler(&self) -> &ImageSampler {
        &self.sampler
    }

    /// Fetch a voxel by integer index, clamping each index first.
    pub fn fetch(&self, x: i64, y: i64, z: i64) -> Float4 {
        let mut out = [0.0f32; 4];
        let base = self.voxel_offset([x, y, z]);
        for (c, slot) in out.iter_mut().enumerate().take(self.channels) {
            *slot = self.data[base + c].to_f32();
        }
        Float4::from_array(out)
    }

    /// Sample at `(x, y, z)` in voxel units. Coordinates on axes beyond `N`
    /// are ignored.
    pub fn read(&self, x: f32, y: f32, z: f32) -> Float4 {
        let mut coords = [0.0f32; 3];
        for (axis, (slot, raw)) in coords.iter_mut().zip([x, y, z]).enumerate().take(N) {
            *slot = self.sampler.normalization.to_voxel(raw, self.extents[axis]);
        }

        match self.sampler.filtering {
            FilteringMode::Nearest => self.read_nearest(coords),
            FilteringMode::Linear => self.read_linear(coords),
        }
    }

    fn read_nearest(&self, coords: [f32; 3]) -> Float4 {
        let [x, y, z] = coords.map(|c| c.round() as i64);
        self.fetch(x, y, z)
    }

    fn read_linear(&self, coords: [f32; 3]) -> Float4 {
        let addressing = self.sampler.addressing;
        let mut base = [0i64; 3];
        let mut frac = [0.0f32; 3];
        for axis in 0..N {
            let coord = addressing.clamp_coord(coords[axis], self.extents[axis]);
            let floor = coord.floor();
            base[axis] = floor as i64;
            frac[axis] = coord - floor;
        }

        let mut acc = [0.0f32; 4];
        for corner in 0..(1usize << N) {
            let mut index = base;
            let mut weight = 1.0f32;
            for axis in 0..N {
                if corner & (1 << axis) != 0 {
                    index[axis] = index[axis].saturating_add(1);
                    weight *= frac[axis];
                } else {
                    weight *= 1.0 - frac[axis];
                }
            }

            let offset = self.voxel_offset(index);
            for (c, slot) in acc.iter_mut().enumerate().take(self.channels) {
                *slot += weight * self.data[offset + c].to_f32();
            }
        }

        Float4::from_array(acc)
    }

    /// Offset of channel 0 of the voxel at `index`, after addressing.
    #[inline]
    fn voxel_offset(&self, index: [i64; 3]) -> usize {
        let addressing = self.sampler.addressing;
        let x = addressing.resolve(index[0], self.extents[0]);
        let y = addressing.resolve(index[1], self.extents[1]);
        let z = addressing.resolve(index[2], self.extents[2]);
        ((z * self.extents[1] + y) * self.extents[0] + x) * self.channels
    }
}
