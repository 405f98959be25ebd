//! Flat voxel buffers as produced by an image decoder, and point edits.

use glam::{IVec3, Mat3, UVec3, Vec3};

use crate::error::{AtlasError, Result};
use crate::sample::{splat, Sample, Texel};

/// A 3D scan stored as a flat `x`-fastest array.
///
/// The sample for voxel `(x, y, z)`, component `c` lives at
/// `((z * ny + y) * nx + x) * components + c`.
#[derive(Debug, Clone, PartialEq)]
pub struct VoxelBuffer<T: Sample> {
    voxel_count: UVec3,
    components: u32,
    /// Direction cosines: column `i` is the world direction of voxel axis `i`.
    orientation: Mat3,
    spacing: Vec3,
    origin: Vec3,
    data: Vec<T>,
}

impl<T: Sample> VoxelBuffer<T> {
    /// Creates a buffer with identity orientation, unit spacing and zero origin.
    ///
    /// # Errors
    /// Fails if a dimension is zero, `components` is outside `1..=4`, or
    /// `data` has the wrong length.
    pub fn new(voxel_count: UVec3, components: u32, data: Vec<T>) -> Result<Self> {
        if voxel_count.min_element() == 0 {
            return Err(AtlasError::InvalidVoxelCount(voxel_count.to_array()));
        }
        if !(1..=4).contains(&components) {
            return Err(AtlasError::InvalidComponents(components));
        }
        let expected = sample_count(voxel_count, components);
        if data.len() != expected {
            return Err(AtlasError::SizeMismatch {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            voxel_count,
            components,
            orientation: Mat3::IDENTITY,
            spacing: Vec3::ONE,
            origin: Vec3::ZERO,
            data,
        })
    }

    /// Creates a zero-filled buffer.
    ///
    /// # Errors
    /// Same conditions as [`VoxelBuffer::new`], minus the length check.
    pub fn zeroed(voxel_count: UVec3, components: u32) -> Result<Self> {
        let len = if voxel_count.min_element() == 0 {
            0
        } else {
            sample_count(voxel_count, components)
        };
        Self::new(voxel_count, components, vec![T::default(); len])
    }

    /// Sets the orientation matrix.
    #[must_use]
    pub fn with_orientation(mut self, orientation: Mat3) -> Self {
        self.orientation = orientation;
        self
    }

    /// Sets voxel spacing in world units.
    #[must_use]
    pub fn with_spacing(mut self, spacing: Vec3) -> Self {
        self.spacing = spacing;
        self
    }

    /// Sets the world position of voxel `(0, 0, 0)`.
    #[must_use]
    pub fn with_origin(mut self, origin: Vec3) -> Self {
        self.origin = origin;
        self
    }

    #[must_use]
    pub fn voxel_count(&self) -> UVec3 {
        self.voxel_count
    }

    #[must_use]
    pub fn components(&self) -> u32 {
        self.components
    }

    #[must_use]
    pub fn orientation(&self) -> Mat3 {
        self.orientation
    }

    #[must_use]
    pub fn spacing(&self) -> Vec3 {
        self.spacing
    }

    #[must_use]
    pub fn origin(&self) -> Vec3 {
        self.origin
    }

    #[must_use]
    pub fn data(&self) -> &[T] {
        &self.data
    }

    #[must_use]
    pub fn into_data(self) -> Vec<T> {
        self.data
    }

    /// Returns the flat index of the first component of a voxel.
    #[must_use]
    pub fn flatten_index(&self, x: u32, y: u32, z: u32) -> usize {
        let n = self.voxel_count;
        ((z as usize * n.y as usize + y as usize) * n.x as usize + x as usize)
            * self.components as usize
    }

    /// Returns the components of one voxel.
    #[must_use]
    pub fn voxel(&self, x: u32, y: u32, z: u32) -> &[T] {
        let start = self.flatten_index(x, y, z);
        &self.data[start..start + self.components as usize]
    }

    /// Replaces the sample data, keeping the metadata.
    ///
    /// # Errors
    /// Fails with [`AtlasError::SizeMismatch`] if the length differs.
    pub fn replace_data(&mut self, data: Vec<T>) -> Result<()> {
        if data.len() != self.data.len() {
            return Err(AtlasError::SizeMismatch {
                expected: self.data.len(),
                actual: data.len(),
            });
        }
        self.data = data;
        Ok(())
    }
}

/// Total number of samples for a volume.
#[must_use]
pub fn sample_count(voxel_count: UVec3, components: u32) -> usize {
    voxel_count.x as usize
        * voxel_count.y as usize
        * voxel_count.z as usize
        * components as usize
}

/// A single queued point write in atlas (canonical) voxel coordinates.
///
/// Coordinates are signed so brush geometry can run past the volume edge;
/// out-of-volume edits are dropped when they are applied.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VoxelEdit<T: Sample> {
    pub position: IVec3,
    pub value: Texel<T>,
}

impl<T: Sample> VoxelEdit<T> {
    #[must_use]
    pub fn new(position: IVec3, value: Texel<T>) -> Self {
        Self { position, value }
    }

    /// An edit writing `value` into every component.
    #[must_use]
    pub fn scalar(x: i32, y: i32, z: i32, value: T) -> Self {
        Self {
            position: IVec3::new(x, y, z),
            value: splat(value),
        }
    }
}
