//! Viewing axes and in-plane coordinate mapping.

use std::fmt;

use glam::{IVec2, IVec3, UVec3};
use serde::{Deserialize, Serialize};

/// One of the three orthogonal viewing directions.
///
/// The axis names the direction a slice is taken *along*: an axial slice
/// holds every voxel with a fixed `z`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ViewAxis {
    /// Slices of constant `x`. In-plane coordinates are `(y, z)`.
    Sagittal,
    /// Slices of constant `y`. In-plane coordinates are `(x, z)`.
    Coronal,
    /// Slices of constant `z`. In-plane coordinates are `(x, y)`.
    ///
    /// This is the native tiling axis of the atlas: every axial slice is
    /// stored as exactly one tile.
    #[default]
    Axial,
}

impl ViewAxis {
    /// The axis along which depth slices are laid out as whole tiles.
    pub const NATIVE: ViewAxis = ViewAxis::Axial;

    /// All axes in `x, y, z` order.
    pub const ALL: [ViewAxis; 3] = [ViewAxis::Sagittal, ViewAxis::Coronal, ViewAxis::Axial];

    /// Returns the index of the volume axis this view is orthogonal to.
    #[must_use]
    pub fn index(self) -> usize {
        match self {
            Self::Sagittal => 0,
            Self::Coronal => 1,
            Self::Axial => 2,
        }
    }

    /// Returns the volume axes spanning the slice plane as `(u, v)`.
    #[must_use]
    pub fn plane_axes(self) -> (usize, usize) {
        match self {
            Self::Sagittal => (1, 2),
            Self::Coronal => (0, 2),
            Self::Axial => (0, 1),
        }
    }

    /// Returns whether slices along this axis are single atlas tiles.
    #[must_use]
    pub fn is_native(self) -> bool {
        self == Self::NATIVE
    }

    /// Returns `(width, height)` of a slice along this axis.
    #[must_use]
    pub fn slice_extent(self, voxel_count: UVec3) -> (u32, u32) {
        let (u, v) = self.plane_axes();
        (voxel_count[u], voxel_count[v])
    }

    /// Returns the number of slices along this axis.
    #[must_use]
    pub fn depth(self, voxel_count: UVec3) -> u32 {
        voxel_count[self.index()]
    }

    /// Maps an in-plane point on slice `slice` to a voxel coordinate.
    #[must_use]
    pub fn to_voxel(self, point: IVec2, slice: i32) -> IVec3 {
        match self {
            Self::Sagittal => IVec3::new(slice, point.x, point.y),
            Self::Coronal => IVec3::new(point.x, slice, point.y),
            Self::Axial => IVec3::new(point.x, point.y, slice),
        }
    }

    /// Splits a voxel coordinate into its in-plane point and slice number.
    #[must_use]
    pub fn to_plane(self, voxel: IVec3) -> (IVec2, i32) {
        let (u, v) = self.plane_axes();
        (IVec2::new(voxel[u], voxel[v]), voxel[self.index()])
    }

    /// Returns a lowercase display name.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Sagittal => "sagittal",
            Self::Coronal => "coronal",
            Self::Axial => "axial",
        }
    }
}

impl fmt::Display for ViewAxis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
