//! Core data model for voxatlas.
//!
//! This crate holds everything that does not touch a render backend:
//! - [`AtlasLayout`] and the [`pack`]/[`unpack`] codec between flat voxel
//!   buffers and tiled 2D atlases
//! - [`SliceCodec`] for reading and writing slices along any [`ViewAxis`]
//! - brush geometry ([`Rasterizer`]) and smart-brush segmentation ([`RegionGrower`])
//! - the [`Merge`] seam and configuration [`Options`]

// Documentation lints - internal functions don't need exhaustive panic/error docs
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
// Getters and constructors return plain values
#![allow(clippy::must_use_candidate)]
// Atlas sizes are bounded by texture limits, far below u32::MAX
#![allow(clippy::cast_possible_truncation)]

pub mod axis;
pub mod codec;
pub mod error;
pub mod layout;
pub mod merge;
pub mod options;
pub mod raster;
pub mod region_grow;
pub mod sample;
pub mod slice;
pub mod voxel;

pub use axis::ViewAxis;
pub use codec::{pack, unpack, AxisMirror, PackedAtlas};
pub use error::{AtlasError, Result};
pub use layout::{AtlasLayout, AtlasRegion};
pub use merge::{Merge, MergeMode};
pub use options::{BrushOptions, Options, SmartBrushOptions};
pub use raster::{line, Rasterizer};
pub use region_grow::{plane_mask, PlaneMask, RegionGrower};
pub use sample::{splat, PixelFormat, Sample, Texel, MAX_COMPONENTS};
pub use slice::SliceCodec;
pub use voxel::{sample_count, VoxelBuffer, VoxelEdit};

// Re-export glam types for convenience
pub use glam::{IVec2, IVec3, Mat3, UVec2, UVec3, Vec3};
