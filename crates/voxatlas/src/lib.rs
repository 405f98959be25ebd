//! voxatlas: a volumetric image atlas and voxel-editing engine.
//!
//! A 3D scan is packed once into a tiled 2D atlas. A [`SurfaceSync`] keeps
//! the CPU copy of that atlas coherent with any number of render surfaces,
//! and an [`Annotator`] turns brush strokes into voxel edits on it.
//!
//! # Quick Start
//!
//! ```no_run
//! use voxatlas::*;
//!
//! fn main() -> Result<()> {
//!     init_logging();
//!
//!     let scan = VoxelBuffer::<u8>::zeroed(UVec3::new(64, 64, 32), 1)?;
//!     let mut doc = VolumeDocument::load(&scan, Options::default())?;
//!     let view = doc.add_cpu_view()?;
//!
//!     doc.begin_stroke(ViewAxis::Axial, IVec3::new(10, 10, 4))?;
//!     doc.continue_stroke(IVec3::new(30, 12, 4));
//!     doc.finish_stroke(IVec3::new(30, 30, 4))?;
//!     doc.render(view)?;
//!
//!     let labels = doc.export()?;
//!     assert_eq!(labels.voxel_count(), scan.voxel_count());
//!     Ok(())
//! }
//! ```
//!
//! # Crates
//!
//! - `voxatlas-core`: layout, packing, slices, brush geometry, region growing
//! - `voxatlas-render`: render surfaces and the edit queue that feeds them
//! - `voxatlas-annotate`: the stroke state machine

// Documentation lints - internal functions don't need exhaustive panic/error docs
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)]
// Voxel counts are u32 by construction
#![allow(clippy::cast_possible_truncation)]

mod document;

use std::sync::Arc;

use pollster::FutureExt;

pub use document::VolumeDocument;

// Re-export core types
pub use voxatlas_core::{
    pack, unpack, AtlasError, AtlasLayout, AtlasRegion, AxisMirror, BrushOptions, Merge,
    MergeMode, Options, PackedAtlas, PixelFormat, Rasterizer, RegionGrower, Result, Sample,
    SliceCodec, SmartBrushOptions, Texel, ViewAxis, VoxelBuffer, VoxelEdit, IVec2, IVec3, Mat3,
    UVec2, UVec3, Vec3,
};

// Re-export render types
pub use voxatlas_render::{
    ConsumerStats, CpuSurface, GpuContext, GpuSample, GpuSurface, RenderError, RenderOutcome,
    RenderSurface, SurfaceSync, PULL_CONSUMER,
};

// Re-export annotation types
pub use voxatlas_annotate::{Annotator, UndoRecord};

/// Initializes `env_logger` from `RUST_LOG`. Safe to call more than once.
pub fn init_logging() {
    let _ = env_logger::try_init();
}

/// Creates a windowless GPU context, blocking until the device is ready.
pub fn headless_context() -> Result<Arc<GpuContext>> {
    let context = GpuContext::new_headless().block_on()?;
    Ok(Arc::new(context))
}
