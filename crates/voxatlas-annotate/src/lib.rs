//! Brush strokes for voxatlas.
//!
//! An [`Annotator`] turns pointer positions on a slice into voxel edits:
//! a filled circle where the stroke starts, Bresenham segments stamped with
//! the circle border while dragging, and optional region growing from the
//! painted seeds when the stroke ends. Edits go through a
//! [`voxatlas_render::SurfaceSync`], so every render surface sees them.

// Documentation lints - internal functions don't need exhaustive panic/error docs
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)]
// Plane indices are bounded by u32 slice extents
#![allow(clippy::cast_possible_truncation)]

pub mod annotator;
pub mod stroke;

pub use annotator::Annotator;
pub use stroke::{Stroke, StrokeState, UndoRecord};
