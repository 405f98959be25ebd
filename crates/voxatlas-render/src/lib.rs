//! Render surfaces for voxatlas.
//!
//! This crate provides:
//! - the [`RenderSurface`] contract a texture backend implements
//! - [`CpuSurface`], a software surface, and [`GpuSurface`], a wgpu texture
//! - [`SurfaceSync`], which keeps the CPU atlas and every registered
//!   surface coherent through one shared edit queue

// Documentation lints - internal functions don't need exhaustive panic/error docs
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)]
// Texture dimensions are u32 by API; byte offsets fit in usize
#![allow(clippy::cast_possible_truncation)]

pub mod consumer;
pub mod cpu_surface;
pub mod error;
pub mod gpu_surface;
pub mod surface;
pub mod sync;

pub use consumer::{ConsumerStats, RenderConsumer};
pub use cpu_surface::CpuSurface;
pub use error::{RenderError, RenderResult};
pub use gpu_surface::{GpuContext, GpuSample, GpuSurface};
pub use surface::RenderSurface;
pub use sync::{EditMark, PendingWrite, RenderOutcome, SurfaceSync, PULL_CONSUMER};
