//! The contract between the editing engine and a texture backend.

use glam::UVec2;
use voxatlas_core::{AtlasLayout, AtlasRegion, PackedAtlas, Sample, VoxelEdit};

use crate::error::RenderResult;

/// A 2D texture holding a copy of the packed atlas.
///
/// Surfaces receive three kinds of updates: a full blit of the CPU atlas, a
/// list of single-voxel point draws, and rectangular region writes (slice
/// strips). Point draws arrive in queue order; later draws to the same
/// voxel must win.
pub trait RenderSurface<T: Sample> {
    /// Texture size in pixels.
    fn size(&self) -> UVec2;

    /// Number of meaningful components per pixel.
    fn components(&self) -> u32;

    /// Replaces the entire texture with `atlas`.
    fn blit(&mut self, atlas: &PackedAtlas<T>) -> RenderResult<()>;

    /// Draws each edit as a single pixel. Every edit lies inside the volume.
    fn draw_points(&mut self, layout: &AtlasLayout, edits: &[VoxelEdit<T>]) -> RenderResult<()>;

    /// Overwrites a rectangle with row-major texels.
    fn write_region(&mut self, region: AtlasRegion, texels: &[T]) -> RenderResult<()>;

    /// Reads the whole texture back in atlas order. May block.
    fn read_pixels(&self) -> RenderResult<Vec<T>>;
}
