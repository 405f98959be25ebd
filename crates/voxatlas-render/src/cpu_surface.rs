//! Software render surface backed by a plain texel buffer.

use glam::UVec2;
use voxatlas_core::{AtlasLayout, AtlasRegion, PackedAtlas, Sample, VoxelEdit};

use crate::error::{RenderError, RenderResult};
use crate::surface::RenderSurface;

/// A surface kept in system memory. Used for headless tools and tests.
#[derive(Debug, Clone)]
pub struct CpuSurface<T: Sample> {
    size: UVec2,
    components: u32,
    pixels: Vec<T>,
}

impl<T: Sample> CpuSurface<T> {
    /// Creates a zero-filled surface sized for `layout`.
    pub fn new(layout: &AtlasLayout, components: u32) -> Self {
        Self {
            size: layout.atlas_size(),
            components,
            pixels: vec![T::default(); layout.pixel_count() * components as usize],
        }
    }

    /// Returns the current texel data.
    pub fn pixels(&self) -> &[T] {
        &self.pixels
    }

    fn offset(&self, pixel: UVec2) -> usize {
        (pixel.y as usize * self.size.x as usize + pixel.x as usize) * self.components as usize
    }
}

impl<T: Sample> RenderSurface<T> for CpuSurface<T> {
    fn size(&self) -> UVec2 {
        self.size
    }

    fn components(&self) -> u32 {
        self.components
    }

    fn blit(&mut self, atlas: &PackedAtlas<T>) -> RenderResult<()> {
        if atlas.data().len() != self.pixels.len() {
            return Err(RenderError::SizeMismatch {
                expected: self.pixels.len(),
                actual: atlas.data().len(),
            });
        }
        self.pixels.copy_from_slice(atlas.data());
        Ok(())
    }

    fn draw_points(&mut self, layout: &AtlasLayout, edits: &[VoxelEdit<T>]) -> RenderResult<()> {
        let c = self.components as usize;
        for edit in edits {
            let start = self.offset(layout.pixel_of(edit.position.as_uvec3()));
            self.pixels[start..start + c].copy_from_slice(&edit.value[..c]);
        }
        Ok(())
    }

    fn write_region(&mut self, region: AtlasRegion, texels: &[T]) -> RenderResult<()> {
        let c = self.components as usize;
        let expected = region.pixel_count() * c;
        if texels.len() != expected {
            return Err(RenderError::SizeMismatch {
                expected,
                actual: texels.len(),
            });
        }
        let row_len = region.width as usize * c;
        for (row, chunk) in (0..region.height).zip(texels.chunks_exact(row_len.max(1))) {
            let start = self.offset(UVec2::new(region.x, region.y + row));
            self.pixels[start..start + row_len].copy_from_slice(chunk);
        }
        Ok(())
    }

    fn read_pixels(&self) -> RenderResult<Vec<T>> {
        Ok(self.pixels.clone())
    }
}
