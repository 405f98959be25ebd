//! Reading and writing single 2D slices of a packed atlas.
//!
//! Slices along the native (axial) axis are whole tiles and move as one
//! region. Slices along the other two axes cut across every tile: a read
//! gathers one voxel per output pixel, and a write scatters one strip per
//! tile (a one-pixel-wide column for sagittal slices, a one-row-high row
//! for coronal slices).

use glam::UVec3;

use crate::axis::ViewAxis;
use crate::codec::PackedAtlas;
use crate::error::{AtlasError, Result};
use crate::layout::{AtlasLayout, AtlasRegion};
use crate::sample::Sample;

#[derive(Debug, Clone)]
struct CachedSlice<T> {
    axis: ViewAxis,
    index: u32,
    data: Vec<T>,
}

/// Slice extraction and insertion with a single-slot read cache.
///
/// The cache only holds orthogonal-axis reads, which are the expensive
/// gathers; it must be invalidated on every atlas write.
#[derive(Debug, Clone)]
pub struct SliceCodec<T: Sample> {
    layout: AtlasLayout,
    cache_enabled: bool,
    cache: Option<CachedSlice<T>>,
}

impl<T: Sample> SliceCodec<T> {
    #[must_use]
    pub fn new(layout: AtlasLayout) -> Self {
        Self {
            layout,
            cache_enabled: true,
            cache: None,
        }
    }

    /// Enables or disables the orthogonal read cache.
    pub fn set_cache_enabled(&mut self, enabled: bool) {
        self.cache_enabled = enabled;
        if !enabled {
            self.cache = None;
        }
    }

    #[must_use]
    pub fn layout(&self) -> &AtlasLayout {
        &self.layout
    }

    /// Returns `(width, height)` of a slice along `axis`.
    #[must_use]
    pub fn extent(&self, axis: ViewAxis) -> (u32, u32) {
        self.layout.slice_extent(axis)
    }

    /// Returns the number of samples in one slice along `axis`.
    #[must_use]
    pub fn slice_len(&self, axis: ViewAxis, components: u32) -> usize {
        let (w, h) = self.extent(axis);
        w as usize * h as usize * components as usize
    }

    /// Returns whether the last read of `(axis, index)` is cached.
    #[must_use]
    pub fn is_cached(&self, axis: ViewAxis, index: u32) -> bool {
        self.cache
            .as_ref()
            .is_some_and(|c| c.axis == axis && c.index == index)
    }

    /// Drops the cached slice.
    pub fn invalidate(&mut self) {
        self.cache = None;
    }

    /// Drops the cached slice if it is `(axis, index)`.
    pub fn invalidate_slice(&mut self, axis: ViewAxis, index: u32) {
        if self.is_cached(axis, index) {
            self.cache = None;
        }
    }

    fn check_index(&self, axis: ViewAxis, index: u32) -> Result<()> {
        let depth = self.layout.axis_depth(axis);
        if index >= depth {
            return Err(AtlasError::OutOfRange { axis, index, depth });
        }
        Ok(())
    }

    /// Reads slice `index` along `axis` as a row-major `width * height *
    /// components` buffer.
    ///
    /// # Errors
    /// Returns [`AtlasError::OutOfRange`] for an invalid index.
    pub fn read(&mut self, atlas: &PackedAtlas<T>, axis: ViewAxis, index: u32) -> Result<Vec<T>> {
        self.check_index(axis, index)?;
        if axis.is_native() {
            return Ok(atlas.read_region(self.layout.tile_region(index)));
        }
        if let Some(cached) = self.cache.as_ref().filter(|c| c.axis == axis && c.index == index) {
            return Ok(cached.data.clone());
        }

        let data = self.gather(atlas, axis, index);
        if self.cache_enabled {
            self.cache = Some(CachedSlice {
                axis,
                index,
                data: data.clone(),
            });
        }
        Ok(data)
    }

    fn gather(&self, atlas: &PackedAtlas<T>, axis: ViewAxis, index: u32) -> Vec<T> {
        let (width, height) = self.extent(axis);
        let c = atlas.components() as usize;
        let src = atlas.data();
        let mut out = Vec::with_capacity(width as usize * height as usize * c);
        for v in 0..height {
            for u in 0..width {
                let voxel = match axis {
                    ViewAxis::Sagittal => UVec3::new(index, u, v),
                    ViewAxis::Coronal => UVec3::new(u, index, v),
                    ViewAxis::Axial => UVec3::new(u, v, index),
                };
                let start = self.layout.pixel_index(voxel) * c;
                out.extend_from_slice(&src[start..start + c]);
            }
        }
        out
    }

    /// Returns the atlas regions a write to `(axis, index)` touches, in the
    /// order slice rows are consumed.
    ///
    /// For the native axis this is one tile; otherwise it is one strip per
    /// used tile.
    #[must_use]
    pub fn write_regions(&self, axis: ViewAxis, index: u32) -> Vec<AtlasRegion> {
        let count = self.layout.voxel_count();
        match axis {
            ViewAxis::Axial => vec![self.layout.tile_region(index)],
            ViewAxis::Sagittal => (0..count.z)
                .map(|z| {
                    let origin = self.layout.tile_origin(z);
                    AtlasRegion::new(origin.x + index, origin.y, 1, count.y)
                })
                .collect(),
            ViewAxis::Coronal => (0..count.z)
                .map(|z| {
                    let origin = self.layout.tile_origin(z);
                    AtlasRegion::new(origin.x, origin.y + index, count.x, 1)
                })
                .collect(),
        }
    }

    /// Writes slice `index` along `axis`. `None` clears the slice to zero.
    ///
    /// Each region from [`SliceCodec::write_regions`] receives the next
    /// `region.pixel_count()` texels of `data`: for orthogonal axes, slice
    /// row `v` is the strip in tile `v`.
    ///
    /// # Errors
    /// Returns [`AtlasError::OutOfRange`] for an invalid index and
    /// [`AtlasError::SizeMismatch`] if `data` is not exactly one slice.
    pub fn write(
        &mut self,
        atlas: &mut PackedAtlas<T>,
        axis: ViewAxis,
        index: u32,
        data: Option<&[T]>,
    ) -> Result<()> {
        self.check_index(axis, index)?;
        let c = atlas.components();
        let expected = self.slice_len(axis, c);
        if let Some(data) = data {
            if data.len() != expected {
                return Err(AtlasError::SizeMismatch {
                    expected,
                    actual: data.len(),
                });
            }
        }

        self.invalidate();
        let regions = self.write_regions(axis, index);
        match data {
            Some(data) => {
                let mut offset = 0;
                for region in regions {
                    let len = region.pixel_count() * c as usize;
                    atlas.write_region(region, &data[offset..offset + len])?;
                    offset += len;
                }
            }
            None => {
                for region in regions {
                    atlas.clear_region(region);
                }
            }
        }
        Ok(())
    }
}
