//! Tile grid layout packing a 3D volume into a 2D atlas.
//!
//! Depth slice `z` occupies the tile at grid cell `(z mod gx, z / gx)`. The
//! grid is chosen so the atlas stays roughly square:
//! `gx = ceil(sqrt(nz * ny / nx))`, `gy = ceil(nz / gx)`.

use glam::{IVec3, UVec2, UVec3};

use crate::axis::ViewAxis;
use crate::error::{AtlasError, Result};

/// Immutable tiling of a volume with a given voxel count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AtlasLayout {
    voxel_count: UVec3,
    tile_grid: UVec2,
    atlas_size: UVec2,
}

impl AtlasLayout {
    /// Computes the layout for a volume.
    ///
    /// # Errors
    /// Returns [`AtlasError::InvalidVoxelCount`] if any dimension is zero.
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    pub fn compute(voxel_count: UVec3) -> Result<Self> {
        if voxel_count.min_element() == 0 {
            return Err(AtlasError::InvalidVoxelCount(voxel_count.to_array()));
        }
        let (nx, ny, nz) = (
            f64::from(voxel_count.x),
            f64::from(voxel_count.y),
            f64::from(voxel_count.z),
        );
        let gx = ((nz * ny / nx).sqrt().ceil() as u32).max(1);
        let gy = voxel_count.z.div_ceil(gx);
        let (Some(width), Some(height)) =
            (voxel_count.x.checked_mul(gx), voxel_count.y.checked_mul(gy))
        else {
            return Err(AtlasError::InvalidVoxelCount(voxel_count.to_array()));
        };
        let layout = Self {
            voxel_count,
            tile_grid: UVec2::new(gx, gy),
            atlas_size: UVec2::new(width, height),
        };
        log::debug!(
            "atlas layout for {:?}: grid {}x{}, atlas {}x{}",
            voxel_count.to_array(),
            gx,
            gy,
            layout.atlas_size.x,
            layout.atlas_size.y
        );
        Ok(layout)
    }

    #[must_use]
    pub fn voxel_count(&self) -> UVec3 {
        self.voxel_count
    }

    /// Returns the tile grid `(gx, gy)`.
    #[must_use]
    pub fn tile_grid(&self) -> UVec2 {
        self.tile_grid
    }

    /// Returns the atlas size in pixels.
    #[must_use]
    pub fn atlas_size(&self) -> UVec2 {
        self.atlas_size
    }

    /// Returns the number of pixels in the atlas.
    #[must_use]
    pub fn pixel_count(&self) -> usize {
        self.atlas_size.x as usize * self.atlas_size.y as usize
    }

    /// Returns the number of tiles in the grid, used or not.
    #[must_use]
    pub fn tile_count(&self) -> u32 {
        self.tile_grid.x * self.tile_grid.y
    }

    /// Returns the number of grid cells that hold no depth slice.
    #[must_use]
    pub fn unused_tiles(&self) -> u32 {
        self.tile_count() - self.voxel_count.z
    }

    /// Returns the pixel position of the top-left corner of tile `z`.
    #[must_use]
    pub fn tile_origin(&self, z: u32) -> UVec2 {
        let gx = self.tile_grid.x;
        UVec2::new(
            (z % gx) * self.voxel_count.x,
            (z / gx) * self.voxel_count.y,
        )
    }

    /// Returns the atlas region covered by tile `z`.
    #[must_use]
    pub fn tile_region(&self, z: u32) -> AtlasRegion {
        let origin = self.tile_origin(z);
        AtlasRegion::new(origin.x, origin.y, self.voxel_count.x, self.voxel_count.y)
    }

    /// Returns whether a signed voxel coordinate lies inside the volume.
    #[must_use]
    pub fn contains(&self, voxel: IVec3) -> bool {
        voxel.cmpge(IVec3::ZERO).all() && voxel.as_uvec3().cmplt(self.voxel_count).all()
    }

    /// Maps a voxel to its atlas pixel. The voxel must be inside the volume.
    #[must_use]
    pub fn pixel_of(&self, voxel: UVec3) -> UVec2 {
        self.tile_origin(voxel.z) + UVec2::new(voxel.x, voxel.y)
    }

    /// Returns the linear pixel index of a voxel inside the atlas.
    #[must_use]
    pub fn pixel_index(&self, voxel: UVec3) -> usize {
        let pixel = self.pixel_of(voxel);
        pixel.y as usize * self.atlas_size.x as usize + pixel.x as usize
    }

    /// Inverse of [`AtlasLayout::pixel_of`]. Returns `None` for pixels in
    /// unused tiles or outside the atlas.
    #[must_use]
    pub fn voxel_of(&self, pixel: UVec2) -> Option<UVec3> {
        if pixel.cmpge(self.atlas_size).any() {
            return None;
        }
        let tile = UVec2::new(pixel.x / self.voxel_count.x, pixel.y / self.voxel_count.y);
        let z = tile.y * self.tile_grid.x + tile.x;
        if z >= self.voxel_count.z {
            return None;
        }
        Some(UVec3::new(
            pixel.x % self.voxel_count.x,
            pixel.y % self.voxel_count.y,
            z,
        ))
    }

    /// Returns `(width, height)` of a slice along `axis`.
    #[must_use]
    pub fn slice_extent(&self, axis: ViewAxis) -> (u32, u32) {
        axis.slice_extent(self.voxel_count)
    }

    /// Returns the number of slices along `axis`.
    #[must_use]
    pub fn axis_depth(&self, axis: ViewAxis) -> u32 {
        axis.depth(self.voxel_count)
    }
}

/// A rectangle of atlas pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AtlasRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl AtlasRegion {
    #[must_use]
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Returns the number of pixels in the region.
    #[must_use]
    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }
}
