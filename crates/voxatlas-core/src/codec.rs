//! Conversion between flat voxel buffers and packed 2D atlases.

use glam::{IVec3, Mat3, UVec2, UVec3, Vec3};

use crate::error::{AtlasError, Result};
use crate::layout::{AtlasLayout, AtlasRegion};
use crate::sample::{PixelFormat, Sample, Texel};
use crate::voxel::{VoxelBuffer, VoxelEdit};

/// In-plane axes flipped while packing so every atlas shares one screen
/// orientation regardless of scan handedness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct AxisMirror {
    pub x: bool,
    pub y: bool,
}

impl AxisMirror {
    /// No mirroring.
    pub const NONE: AxisMirror = AxisMirror { x: false, y: false };

    /// Derives the mirror from an orientation matrix.
    ///
    /// Each of the first two columns is rounded to a unit axis; an axis is
    /// mirrored when its dominant component is negative.
    #[must_use]
    pub fn from_orientation(orientation: Mat3) -> Self {
        Self {
            x: dominant_is_negative(orientation.x_axis),
            y: dominant_is_negative(orientation.y_axis),
        }
    }

    fn apply(self, x: u32, y: u32, voxel_count: UVec3) -> (u32, u32) {
        let x = if self.x { voxel_count.x - 1 - x } else { x };
        let y = if self.y { voxel_count.y - 1 - y } else { y };
        (x, y)
    }
}

fn dominant_is_negative(axis: Vec3) -> bool {
    let rounded = axis.round();
    let abs = rounded.abs();
    let dominant = if abs.x >= abs.y && abs.x >= abs.z {
        rounded.x
    } else if abs.y >= abs.z {
        rounded.y
    } else {
        rounded.z
    };
    dominant < 0.0
}

/// A volume packed into a tiled 2D texture, one tile per depth slice.
///
/// Texels are stored row-major over the atlas, `components` samples each.
/// Pixels in unused tiles stay zero.
#[derive(Debug, Clone, PartialEq)]
pub struct PackedAtlas<T: Sample> {
    layout: AtlasLayout,
    components: u32,
    mirror: AxisMirror,
    data: Vec<T>,
}

impl<T: Sample> PackedAtlas<T> {
    /// Creates a zero-filled atlas.
    ///
    /// # Errors
    /// Returns [`AtlasError::InvalidComponents`] outside `1..=4`.
    pub fn zeroed(layout: AtlasLayout, components: u32) -> Result<Self> {
        check_components(components)?;
        Ok(Self {
            layout,
            components,
            mirror: AxisMirror::NONE,
            data: vec![T::default(); layout.pixel_count() * components as usize],
        })
    }

    /// Wraps existing atlas-ordered data.
    ///
    /// # Errors
    /// Fails if `components` is invalid or `data` has the wrong length.
    pub fn from_raw(
        layout: AtlasLayout,
        components: u32,
        mirror: AxisMirror,
        data: Vec<T>,
    ) -> Result<Self> {
        check_components(components)?;
        let expected = layout.pixel_count() * components as usize;
        if data.len() != expected {
            return Err(AtlasError::SizeMismatch {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            layout,
            components,
            mirror,
            data,
        })
    }

    #[must_use]
    pub fn layout(&self) -> &AtlasLayout {
        &self.layout
    }

    #[must_use]
    pub fn components(&self) -> u32 {
        self.components
    }

    /// Returns the pixel format matching the component count.
    #[must_use]
    pub fn format(&self) -> PixelFormat {
        match self.components {
            1 => PixelFormat::R,
            2 => PixelFormat::Rg,
            3 => PixelFormat::Rgb,
            _ => PixelFormat::Rgba,
        }
    }

    /// Returns the mirroring applied when this atlas was packed.
    #[must_use]
    pub fn mirror(&self) -> AxisMirror {
        self.mirror
    }

    #[must_use]
    pub fn data(&self) -> &[T] {
        &self.data
    }

    #[must_use]
    pub fn into_data(self) -> Vec<T> {
        self.data
    }

    /// Replaces the raw texel data, e.g. after a read-back.
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

    fn texel_offset(&self, voxel: UVec3) -> usize {
        self.layout.pixel_index(voxel) * self.components as usize
    }

    /// Reads one voxel. Returns `None` outside the volume.
    #[must_use]
    pub fn texel(&self, voxel: IVec3) -> Option<Texel<T>> {
        if !self.layout.contains(voxel) {
            return None;
        }
        let start = self.texel_offset(voxel.as_uvec3());
        let mut texel = [T::default(); 4];
        let c = self.components as usize;
        texel[..c].copy_from_slice(&self.data[start..start + c]);
        Some(texel)
    }

    /// Writes one voxel. Returns `false` (and writes nothing) outside the volume.
    pub fn set_texel(&mut self, voxel: IVec3, value: Texel<T>) -> bool {
        if !self.layout.contains(voxel) {
            return false;
        }
        let start = self.texel_offset(voxel.as_uvec3());
        let c = self.components as usize;
        self.data[start..start + c].copy_from_slice(&value[..c]);
        true
    }

    /// Applies point edits in order; later edits to the same voxel win.
    /// Returns the number of edits that landed inside the volume.
    pub fn apply_edits(&mut self, edits: &[VoxelEdit<T>]) -> usize {
        edits
            .iter()
            .filter(|edit| self.set_texel(edit.position, edit.value))
            .count()
    }

    /// Copies a rectangle of texels out of the atlas, row-major.
    #[must_use]
    pub fn read_region(&self, region: AtlasRegion) -> Vec<T> {
        let c = self.components as usize;
        let row_len = region.width as usize * c;
        let mut out = Vec::with_capacity(region.pixel_count() * c);
        for row in 0..region.height {
            let start = self.row_offset(region.x, region.y + row);
            out.extend_from_slice(&self.data[start..start + row_len]);
        }
        out
    }

    /// Overwrites a rectangle of texels. `texels` must hold exactly
    /// `width * height * components` samples.
    ///
    /// # Errors
    /// Fails with [`AtlasError::SizeMismatch`] on a length mismatch.
    pub fn write_region(&mut self, region: AtlasRegion, texels: &[T]) -> Result<()> {
        let c = self.components as usize;
        let expected = region.pixel_count() * c;
        if texels.len() != expected {
            return Err(AtlasError::SizeMismatch {
                expected,
                actual: texels.len(),
            });
        }
        let row_len = region.width as usize * c;
        for (row, chunk) in (0..region.height).zip(texels.chunks_exact(row_len.max(1))) {
            let start = self.row_offset(region.x, region.y + row);
            self.data[start..start + row_len].copy_from_slice(chunk);
        }
        Ok(())
    }

    /// Sets every texel of a rectangle to zero.
    pub fn clear_region(&mut self, region: AtlasRegion) {
        let row_len = region.width as usize * self.components as usize;
        for row in 0..region.height {
            let start = self.row_offset(region.x, region.y + row);
            self.data[start..start + row_len].fill(T::default());
        }
    }

    fn row_offset(&self, x: u32, y: u32) -> usize {
        (y as usize * self.layout.atlas_size().x as usize + x as usize) * self.components as usize
    }

    /// Returns the atlas pixel of a voxel, for backends addressing pixels directly.
    #[must_use]
    pub fn pixel_of(&self, voxel: UVec3) -> UVec2 {
        self.layout.pixel_of(voxel)
    }
}

fn check_components(components: u32) -> Result<()> {
    if (1..=4).contains(&components) {
        Ok(())
    } else {
        Err(AtlasError::InvalidComponents(components))
    }
}

/// Packs a voxel buffer into the tiled atlas layout.
///
/// Each depth slice `z` is copied into tile `(z mod gx, z / gx)`, mirrored in
/// `x`/`y` according to `orientation`.
///
/// # Errors
/// Fails with [`AtlasError::SizeMismatch`] if the buffer's voxel count does
/// not match the layout.
pub fn pack<T: Sample>(
    buffer: &VoxelBuffer<T>,
    layout: &AtlasLayout,
    orientation: Mat3,
) -> Result<PackedAtlas<T>> {
    let voxel_count = layout.voxel_count();
    if buffer.voxel_count() != voxel_count {
        return Err(AtlasError::SizeMismatch {
            expected: crate::voxel::sample_count(voxel_count, buffer.components()),
            actual: buffer.data().len(),
        });
    }
    let mirror = AxisMirror::from_orientation(orientation);
    let mut atlas = PackedAtlas::zeroed(*layout, buffer.components())?;
    atlas.mirror = mirror;
    let c = buffer.components() as usize;
    let src = buffer.data();

    for z in 0..voxel_count.z {
        for y in 0..voxel_count.y {
            for x in 0..voxel_count.x {
                let from = buffer.flatten_index(x, y, z);
                let (ax, ay) = mirror.apply(x, y, voxel_count);
                let to = atlas.texel_offset(UVec3::new(ax, ay, z));
                atlas.data[to..to + c].copy_from_slice(&src[from..from + c]);
            }
        }
    }
    log::debug!(
        "packed {}x{}x{} volume ({} components, mirror {:?})",
        voxel_count.x,
        voxel_count.y,
        voxel_count.z,
        c,
        mirror
    );
    Ok(atlas)
}

/// Unpacks an atlas back into flat `x`-fastest order.
///
/// The mirroring recorded by [`pack`] is undone, so `unpack(pack(b)) == b`.
///
/// # Errors
/// Fails with [`AtlasError::SizeMismatch`] if `layout` does not match the atlas.
pub fn unpack<T: Sample>(atlas: &PackedAtlas<T>, layout: &AtlasLayout) -> Result<Vec<T>> {
    if atlas.layout() != layout {
        return Err(AtlasError::SizeMismatch {
            expected: layout.pixel_count() * atlas.components() as usize,
            actual: atlas.data().len(),
        });
    }
    let voxel_count = layout.voxel_count();
    let c = atlas.components() as usize;
    let mut out = Vec::with_capacity(crate::voxel::sample_count(voxel_count, atlas.components()));

    for z in 0..voxel_count.z {
        for y in 0..voxel_count.y {
            for x in 0..voxel_count.x {
                let (ax, ay) = atlas.mirror.apply(x, y, voxel_count);
                let from = atlas.texel_offset(UVec3::new(ax, ay, z));
                out.extend_from_slice(&atlas.data[from..from + c]);
            }
        }
    }
    Ok(out)
}
