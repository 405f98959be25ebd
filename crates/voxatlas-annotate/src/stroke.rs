//! State of one paint gesture.

use glam::IVec2;
use voxatlas_core::{plane_mask, Merge, PlaneMask, Sample, Texel, ViewAxis, VoxelEdit};
use voxatlas_render::{EditMark, SurfaceSync};

/// Before/after snapshots of the slice a stroke painted on.
///
/// Emitted when a stroke ends with undo tracking enabled. Writing `before`
/// back with `set_slice` undoes the stroke; writing `after` redoes it.
#[derive(Debug, Clone, PartialEq)]
pub struct UndoRecord<T> {
    pub before: Vec<T>,
    pub after: Vec<T>,
    pub slice_number: u32,
    pub view_axis: ViewAxis,
}

/// Whether a stroke is in progress. At most one stroke is active at a time.
pub enum StrokeState<T: Sample> {
    Idle,
    Active(Stroke<T>),
}

impl<T: Sample> Default for StrokeState<T> {
    fn default() -> Self {
        Self::Idle
    }
}

/// An active stroke on one slice.
pub struct Stroke<T: Sample> {
    pub(crate) axis: ViewAxis,
    pub(crate) slice: u32,
    pub(crate) width: u32,
    pub(crate) height: u32,
    components: u32,
    /// Slice content when the stroke started. Restored on abort and
    /// emitted as the undo `before` state.
    pub(crate) initial: Vec<T>,
    pub(crate) track_undo: bool,
    /// Slice content with this stroke applied; merge reads old values here.
    working: Vec<T>,
    /// Pixels written by this stroke. Doubles as the region grower's visited set.
    pub(crate) painted: PlaneMask,
    /// Pixels painted by the brush itself, in order.
    pub(crate) seeds: Vec<IVec2>,
    pub(crate) last: IVec2,
    pub(crate) mark: EditMark,
    value: Texel<T>,
    merge: Box<dyn Merge<T>>,
}

impl<T: Sample> Stroke<T> {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        axis: ViewAxis,
        slice: u32,
        (width, height): (u32, u32),
        components: u32,
        working: Vec<T>,
        track_undo: bool,
        start: IVec2,
        mark: EditMark,
        value: Texel<T>,
        merge: Box<dyn Merge<T>>,
    ) -> Self {
        Self {
            axis,
            slice,
            width,
            height,
            components,
            initial: working.clone(),
            track_undo,
            working,
            painted: plane_mask(width, height),
            seeds: Vec::new(),
            last: start,
            mark,
            value,
            merge,
        }
    }

    pub fn axis(&self) -> ViewAxis {
        self.axis
    }

    pub fn slice_number(&self) -> u32 {
        self.slice
    }

    /// Number of pixels written so far.
    pub fn painted_count(&self) -> usize {
        self.painted.count_ones()
    }

    fn plane_index(&self, p: IVec2) -> Option<usize> {
        let x = u32::try_from(p.x).ok().filter(|&x| x < self.width)?;
        let y = u32::try_from(p.y).ok().filter(|&y| y < self.height)?;
        Some(y as usize * self.width as usize + x as usize)
    }

    /// Brush-paints `points`, skipping pixels outside the slice and pixels
    /// this stroke already wrote. Returns the number of voxels written.
    pub(crate) fn paint(&mut self, surface: &mut SurfaceSync<T>, points: &[IVec2]) -> usize {
        let mut fresh = Vec::with_capacity(points.len());
        for &p in points {
            let Some(i) = self.plane_index(p) else {
                continue;
            };
            if self.painted[i] {
                continue;
            }
            self.painted.set(i, true);
            self.seeds.push(p);
            fresh.push(p);
        }
        self.write(surface, &fresh)
    }

    /// Merges the brush value into `points` and queues the results.
    pub(crate) fn write(&mut self, surface: &mut SurfaceSync<T>, points: &[IVec2]) -> usize {
        let c = self.components as usize;
        #[allow(clippy::cast_possible_wrap)]
        let slice = self.slice as i32;
        let mut edits = Vec::with_capacity(points.len());
        for &p in points {
            let Some(i) = self.plane_index(p) else {
                continue;
            };
            let texel = &mut self.working[i * c..(i + 1) * c];
            let mut old = [T::default(); 4];
            old[..c].copy_from_slice(texel);
            let merged = self.merge.merge_texel(&self.value, &old, self.components);
            texel.copy_from_slice(&merged[..c]);
            edits.push(VoxelEdit::new(self.axis.to_voxel(p, slice), merged));
        }
        surface.set_voxels(&edits)
    }
}
