//! Stroke lifecycle: `start_at` → `move_to`* → `end_at`.

use glam::{IVec2, IVec3};
use voxatlas_core::{
    splat, AtlasError, BrushOptions, Merge, Options, Rasterizer, RegionGrower, Result, Sample,
    SmartBrushOptions, ViewAxis,
};
use voxatlas_render::SurfaceSync;

use crate::stroke::{Stroke, StrokeState, UndoRecord};

/// Turns pointer input into merged voxel edits on a [`SurfaceSync`].
///
/// A stroke starts with a filled brush circle, then every drag segment is a
/// Bresenham line with a border-only circle stamped on each point. Each voxel
/// is written at most once per stroke. When a smart brush is configured and
/// an intensity plane is supplied to [`Annotator::end_at`], the painted area
/// is grown by region growing before the stroke closes.
pub struct Annotator<T: Sample> {
    brush: BrushOptions,
    grower: Option<RegionGrower>,
    rasterizer: Rasterizer,
    state: StrokeState<T>,
}

impl<T: Sample> Annotator<T> {
    pub fn new(options: &Options) -> Self {
        Self {
            brush: options.brush,
            grower: options.smart_brush.as_ref().map(RegionGrower::from_options),
            rasterizer: Rasterizer::new(),
            state: StrokeState::Idle,
        }
    }

    pub fn brush(&self) -> &BrushOptions {
        &self.brush
    }

    /// Replaces the brush settings. Takes effect from the next stroke.
    pub fn set_brush(&mut self, brush: BrushOptions) {
        self.brush = brush;
    }

    pub fn set_smart_brush(&mut self, options: Option<SmartBrushOptions>) {
        self.grower = options.as_ref().map(RegionGrower::from_options);
    }

    pub fn is_active(&self) -> bool {
        matches!(self.state, StrokeState::Active(_))
    }

    /// Returns the axis and slice of the active stroke.
    pub fn active_slice(&self) -> Option<(ViewAxis, u32)> {
        match &self.state {
            StrokeState::Active(stroke) => Some((stroke.axis(), stroke.slice_number())),
            StrokeState::Idle => None,
        }
    }

    pub fn rasterizer(&self) -> &Rasterizer {
        &self.rasterizer
    }

    /// Starts a stroke with the configured merge mode.
    ///
    /// See [`Annotator::start_at_with`].
    pub fn start_at(
        &mut self,
        surface: &mut SurfaceSync<T>,
        axis: ViewAxis,
        voxel: IVec3,
    ) -> Result<bool> {
        let merge = self.brush.merge;
        self.start_at_with(surface, axis, voxel, merge)
    }

    /// Starts a stroke on the `axis` slice through `voxel`, compositing with
    /// `merge` for the whole stroke.
    ///
    /// Returns `Ok(false)` without painting if a stroke is already active.
    /// Fails with [`AtlasError::OutOfRange`] if `voxel` lies outside the
    /// volume along `axis`.
    pub fn start_at_with(
        &mut self,
        surface: &mut SurfaceSync<T>,
        axis: ViewAxis,
        voxel: IVec3,
        merge: impl Merge<T> + 'static,
    ) -> Result<bool> {
        if self.is_active() {
            log::debug!("stroke already active; ignoring start");
            return Ok(false);
        }
        let (point, slice) = axis.to_plane(voxel);
        let slice = u32::try_from(slice).map_err(|_| AtlasError::OutOfRange {
            axis,
            index: 0,
            depth: surface.layout().axis_depth(axis),
        })?;
        let working = surface.get_slice(axis, slice)?;
        let extent = surface.layout().slice_extent(axis);

        let mut stroke = Stroke::new(
            axis,
            slice,
            extent,
            surface.components(),
            working,
            self.brush.track_undo,
            point,
            surface.edit_mark(),
            splat(T::from_f64(self.brush.value)),
            Box::new(merge),
        );
        let footprint: Vec<IVec2> = self
            .rasterizer
            .circle(self.brush.radius, true)
            .iter()
            .map(|&offset| point + offset)
            .collect();
        stroke.paint(surface, &footprint);
        log::debug!("stroke started on {axis} slice {slice}");
        self.state = StrokeState::Active(stroke);
        Ok(true)
    }

    /// Extends the active stroke to `voxel`, projected onto its slice.
    ///
    /// Returns `false` if no stroke is active.
    pub fn move_to(&mut self, surface: &mut SurfaceSync<T>, voxel: IVec3) -> bool {
        let StrokeState::Active(stroke) = &mut self.state else {
            return false;
        };
        let (point, _) = stroke.axis.to_plane(voxel);
        let segment = self
            .rasterizer
            .stroke_segment(stroke.last, point, self.brush.radius);
        stroke.paint(surface, &segment);
        stroke.last = point;
        true
    }

    /// Finishes the active stroke at `voxel`.
    ///
    /// `intensity` is the source intensity of the stroke's slice, one value
    /// per pixel; the smart brush runs only when it is configured and this
    /// is supplied. Returns the undo record when undo tracking is on, and
    /// `Ok(None)` if no stroke was active. On error the stroke is aborted.
    pub fn end_at(
        &mut self,
        surface: &mut SurfaceSync<T>,
        voxel: IVec3,
        intensity: Option<&[f32]>,
    ) -> Result<Option<UndoRecord<T>>> {
        let StrokeState::Active(mut stroke) = std::mem::take(&mut self.state) else {
            return Ok(None);
        };
        let (point, _) = stroke.axis.to_plane(voxel);
        let segment = self
            .rasterizer
            .stroke_segment(stroke.last, point, self.brush.radius);
        stroke.paint(surface, &segment);
        stroke.last = point;

        if let (Some(grower), Some(intensity)) = (self.grower, intensity) {
            let grown = grower.grow(
                intensity,
                stroke.width,
                stroke.height,
                &stroke.seeds,
                &mut stroke.painted,
            );
            match grown {
                Ok(accepted) => {
                    stroke.write(surface, &accepted);
                }
                Err(err) => {
                    abort_stroke(surface, stroke);
                    return Err(err);
                }
            }
        }

        log::debug!(
            "stroke on {} slice {} finished with {} voxels",
            stroke.axis,
            stroke.slice,
            stroke.painted_count()
        );
        if !stroke.track_undo {
            return Ok(None);
        }
        match surface.get_slice(stroke.axis, stroke.slice) {
            Ok(after) => Ok(Some(UndoRecord {
                before: stroke.initial,
                after,
                slice_number: stroke.slice,
                view_axis: stroke.axis,
            })),
            Err(err) => {
                abort_stroke(surface, stroke);
                Err(err)
            }
        }
    }

    /// Cancels the active stroke: its queued edits are discarded and the
    /// slice is written back to its state at `start_at`, so surfaces that
    /// already drew part of the stroke converge with the rest. Returns
    /// `false` if no stroke was active.
    pub fn abort(&mut self, surface: &mut SurfaceSync<T>) -> bool {
        match std::mem::take(&mut self.state) {
            StrokeState::Active(stroke) => {
                abort_stroke(surface, stroke);
                true
            }
            StrokeState::Idle => false,
        }
    }
}

fn abort_stroke<T: Sample>(surface: &mut SurfaceSync<T>, stroke: Stroke<T>) {
    let discarded = surface.discard_edits_since(stroke.mark);
    // Drawn or read-back edits survive the discard; the restore covers them.
    if let Err(err) = surface.set_slice(stroke.axis, stroke.slice, Some(&stroke.initial)) {
        log::warn!(
            "could not restore {} slice {} after abort: {err}",
            stroke.axis,
            stroke.slice
        );
    }
    log::debug!(
        "stroke on {} slice {} aborted; {discarded} queued edits discarded",
        stroke.axis,
        stroke.slice
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::UVec3;
    use proptest::prelude::*;
    use voxatlas_core::{AtlasLayout, MergeMode, PackedAtlas, SmartBrushOptions};
    use voxatlas_render::CpuSurface;

    const COUNT: UVec3 = UVec3::new(16, 16, 4);

    fn surface_filled(value: u8) -> SurfaceSync<u8> {
        let layout = AtlasLayout::compute(COUNT).unwrap();
        let mut atlas = PackedAtlas::zeroed(layout, 1).unwrap();
        let data = vec![value; atlas.data().len()];
        atlas.replace_data(data).unwrap();
        SurfaceSync::from_atlas(atlas)
    }

    fn options(radius: u32, merge: MergeMode) -> Options {
        let mut options = Options::default();
        options.brush.radius = radius;
        options.brush.merge = merge;
        options
    }

    fn value_at(surface: &mut SurfaceSync<u8>, x: i32, y: i32, z: i32) -> u8 {
        surface.voxel(IVec3::new(x, y, z)).unwrap().unwrap()[0]
    }

    #[test]
    fn test_start_paints_filled_circle() {
        let mut surface = surface_filled(0);
        let mut annotator = Annotator::new(&options(2, MergeMode::Replace));
        assert!(annotator
            .start_at(&mut surface, ViewAxis::Axial, IVec3::new(8, 8, 1))
            .unwrap());

        assert_eq!(value_at(&mut surface, 8, 8, 1), 1);
        assert_eq!(value_at(&mut surface, 10, 8, 1), 1);
        assert_eq!(value_at(&mut surface, 11, 8, 1), 0);
        assert_eq!(value_at(&mut surface, 8, 8, 0), 0);
        assert_eq!(annotator.active_slice(), Some((ViewAxis::Axial, 1)));
    }

    #[test]
    fn test_second_start_is_noop() {
        let mut surface = surface_filled(0);
        let mut annotator = Annotator::new(&options(0, MergeMode::Replace));
        annotator
            .start_at(&mut surface, ViewAxis::Axial, IVec3::new(1, 1, 0))
            .unwrap();
        let started = annotator
            .start_at(&mut surface, ViewAxis::Coronal, IVec3::new(5, 5, 2))
            .unwrap();

        assert!(!started);
        assert_eq!(value_at(&mut surface, 5, 5, 2), 0);
        assert_eq!(annotator.active_slice(), Some((ViewAxis::Axial, 0)));
    }

    #[test]
    fn test_move_and_end_without_stroke_are_noops() {
        let mut surface = surface_filled(0);
        let mut annotator = Annotator::new(&options(1, MergeMode::Replace));
        assert!(!annotator.move_to(&mut surface, IVec3::new(3, 3, 0)));
        assert_eq!(
            annotator
                .end_at(&mut surface, IVec3::new(3, 3, 0), None)
                .unwrap(),
            None
        );
        assert!(surface.get_atlas().unwrap().data().iter().all(|&v| v == 0));
        assert!(!annotator.abort(&mut surface));
    }

    #[test]
    fn test_drag_paints_continuous_line() {
        let mut surface = surface_filled(0);
        let mut annotator = Annotator::new(&options(1, MergeMode::Replace));
        annotator
            .start_at(&mut surface, ViewAxis::Axial, IVec3::new(2, 2, 3))
            .unwrap();
        assert!(annotator.move_to(&mut surface, IVec3::new(12, 2, 3)));
        annotator
            .end_at(&mut surface, IVec3::new(12, 6, 3), None)
            .unwrap();

        for x in 2..=12 {
            assert_eq!(value_at(&mut surface, x, 2, 3), 1, "x = {x}");
        }
        for y in 2..=6 {
            assert_eq!(value_at(&mut surface, 12, y, 3), 1, "y = {y}");
        }
        assert_eq!(value_at(&mut surface, 7, 5, 3), 0);
        assert!(!annotator.is_active());
    }

    #[test]
    fn test_undo_record() {
        let mut surface = surface_filled(0);
        let mut annotator = Annotator::new(&options(0, MergeMode::Replace));
        annotator
            .start_at(&mut surface, ViewAxis::Coronal, IVec3::new(4, 7, 2))
            .unwrap();
        let record = annotator
            .end_at(&mut surface, IVec3::new(4, 7, 2), None)
            .unwrap()
            .unwrap();

        assert_eq!(record.view_axis, ViewAxis::Coronal);
        assert_eq!(record.slice_number, 7);
        assert!(record.before.iter().all(|&v| v == 0));
        // Coronal slices are nx wide; (x=4, z=2) is pixel 2 * 16 + 4.
        assert_eq!(record.after[2 * 16 + 4], 1);
        assert_eq!(record.after.iter().filter(|&&v| v != 0).count(), 1);

        surface
            .set_slice(record.view_axis, record.slice_number, Some(&record.before))
            .unwrap();
        assert_eq!(value_at(&mut surface, 4, 7, 2), 0);
    }

    #[test]
    fn test_no_undo_record_when_untracked() {
        let mut surface = surface_filled(0);
        let mut opts = options(0, MergeMode::Replace);
        opts.brush.track_undo = false;
        let mut annotator = Annotator::new(&opts);
        annotator
            .start_at(&mut surface, ViewAxis::Axial, IVec3::ZERO)
            .unwrap();
        assert_eq!(
            annotator.end_at(&mut surface, IVec3::ZERO, None).unwrap(),
            None
        );
        assert_eq!(value_at(&mut surface, 0, 0, 0), 1);
    }

    #[test]
    fn test_merge_modes() {
        let mut surface = surface_filled(5);
        let mut opts = options(0, MergeMode::Max);
        opts.brush.value = 3.0;
        let mut annotator = Annotator::new(&opts);
        annotator
            .start_at(&mut surface, ViewAxis::Axial, IVec3::new(1, 1, 1))
            .unwrap();
        annotator
            .end_at(&mut surface, IVec3::new(1, 1, 1), None)
            .unwrap();
        assert_eq!(value_at(&mut surface, 1, 1, 1), 5);

        annotator
            .start_at_with(&mut surface, ViewAxis::Axial, IVec3::new(1, 1, 1), MergeMode::Add)
            .unwrap();
        annotator
            .end_at(&mut surface, IVec3::new(1, 1, 1), None)
            .unwrap();
        assert_eq!(value_at(&mut surface, 1, 1, 1), 8);

        let halve = |_new: u8, old: u8| old / 2;
        annotator
            .start_at_with(&mut surface, ViewAxis::Axial, IVec3::new(1, 1, 1), halve)
            .unwrap();
        annotator
            .end_at(&mut surface, IVec3::new(1, 1, 1), None)
            .unwrap();
        assert_eq!(value_at(&mut surface, 1, 1, 1), 4);
    }

    #[test]
    fn test_sagittal_coordinates() {
        let mut surface = surface_filled(0);
        let mut annotator = Annotator::new(&options(0, MergeMode::Replace));
        annotator
            .start_at(&mut surface, ViewAxis::Sagittal, IVec3::new(3, 5, 2))
            .unwrap();
        annotator
            .end_at(&mut surface, IVec3::new(9, 6, 3), None)
            .unwrap();
        // The end point is projected onto x = 3.
        assert_eq!(value_at(&mut surface, 3, 5, 2), 1);
        assert_eq!(value_at(&mut surface, 3, 6, 3), 1);
        assert_eq!(value_at(&mut surface, 9, 6, 3), 0);
    }

    #[test]
    fn test_start_out_of_range() {
        let mut surface = surface_filled(0);
        let mut annotator = Annotator::new(&options(1, MergeMode::Replace));
        assert!(matches!(
            annotator.start_at(&mut surface, ViewAxis::Axial, IVec3::new(0, 0, 4)),
            Err(AtlasError::OutOfRange { index: 4, depth: 4, .. })
        ));
        assert!(matches!(
            annotator.start_at(&mut surface, ViewAxis::Coronal, IVec3::new(0, -1, 0)),
            Err(AtlasError::OutOfRange { .. })
        ));
        assert!(!annotator.is_active());
    }

    #[test]
    fn test_brush_past_edge_is_clipped() {
        let mut surface = surface_filled(0);
        let mut annotator = Annotator::new(&options(3, MergeMode::Replace));
        annotator
            .start_at(&mut surface, ViewAxis::Axial, IVec3::new(0, 0, 0))
            .unwrap();
        annotator
            .end_at(&mut surface, IVec3::new(-5, 0, 0), None)
            .unwrap();
        assert_eq!(value_at(&mut surface, 0, 0, 0), 1);
        assert_eq!(value_at(&mut surface, 0, 0, 1), 0);
    }

    #[test]
    fn test_smart_brush_grows_region() {
        let mut surface = surface_filled(0);
        let mut opts = options(0, MergeMode::Replace);
        opts.smart_brush = Some(SmartBrushOptions {
            seed_threshold: 10.0,
            neighbor_threshold: 5.0,
        });
        let mut annotator = Annotator::new(&opts);

        // A bright 4x4 square at (4..8, 4..8) on a dark background.
        let intensity: Vec<f32> = (0..16 * 16)
            .map(|i| {
                let (x, y) = (i % 16, i / 16);
                if (4..8).contains(&x) && (4..8).contains(&y) {
                    200.0
                } else {
                    10.0
                }
            })
            .collect();

        annotator
            .start_at(&mut surface, ViewAxis::Axial, IVec3::new(5, 5, 0))
            .unwrap();
        let record = annotator
            .end_at(&mut surface, IVec3::new(5, 5, 0), Some(&intensity))
            .unwrap()
            .unwrap();

        assert_eq!(record.after.iter().filter(|&&v| v == 1).count(), 16);
        assert_eq!(value_at(&mut surface, 7, 7, 0), 1);
        assert_eq!(value_at(&mut surface, 8, 7, 0), 0);
    }

    #[test]
    fn test_bad_intensity_aborts_stroke() {
        let layout = AtlasLayout::compute(COUNT).unwrap();
        let mut surface = surface_filled(0);
        surface
            .add_consumer(Box::new(CpuSurface::new(&layout, 1)))
            .unwrap();
        surface.render(0).unwrap();

        let mut opts = options(1, MergeMode::Replace);
        opts.smart_brush = Some(SmartBrushOptions {
            seed_threshold: 1.0,
            neighbor_threshold: 1.0,
        });
        let mut annotator = Annotator::new(&opts);
        annotator
            .start_at(&mut surface, ViewAxis::Axial, IVec3::new(4, 4, 2))
            .unwrap();
        annotator.move_to(&mut surface, IVec3::new(8, 4, 2));
        // Let the surface draw part of the stroke before it fails.
        surface.render(0).unwrap();

        let err = annotator
            .end_at(&mut surface, IVec3::new(8, 8, 2), Some(&[0.0; 3]))
            .unwrap_err();
        assert!(matches!(err, AtlasError::SizeMismatch { .. }));
        assert!(!annotator.is_active());

        surface.render(0).unwrap();
        assert!(surface.get_atlas().unwrap().data().iter().all(|&v| v == 0));
    }

    #[test]
    fn test_abort_restores_slice() {
        let mut surface = surface_filled(0);
        let mut annotator = Annotator::new(&options(2, MergeMode::Replace));
        annotator
            .start_at(&mut surface, ViewAxis::Axial, IVec3::new(8, 8, 0))
            .unwrap();
        annotator.move_to(&mut surface, IVec3::new(10, 12, 0));
        assert!(annotator.abort(&mut surface));
        assert!(!annotator.is_active());
        assert!(surface.get_atlas().unwrap().data().iter().all(|&v| v == 0));
    }

    fn untracked(radius: u32) -> Options {
        let mut opts = options(radius, MergeMode::Replace);
        opts.brush.track_undo = false;
        opts
    }

    fn painted(pixels: &[u8]) -> usize {
        pixels.iter().filter(|&&v| v != 0).count()
    }

    #[test]
    fn test_abort_after_partial_render_converges_views() {
        let layout = AtlasLayout::compute(UVec3::new(8, 8, 2)).unwrap();
        let atlas = PackedAtlas::zeroed(layout, 1).unwrap();
        let mut surface = SurfaceSync::<u8>::from_atlas(atlas);
        for _ in 0..2 {
            surface
                .add_consumer(Box::new(CpuSurface::new(&layout, 1)))
                .unwrap();
        }
        surface.render_all().unwrap();

        let mut annotator = Annotator::new(&untracked(1));
        annotator
            .start_at(&mut surface, ViewAxis::Axial, IVec3::new(4, 4, 0))
            .unwrap();
        surface.render(0).unwrap();
        assert!(annotator.abort(&mut surface));
        surface.render_all().unwrap();

        for view in 0..2 {
            let pixels = surface
                .consumer(view)
                .unwrap()
                .surface()
                .read_pixels()
                .unwrap();
            assert_eq!(painted(&pixels), 0, "view {view}");
        }
        assert_eq!(painted(surface.get_atlas().unwrap().data()), 0);
    }

    #[test]
    fn test_abort_after_mid_stroke_read_converges_cpu_copy() {
        let layout = AtlasLayout::compute(UVec3::new(8, 8, 2)).unwrap();
        let atlas = PackedAtlas::zeroed(layout, 1).unwrap();
        let mut surface = SurfaceSync::<u8>::from_atlas(atlas);
        surface
            .add_consumer(Box::new(CpuSurface::new(&layout, 1)))
            .unwrap();
        surface.render_all().unwrap();

        let mut annotator = Annotator::new(&untracked(1));
        annotator
            .start_at(&mut surface, ViewAxis::Axial, IVec3::new(4, 4, 0))
            .unwrap();
        let mid = surface.get_slice(ViewAxis::Axial, 0).unwrap();
        assert!(painted(&mid) > 0);
        assert!(annotator.abort(&mut surface));
        surface.render_all().unwrap();

        let view = surface.consumer(0).unwrap().surface().read_pixels().unwrap();
        assert_eq!(painted(&view), 0);
        assert_eq!(painted(surface.get_atlas().unwrap().data()), 0);
        assert_eq!(painted(&surface.get_slice(ViewAxis::Axial, 0).unwrap()), 0);
    }

    proptest! {
        #[test]
        fn prop_voxel_painted_once_per_stroke(
            path in prop::collection::vec((0i32..16, 0i32..16), 1..12),
            radius in 0u32..4,
        ) {
            let mut surface = surface_filled(0);
            let mut annotator = Annotator::new(&options(radius, MergeMode::Add));
            let (x0, y0) = path[0];
            annotator.start_at(&mut surface, ViewAxis::Axial, IVec3::new(x0, y0, 1)).unwrap();
            for &(x, y) in &path[1..] {
                annotator.move_to(&mut surface, IVec3::new(x, y, 1));
            }
            let (xn, yn) = path[path.len() - 1];
            let record = annotator
                .end_at(&mut surface, IVec3::new(xn, yn, 1), None)
                .unwrap()
                .unwrap();
            prop_assert!(record.after.iter().all(|&v| v <= 1));
            prop_assert!(record.after.iter().any(|&v| v == 1));
        }
    }
}
