//! One open volume: its atlas, views, active brush and undo records.

use std::sync::Arc;

use glam::{IVec3, Mat3, UVec3, Vec3};
use voxatlas_annotate::{Annotator, UndoRecord};
use voxatlas_core::{
    pack, unpack, AtlasError, AtlasLayout, Merge, Options, PackedAtlas, Result, Sample,
    SliceCodec, Texel, ViewAxis, VoxelBuffer,
};
use voxatlas_render::{
    CpuSurface, GpuContext, GpuSample, GpuSurface, RenderOutcome, RenderSurface, SurfaceSync,
};

/// Source intensities for the smart brush, packed like the label atlas.
struct IntensityVolume {
    atlas: PackedAtlas<f32>,
    slices: SliceCodec<f32>,
}

/// An editable volume from load to close.
///
/// The voxel buffer is packed once on load. From then on the
/// [`SurfaceSync`] owns the data; edits go through it and every registered
/// view catches up on its next [`render`](Self::render).
pub struct VolumeDocument<T: Sample> {
    layout: AtlasLayout,
    orientation: Mat3,
    spacing: Vec3,
    origin: Vec3,
    options: Options,
    surface: SurfaceSync<T>,
    annotator: Annotator<T>,
    intensity: Option<IntensityVolume>,
    undo_records: Vec<UndoRecord<T>>,
}

impl<T: Sample> VolumeDocument<T> {
    /// Packs `buffer` into an atlas and opens a document on it.
    pub fn load(buffer: &VoxelBuffer<T>, options: Options) -> Result<Self> {
        let layout = AtlasLayout::compute(buffer.voxel_count())?;
        let atlas = pack(buffer, &layout, buffer.orientation())?;
        let mut surface = SurfaceSync::from_atlas(atlas);
        surface.set_slice_cache(options.slice_cache);
        let annotator = Annotator::new(&options);

        let count = buffer.voxel_count();
        let grid = layout.tile_grid();
        log::info!(
            "loaded {}x{}x{} volume into {}x{} tile atlas",
            count.x,
            count.y,
            count.z,
            grid.x,
            grid.y
        );
        Ok(Self {
            layout,
            orientation: buffer.orientation(),
            spacing: buffer.spacing(),
            origin: buffer.origin(),
            options,
            surface,
            annotator,
            intensity: None,
            undo_records: Vec::new(),
        })
    }

    pub fn layout(&self) -> &AtlasLayout {
        &self.layout
    }

    pub fn voxel_count(&self) -> UVec3 {
        self.layout.voxel_count()
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Applies new options. Brush changes take effect from the next stroke.
    pub fn set_options(&mut self, options: Options) {
        self.annotator.set_brush(options.brush);
        self.annotator.set_smart_brush(options.smart_brush);
        self.surface.set_slice_cache(options.slice_cache);
        self.options = options;
    }

    pub fn surface(&self) -> &SurfaceSync<T> {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut SurfaceSync<T> {
        &mut self.surface
    }

    pub fn annotator(&self) -> &Annotator<T> {
        &self.annotator
    }

    /// Attaches the scalar intensity volume the smart brush grows through.
    ///
    /// The volume must have this document's voxel count and one component.
    /// It is packed with the document's orientation so its slices line up
    /// with the label slices.
    pub fn attach_intensity(&mut self, buffer: &VoxelBuffer<f32>) -> Result<()> {
        if buffer.voxel_count() != self.layout.voxel_count() {
            return Err(AtlasError::SizeMismatch {
                expected: self.layout.voxel_count().element_product() as usize,
                actual: buffer.voxel_count().element_product() as usize,
            });
        }
        if buffer.components() != 1 {
            return Err(AtlasError::InvalidComponents(buffer.components()));
        }
        let atlas = pack(buffer, &self.layout, self.orientation)?;
        self.intensity = Some(IntensityVolume {
            atlas,
            slices: SliceCodec::new(self.layout),
        });
        log::debug!("attached intensity volume");
        Ok(())
    }

    pub fn has_intensity(&self) -> bool {
        self.intensity.is_some()
    }

    /// Registers a render surface and returns its view index.
    pub fn add_view(&mut self, surface: Box<dyn RenderSurface<T>>) -> Result<usize> {
        self.surface.add_consumer(surface)
    }

    /// Registers a software view.
    pub fn add_cpu_view(&mut self) -> Result<usize> {
        let view = CpuSurface::<T>::new(&self.layout, self.surface.components());
        self.add_view(Box::new(view))
    }

    /// Brings view `view` up to date with every accepted edit.
    pub fn render(&mut self, view: usize) -> Result<RenderOutcome> {
        self.surface.render(view)
    }

    pub fn render_all(&mut self) -> Result<Vec<RenderOutcome>> {
        self.surface.render_all()
    }

    pub fn slice(&mut self, axis: ViewAxis, index: u32) -> Result<Vec<T>> {
        self.surface.get_slice(axis, index)
    }

    /// Writes a slice; `None` clears it.
    pub fn set_slice(&mut self, axis: ViewAxis, index: u32, data: Option<&[T]>) -> Result<()> {
        self.surface.set_slice(axis, index, data)
    }

    pub fn voxel(&mut self, position: IVec3) -> Result<Option<Texel<T>>> {
        self.surface.voxel(position)
    }

    /// Starts a stroke through `voxel` on the `axis` slice containing it.
    ///
    /// Returns `Ok(false)` if a stroke is already active.
    pub fn begin_stroke(&mut self, axis: ViewAxis, voxel: IVec3) -> Result<bool> {
        self.annotator.start_at(&mut self.surface, axis, voxel)
    }

    /// Like [`begin_stroke`](Self::begin_stroke) with a merge function for
    /// this stroke only.
    pub fn begin_stroke_with(
        &mut self,
        axis: ViewAxis,
        voxel: IVec3,
        merge: impl Merge<T> + 'static,
    ) -> Result<bool> {
        self.annotator
            .start_at_with(&mut self.surface, axis, voxel, merge)
    }

    pub fn continue_stroke(&mut self, voxel: IVec3) -> bool {
        self.annotator.move_to(&mut self.surface, voxel)
    }

    /// Ends the active stroke at `voxel`, running the smart brush when it is
    /// configured and an intensity volume is attached.
    ///
    /// Returns whether an undo record was produced.
    pub fn finish_stroke(&mut self, voxel: IVec3) -> Result<bool> {
        let plane = match (self.annotator.active_slice(), &mut self.intensity) {
            (Some((axis, index)), Some(intensity)) if self.options.smart_brush.is_some() => {
                match intensity.slices.read(&intensity.atlas, axis, index) {
                    Ok(plane) => Some(plane),
                    Err(err) => {
                        self.annotator.abort(&mut self.surface);
                        return Err(err);
                    }
                }
            }
            _ => None,
        };
        let record = self
            .annotator
            .end_at(&mut self.surface, voxel, plane.as_deref())?;
        let Some(record) = record else {
            return Ok(false);
        };
        self.undo_records.push(record);
        Ok(true)
    }

    /// Cancels the active stroke. Returns `false` if none was active.
    pub fn abort_stroke(&mut self) -> bool {
        self.annotator.abort(&mut self.surface)
    }

    pub fn undo_records(&self) -> &[UndoRecord<T>] {
        &self.undo_records
    }

    /// Hands the accumulated undo records to the caller's history.
    pub fn take_undo_records(&mut self) -> Vec<UndoRecord<T>> {
        std::mem::take(&mut self.undo_records)
    }

    /// Restores the slice a record was taken from to its `before` state.
    pub fn apply_undo(&mut self, record: &UndoRecord<T>) -> Result<()> {
        self.surface
            .set_slice(record.view_axis, record.slice_number, Some(&record.before))
    }

    /// Reapplies a record's `after` state.
    pub fn apply_redo(&mut self, record: &UndoRecord<T>) -> Result<()> {
        self.surface
            .set_slice(record.view_axis, record.slice_number, Some(&record.after))
    }

    /// Unpacks the current atlas into a voxel buffer carrying the metadata
    /// the document was loaded with. Blocks on a read-back if views hold
    /// edits the CPU copy has not seen.
    pub fn export(&mut self) -> Result<VoxelBuffer<T>> {
        let atlas = self.surface.get_atlas()?;
        let data = unpack(atlas, &self.layout)?;
        Ok(
            VoxelBuffer::new(self.layout.voxel_count(), atlas.components(), data)?
                .with_orientation(self.orientation)
                .with_spacing(self.spacing)
                .with_origin(self.origin),
        )
    }

    /// Closes the document, cancelling any active stroke.
    pub fn close(mut self) {
        if self.annotator.abort(&mut self.surface) {
            log::warn!("closed document with an active stroke");
        }
        log::info!(
            "closed document ({} views, {} unclaimed undo records)",
            self.surface.consumer_count(),
            self.undo_records.len()
        );
    }
}

impl<T: GpuSample> VolumeDocument<T> {
    /// Registers a wgpu texture view on `context`.
    pub fn add_gpu_view(&mut self, context: Arc<GpuContext>) -> Result<usize> {
        let view = GpuSurface::<T>::new(context, &self.layout, self.surface.components())?;
        self.add_view(Box::new(view))
    }
}
