//! The editable atlas: one CPU copy, N render surfaces, one shared edit queue.
//!
//! Writes never touch a surface directly. They land in the CPU copy (when
//! nothing is registered) or in the pending queue, and each consumer catches
//! up in its own [`SurfaceSync::render`] call. The queue is drained once every
//! consumer has drawn it; from then on the surfaces are ahead of the CPU copy
//! and the next [`SurfaceSync::get_atlas`] reads back from consumer 0.

use glam::IVec3;
use voxatlas_core::{
    AtlasError, AtlasLayout, AtlasRegion, AxisMirror, PackedAtlas, Result, Sample, SliceCodec,
    Texel, ViewAxis, VoxelEdit,
};

use crate::consumer::{ConsumerStats, RenderConsumer};
use crate::error::RenderResult;
use crate::surface::RenderSurface;

/// Index of the consumer read back when the CPU copy is stale.
pub const PULL_CONSUMER: usize = 0;

/// One queued write, in atlas space.
#[derive(Debug, Clone, PartialEq)]
pub enum PendingWrite<T: Sample> {
    /// A single voxel. Always inside the volume.
    Point(VoxelEdit<T>),
    /// A rectangle of texels, e.g. one strip of a slice write.
    Region { region: AtlasRegion, texels: Vec<T> },
}

impl<T: Sample> PendingWrite<T> {
    fn apply(&self, atlas: &mut PackedAtlas<T>) -> Result<()> {
        match self {
            Self::Point(edit) => {
                atlas.set_texel(edit.position, edit.value);
                Ok(())
            }
            Self::Region { region, texels } => atlas.write_region(*region, texels),
        }
    }
}

/// A position in the pending queue, used to discard a stroke's edits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EditMark {
    epoch: u64,
    len: usize,
}

/// What a single [`SurfaceSync::render`] call did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderOutcome {
    /// The whole CPU atlas was blitted.
    pub full_push: bool,
    /// Number of point edits drawn.
    pub points_drawn: usize,
    /// Number of region writes issued.
    pub regions_written: usize,
    /// This call was the last consumer to catch up and the queue was drained.
    pub queue_cleared: bool,
}

/// Keeps a CPU atlas and any number of render surfaces coherent.
pub struct SurfaceSync<T: Sample> {
    layout: AtlasLayout,
    components: u32,
    mirror: AxisMirror,
    loaded: bool,
    cpu_atlas: Option<PackedAtlas<T>>,
    consumers: Vec<RenderConsumer<T>>,
    pending: Vec<PendingWrite<T>>,
    /// Leading queue entries already applied to the CPU copy.
    overlay_applied: usize,
    /// Bumped whenever the queue is drained or replaced.
    epoch: u64,
    cpu_stale: bool,
    slices: SliceCodec<T>,
}

impl<T: Sample> SurfaceSync<T> {
    /// Creates an empty sync with no atlas loaded.
    pub fn new(layout: AtlasLayout, components: u32) -> Result<Self> {
        if !(1..=4).contains(&components) {
            return Err(AtlasError::InvalidComponents(components));
        }
        Ok(Self {
            layout,
            components,
            mirror: AxisMirror::NONE,
            loaded: false,
            cpu_atlas: None,
            consumers: Vec::new(),
            pending: Vec::new(),
            overlay_applied: 0,
            epoch: 0,
            cpu_stale: false,
            slices: SliceCodec::new(layout),
        })
    }

    /// Creates a sync owning `atlas` as its CPU copy.
    pub fn from_atlas(atlas: PackedAtlas<T>) -> Self {
        let layout = *atlas.layout();
        Self {
            layout,
            components: atlas.components(),
            mirror: atlas.mirror(),
            loaded: true,
            cpu_atlas: Some(atlas),
            consumers: Vec::new(),
            pending: Vec::new(),
            overlay_applied: 0,
            epoch: 0,
            cpu_stale: false,
            slices: SliceCodec::new(layout),
        }
    }

    pub fn layout(&self) -> &AtlasLayout {
        &self.layout
    }

    pub fn components(&self) -> u32 {
        self.components
    }

    /// Returns whether an atlas has ever been set.
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// Returns whether the CPU copy is resident.
    pub fn has_cpu_copy(&self) -> bool {
        self.cpu_atlas.is_some()
    }

    /// Returns whether the surfaces hold edits the CPU copy has not read back.
    pub fn is_cpu_stale(&self) -> bool {
        self.cpu_stale
    }

    pub fn pending_edits(&self) -> &[PendingWrite<T>] {
        &self.pending
    }

    pub fn consumer_count(&self) -> usize {
        self.consumers.len()
    }

    pub fn consumer(&self, index: usize) -> Option<&RenderConsumer<T>> {
        self.consumers.get(index)
    }

    /// Returns operation counts for a consumer.
    pub fn consumer_stats(&self, index: usize) -> Option<ConsumerStats> {
        self.consumers.get(index).map(RenderConsumer::stats)
    }

    /// Enables or disables the orthogonal slice read cache.
    pub fn set_slice_cache(&mut self, enabled: bool) {
        self.slices.set_cache_enabled(enabled);
    }

    /// Returns whether `(axis, index)` would be served from the slice cache.
    pub fn is_slice_cached(&self, axis: ViewAxis, index: u32) -> bool {
        self.slices.is_cached(axis, index)
    }

    /// Registers a render surface and returns its consumer index.
    ///
    /// A surface added after an atlas exists starts with a full push pending,
    /// and must draw any edits already queued before the queue can drain.
    pub fn add_consumer(&mut self, surface: Box<dyn RenderSurface<T>>) -> Result<usize> {
        let size = surface.size();
        if size != self.layout.atlas_size() || surface.components() != self.components {
            return Err(AtlasError::SizeMismatch {
                expected: self.layout.pixel_count() * self.components as usize,
                actual: size.x as usize * size.y as usize * surface.components() as usize,
            });
        }
        let index = self.consumers.len();
        self.consumers.push(RenderConsumer::new(
            surface,
            self.loaded,
            self.pending.is_empty(),
        ));
        log::debug!("registered render consumer {index}");
        Ok(index)
    }

    /// Replaces the CPU atlas wholesale.
    ///
    /// The queue is dropped and every consumer is scheduled for a full push.
    pub fn set_atlas(&mut self, atlas: PackedAtlas<T>) -> Result<()> {
        if *atlas.layout() != self.layout || atlas.components() != self.components {
            return Err(AtlasError::SizeMismatch {
                expected: self.layout.pixel_count() * self.components as usize,
                actual: atlas.data().len(),
            });
        }
        self.mirror = atlas.mirror();
        self.cpu_atlas = Some(atlas);
        self.loaded = true;
        self.pending.clear();
        self.overlay_applied = 0;
        self.epoch += 1;
        self.cpu_stale = false;
        for consumer in &mut self.consumers {
            consumer.has_full_push_pending = true;
            consumer.has_rendered_pending_edits = true;
        }
        self.slices.invalidate();
        log::debug!(
            "atlas replaced; full push pending for {} consumers",
            self.consumers.len()
        );
        Ok(())
    }

    /// Writes one voxel. Returns `false` if it lies outside the volume.
    pub fn set_voxel(&mut self, position: IVec3, value: Texel<T>) -> bool {
        self.set_voxels(&[VoxelEdit::new(position, value)]) == 1
    }

    /// Writes a batch of voxels in order and returns how many were inside
    /// the volume. Out-of-volume edits are dropped silently.
    pub fn set_voxels(&mut self, edits: &[VoxelEdit<T>]) -> usize {
        if !self.loaded {
            log::warn!("dropping {} voxel edits: no atlas loaded", edits.len());
            return 0;
        }
        let accepted = if self.consumers.is_empty() {
            match self.cpu_atlas.as_mut() {
                Some(atlas) => atlas.apply_edits(edits),
                None => 0,
            }
        } else {
            let layout = self.layout;
            let before = self.pending.len();
            self.pending.extend(
                edits
                    .iter()
                    .filter(|edit| layout.contains(edit.position))
                    .copied()
                    .map(PendingWrite::Point),
            );
            let accepted = self.pending.len() - before;
            if accepted > 0 {
                self.mark_unrendered();
            }
            accepted
        };
        if accepted > 0 {
            self.slices.invalidate();
        }
        accepted
    }

    fn mark_unrendered(&mut self) {
        for consumer in &mut self.consumers {
            consumer.has_rendered_pending_edits = false;
        }
    }

    /// Brings one consumer up to date: a full push if one is pending, then
    /// every queued write it has not drawn yet.
    pub fn render(&mut self, index: usize) -> Result<RenderOutcome> {
        if index >= self.consumers.len() {
            return Err(AtlasError::UnknownConsumer(index));
        }
        let mut outcome = RenderOutcome::default();

        if self.consumers[index].has_full_push_pending {
            self.sync()?;
            let atlas = self.cpu_atlas.as_ref().ok_or(AtlasError::NoAtlasAvailable)?;
            let consumer = &mut self.consumers[index];
            consumer.surface.blit(atlas)?;
            consumer.has_full_push_pending = false;
            consumer.stats.full_pushes += 1;
            outcome.full_push = true;
            log::debug!("full atlas push to consumer {index}");
        }

        let consumer = &mut self.consumers[index];
        if !self.pending.is_empty() && !consumer.has_rendered_pending_edits {
            let (points, regions) = draw_pending(consumer, &self.layout, &self.pending)?;
            consumer.has_rendered_pending_edits = true;
            outcome.points_drawn = points;
            outcome.regions_written = regions;
            log::trace!("consumer {index} drew {points} points and {regions} regions");
        }

        if !self.pending.is_empty()
            && self
                .consumers
                .iter()
                .all(RenderConsumer::has_rendered_pending_edits)
        {
            let drained = self.pending.len();
            self.pending.clear();
            self.overlay_applied = 0;
            self.epoch += 1;
            self.cpu_stale = true;
            outcome.queue_cleared = true;
            log::debug!("all consumers drew {drained} queued writes; CPU atlas is stale");
        }
        Ok(outcome)
    }

    /// Renders every consumer in index order.
    pub fn render_all(&mut self) -> Result<Vec<RenderOutcome>> {
        (0..self.consumers.len()).map(|i| self.render(i)).collect()
    }

    /// Makes the CPU copy current and returns it.
    ///
    /// Reads back from consumer 0 when the surfaces are ahead of the CPU
    /// copy; this is the only blocking call. Queued writes are then applied
    /// on top, so the result reflects every accepted edit.
    pub fn get_atlas(&mut self) -> Result<&PackedAtlas<T>> {
        self.sync().map(|atlas| &*atlas)
    }

    fn sync(&mut self) -> Result<&mut PackedAtlas<T>> {
        if !self.loaded {
            return Err(AtlasError::NoAtlasAvailable);
        }
        if self.cpu_stale || self.cpu_atlas.is_none() {
            self.read_back()?;
        }
        let atlas = self.cpu_atlas.as_mut().ok_or(AtlasError::NoAtlasAvailable)?;
        for write in &self.pending[self.overlay_applied..] {
            write.apply(atlas)?;
        }
        self.overlay_applied = self.pending.len();
        Ok(atlas)
    }

    fn read_back(&mut self) -> Result<()> {
        let consumer = self
            .consumers
            .get_mut(PULL_CONSUMER)
            .ok_or(AtlasError::NoAtlasAvailable)?;
        if consumer.has_full_push_pending {
            log::warn!("read-back requested before consumer {PULL_CONSUMER} received the atlas");
            return Err(AtlasError::NoAtlasAvailable);
        }
        let data = consumer.surface.read_pixels()?;
        consumer.stats.read_backs += 1;
        match self.cpu_atlas.as_mut() {
            Some(atlas) => atlas.replace_data(data)?,
            None => {
                self.cpu_atlas = Some(PackedAtlas::from_raw(
                    self.layout,
                    self.components,
                    self.mirror,
                    data,
                )?);
            }
        }
        self.cpu_stale = false;
        self.overlay_applied = 0;
        self.slices.invalidate();
        log::debug!("read back atlas from consumer {PULL_CONSUMER}");
        Ok(())
    }

    /// Drops the CPU copy, leaving the surfaces authoritative.
    ///
    /// Refused (returns `false`) when there is no consumer to read back from
    /// or a consumer has not yet received the atlas.
    pub fn release_cpu_copy(&mut self) -> bool {
        if self.consumers.is_empty()
            || self
                .consumers
                .iter()
                .any(RenderConsumer::has_full_push_pending)
        {
            return false;
        }
        if self.cpu_atlas.take().is_some() {
            log::debug!("released CPU atlas copy");
        }
        self.overlay_applied = 0;
        self.slices.invalidate();
        true
    }

    /// Reads one voxel. `None` outside the volume.
    pub fn voxel(&mut self, position: IVec3) -> Result<Option<Texel<T>>> {
        Ok(self.sync()?.texel(position))
    }

    /// Reads slice `index` along `axis`.
    pub fn get_slice(&mut self, axis: ViewAxis, index: u32) -> Result<Vec<T>> {
        self.sync()?;
        let atlas = self.cpu_atlas.as_ref().ok_or(AtlasError::NoAtlasAvailable)?;
        self.slices.read(atlas, axis, index)
    }

    /// Writes slice `index` along `axis`; `None` clears it to zero.
    ///
    /// The CPU copy is updated immediately and each touched atlas region is
    /// queued for the consumers.
    pub fn set_slice(&mut self, axis: ViewAxis, index: u32, data: Option<&[T]>) -> Result<()> {
        self.sync()?;
        let atlas = self.cpu_atlas.as_mut().ok_or(AtlasError::NoAtlasAvailable)?;
        self.slices.write(atlas, axis, index, data)?;
        if !self.consumers.is_empty() {
            for region in self.slices.write_regions(axis, index) {
                let texels = atlas.read_region(region);
                self.pending.push(PendingWrite::Region { region, texels });
            }
            self.overlay_applied = self.pending.len();
            self.mark_unrendered();
        }
        log::debug!("wrote {axis} slice {index}");
        Ok(())
    }

    /// Marks the current end of the queue.
    pub fn edit_mark(&self) -> EditMark {
        EditMark {
            epoch: self.epoch,
            len: self.pending.len(),
        }
    }

    /// Drops writes queued after `mark` and returns how many were dropped.
    ///
    /// Nothing is dropped if the queue has been drained or replaced since
    /// the mark was taken. Only the queue is touched: callers that need the
    /// edits undone must write the affected region back themselves, since a
    /// consumer may already have drawn them or the CPU copy may already
    /// hold them. `Annotator::abort` restores its slice this way.
    pub fn discard_edits_since(&mut self, mark: EditMark) -> usize {
        if mark.epoch != self.epoch || mark.len > self.pending.len() {
            return 0;
        }
        let discarded = self.pending.len() - mark.len;
        self.pending.truncate(mark.len);
        self.overlay_applied = self.overlay_applied.min(mark.len);
        if self.pending.is_empty() {
            for consumer in &mut self.consumers {
                consumer.has_rendered_pending_edits = true;
            }
        }
        if discarded > 0 {
            self.slices.invalidate();
            log::debug!("discarded {discarded} queued writes");
        }
        discarded
    }
}

/// Issues queued writes to one surface in order, batching runs of points.
fn draw_pending<T: Sample>(
    consumer: &mut RenderConsumer<T>,
    layout: &AtlasLayout,
    pending: &[PendingWrite<T>],
) -> RenderResult<(usize, usize)> {
    let mut batch = Vec::new();
    let mut points = 0;
    let mut regions = 0;
    for write in pending {
        match write {
            PendingWrite::Point(edit) => batch.push(*edit),
            PendingWrite::Region { region, texels } => {
                points += flush_points(consumer, layout, &mut batch)?;
                consumer.surface.write_region(*region, texels)?;
                consumer.stats.regions_written += 1;
                regions += 1;
            }
        }
    }
    points += flush_points(consumer, layout, &mut batch)?;
    Ok((points, regions))
}

fn flush_points<T: Sample>(
    consumer: &mut RenderConsumer<T>,
    layout: &AtlasLayout,
    batch: &mut Vec<VoxelEdit<T>>,
) -> RenderResult<usize> {
    if batch.is_empty() {
        return Ok(0);
    }
    consumer.surface.draw_points(layout, batch)?;
    consumer.stats.point_batches += 1;
    consumer.stats.points_drawn += batch.len();
    let drawn = batch.len();
    batch.clear();
    Ok(drawn)
}
