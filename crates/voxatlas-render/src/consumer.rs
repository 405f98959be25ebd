//! Per-surface synchronization state.

use crate::surface::RenderSurface;
use voxatlas_core::Sample;

/// Counts of operations issued against one surface.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConsumerStats {
    /// Full atlas blits.
    pub full_pushes: usize,
    /// Point-draw batches.
    pub point_batches: usize,
    /// Individual points drawn.
    pub points_drawn: usize,
    /// Region writes (slice strips).
    pub regions_written: usize,
    /// Read-backs into the CPU copy.
    pub read_backs: usize,
}

/// A registered render surface and its view of the shared edit queue.
///
/// `has_full_push_pending` means the surface is behind the CPU atlas as a
/// whole. `has_rendered_pending_edits` means the surface has drawn every
/// entry currently in the queue.
pub struct RenderConsumer<T: Sample> {
    pub(crate) surface: Box<dyn RenderSurface<T>>,
    pub(crate) has_full_push_pending: bool,
    pub(crate) has_rendered_pending_edits: bool,
    pub(crate) stats: ConsumerStats,
}

impl<T: Sample> RenderConsumer<T> {
    pub(crate) fn new(
        surface: Box<dyn RenderSurface<T>>,
        has_full_push_pending: bool,
        has_rendered_pending_edits: bool,
    ) -> Self {
        Self {
            surface,
            has_full_push_pending,
            has_rendered_pending_edits,
            stats: ConsumerStats::default(),
        }
    }

    pub fn surface(&self) -> &dyn RenderSurface<T> {
        self.surface.as_ref()
    }

    pub fn has_full_push_pending(&self) -> bool {
        self.has_full_push_pending
    }

    pub fn has_rendered_pending_edits(&self) -> bool {
        self.has_rendered_pending_edits
    }

    pub fn stats(&self) -> ConsumerStats {
        self.stats
    }
}

impl<T: Sample> std::fmt::Debug for RenderConsumer<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderConsumer")
            .field("size", &self.surface.size())
            .field("has_full_push_pending", &self.has_full_push_pending)
            .field("has_rendered_pending_edits", &self.has_rendered_pending_edits)
            .field("stats", &self.stats)
            .finish()
    }
}
