//! A single streamed grid cell.
//!
//! Slot lifecycle: `Empty → Dirty → Clean`, `Clean → Dirty` on re-request and
//! `Dirty → Dirty` when a newer request supersedes a pending one.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use glam::Vec2;
use orbis_common::{ChunkCoord, IdAllocator, ObjectId, Rect, TaskId};

use crate::content::{BlockMatrix, ContentBundle, PlacedObject};
use crate::factory::ObjectFactory;
use crate::partition::PartitionSet;
use crate::pool::CancelToken;

/// Shared view of one coordinate's dirty flag, for loading screens and HUDs.
///
/// A handle reads dirty for good once its coordinate leaves the window.
#[derive(Debug, Clone)]
pub struct DirtyFlag(Arc<AtomicBool>);

impl DirtyFlag {
    fn new(dirty: bool) -> Self {
        Self(Arc::new(AtomicBool::new(dirty)))
    }

    /// Returns true while the slot's content is not installed.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    fn set(&self, dirty: bool) {
        self.0.store(dirty, Ordering::Release);
    }
}

/// Loading state of a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    /// Never requested since it was created or repositioned
    Empty,
    /// Waiting for content (or stuck after a failed generation)
    Dirty,
    /// Content installed
    Clean,
}

/// Result of offering a generation result to a chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallOutcome {
    /// Content replaced
    Installed,
    /// The result belongs to a superseded or cancelled task
    Stale,
}

/// Result of moving an object inside a chunk.
#[derive(Debug, Clone, PartialEq)]
pub enum MoveOutcome {
    /// Object stayed in this chunk
    Moved,
    /// Object left the chunk and was removed from it
    Left(PlacedObject),
    /// No object with that id
    NotFound,
}

/// One cell of the chunk grid.
#[derive(Debug)]
pub struct Chunk {
    coord: ChunkCoord,
    extent: u32,
    state: SlotState,
    dirty: DirtyFlag,
    pending: Option<CancelToken>,
    objects: Vec<PlacedObject>,
    blocks: Option<BlockMatrix>,
    source: Option<Arc<ContentBundle>>,
    partitions: PartitionSet,
    reach: Vec2,
}

impl Chunk {
    /// Creates an empty chunk at `coord`.
    #[must_use]
    pub fn new(coord: ChunkCoord, extent: u32, partitions_per_side: u32) -> Self {
        Self {
            coord,
            extent,
            state: SlotState::Empty,
            dirty: DirtyFlag::new(true),
            pending: None,
            objects: Vec::new(),
            blocks: None,
            source: None,
            partitions: PartitionSet::new(extent, partitions_per_side),
            reach: Vec2::ZERO,
        }
    }

    /// Returns the chunk coordinate.
    #[must_use]
    pub const fn coord(&self) -> ChunkCoord {
        self.coord
    }

    /// Returns the chunk extent.
    #[must_use]
    pub const fn extent(&self) -> u32 {
        self.extent
    }

    /// World-space top-left corner.
    #[must_use]
    pub fn position(&self) -> Vec2 {
        self.coord.origin(self.extent)
    }

    /// World-space bounds.
    #[must_use]
    pub fn bounds(&self) -> Rect {
        let origin = self.position();
        Rect::new(origin.x, origin.y, self.extent as f32, self.extent as f32)
    }

    /// Largest half-size of any object, per axis.
    #[must_use]
    pub const fn reach(&self) -> Vec2 {
        self.reach
    }

    /// Bounds grown by [`Self::reach`]: every object footprint lies inside.
    #[must_use]
    pub fn reach_bounds(&self) -> Rect {
        self.bounds().expanded(self.reach)
    }

    /// Current loading state.
    #[must_use]
    pub const fn state(&self) -> SlotState {
        self.state
    }

    /// Returns whether the chunk is waiting for content.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.state != SlotState::Clean
    }

    /// Shared handle to the dirty flag.
    #[must_use]
    pub fn dirty_flag(&self) -> DirtyFlag {
        self.dirty.clone()
    }

    /// Task the chunk is waiting for, if any.
    #[must_use]
    pub fn pending_task(&self) -> Option<TaskId> {
        self.pending.as_ref().map(CancelToken::task)
    }

    /// Installed objects.
    #[must_use]
    pub fn objects(&self) -> &[PlacedObject] {
        &self.objects
    }

    /// Installed block matrix (terrain scale only).
    #[must_use]
    pub const fn blocks(&self) -> Option<&BlockMatrix> {
        self.blocks.as_ref()
    }

    /// The bundle the current content was built from.
    #[must_use]
    pub fn source(&self) -> Option<&Arc<ContentBundle>> {
        self.source.as_ref()
    }

    /// Render partitions.
    #[must_use]
    pub const fn partitions(&self) -> &PartitionSet {
        &self.partitions
    }

    fn set_state(&mut self, state: SlotState) {
        self.state = state;
        self.dirty.set(state != SlotState::Clean);
    }

    /// Cancels the pending task, if any. Returns true if one was cancelled.
    pub fn cancel_pending(&mut self) -> bool {
        match self.pending.take() {
            Some(token) => {
                token.cancel();
                true
            },
            None => false,
        }
    }

    /// Starts waiting for `token`, cancelling whatever was pending before.
    ///
    /// Installed content stays visible to readers until the new result lands
    /// but the slot is dirty again. Returns true if an older task was
    /// cancelled.
    pub fn begin_request(&mut self, token: CancelToken) -> bool {
        let superseded = self.cancel_pending();
        self.pending = Some(token);
        self.set_state(SlotState::Dirty);
        superseded
    }

    /// Moves the chunk to a new coordinate, dropping its content and
    /// cancelling any pending task. Buffers are kept for reuse.
    /// Handles taken for the old coordinate stay dirty.
    pub fn reposition(&mut self, coord: ChunkCoord) {
        self.cancel_pending();
        self.dirty.set(true);
        self.dirty = DirtyFlag::new(true);
        self.coord = coord;
        self.objects.clear();
        self.blocks = None;
        self.source = None;
        self.partitions.clear();
        self.reach = Vec2::ZERO;
        self.set_state(SlotState::Empty);
    }

    /// Installs a generation result if `task` is the one this chunk waits for.
    pub fn install(
        &mut self,
        task: TaskId,
        bundle: Arc<ContentBundle>,
        factory: &dyn ObjectFactory,
        ids: &IdAllocator,
    ) -> InstallOutcome {
        if self.pending_task() != Some(task) {
            return InstallOutcome::Stale;
        }
        self.pending = None;
        self.apply(bundle, factory, ids);
        InstallOutcome::Installed
    }

    /// Installs content copied from another chunk with the same generation
    /// coordinate, bypassing generation.
    pub fn install_copy(&mut self, bundle: Arc<ContentBundle>, factory: &dyn ObjectFactory, ids: &IdAllocator) {
        self.cancel_pending();
        self.apply(bundle, factory, ids);
    }

    /// Records a failed generation for `task`. The chunk stays dirty.
    /// Returns false if `task` was not the pending one.
    pub fn fail(&mut self, task: TaskId) -> bool {
        if self.pending_task() != Some(task) {
            return false;
        }
        self.pending = None;
        self.set_state(SlotState::Dirty);
        true
    }

    fn apply(&mut self, bundle: Arc<ContentBundle>, factory: &dyn ObjectFactory, ids: &IdAllocator) {
        let origin = self.position();
        self.objects.clear();
        self.objects.extend(
            bundle
                .placements
                .iter()
                .filter_map(|placement| factory.instantiate(placement, origin, ids)),
        );
        self.blocks.clone_from(&bundle.blocks);
        self.source = Some(bundle);
        self.rebuild_partitions();
        self.set_state(SlotState::Clean);
    }

    fn rebuild_partitions(&mut self) {
        let origin = self.position();
        self.partitions
            .rebuild(self.objects.iter().map(|object| object.position - origin));
        self.reach = self
            .objects
            .iter()
            .fold(Vec2::ZERO, |reach, object| reach.max(object.size * 0.5));
    }

    /// Adds an object handed over from another chunk.
    pub fn adopt(&mut self, object: PlacedObject) {
        let local = object.position - self.position();
        self.reach = self.reach.max(object.size * 0.5);
        self.objects.push(object);
        self.partitions.insert(self.objects.len() - 1, local);
    }

    /// Moves an object to a new world position.
    pub fn move_object(&mut self, id: ObjectId, to: Vec2) -> MoveOutcome {
        let Some(index) = self.objects.iter().position(|o| o.id == id) else {
            return MoveOutcome::NotFound;
        };
        let origin = self.position();

        if !self.bounds().contains_point(to) {
            let mut object = self.objects.swap_remove(index);
            object.translate(to - object.position);
            self.rebuild_partitions();
            return MoveOutcome::Left(object);
        }

        let from = self.objects[index].position;
        self.objects[index].translate(to - from);
        self.partitions.relocate(index, from - origin, to - origin);
        MoveOutcome::Moved
    }

    /// Calls `f` for each object whose bounds intersect `view` (world
    /// space). Partitions farther than [`Self::reach`] from the view are
    /// skipped wholesale.
    pub fn visit_visible<F>(&self, view: &Rect, mut f: F)
    where
        F: FnMut(&PlacedObject),
    {
        let local_view = view.translated(-self.position()).expanded(self.reach);
        for index in self.partitions.members_overlapping(&local_view) {
            if let Some(object) = self.objects.get(index) {
                if object.bounds().intersects(view) {
                    f(object);
                }
            }
        }
    }

    /// Read-only view for renderers and physics.
    #[must_use]
    pub fn view(&self) -> ChunkView<'_> {
        ChunkView { chunk: self }
    }
}

impl Drop for Chunk {
    fn drop(&mut self) {
        self.cancel_pending();
        self.dirty.set(true);
    }
}

/// Read-only access to one slot.
#[derive(Debug, Clone, Copy)]
pub struct ChunkView<'a> {
    chunk: &'a Chunk,
}

impl<'a> ChunkView<'a> {
    /// Chunk coordinate.
    #[must_use]
    pub fn coord(&self) -> ChunkCoord {
        self.chunk.coord
    }

    /// World-space top-left corner.
    #[must_use]
    pub fn position(&self) -> Vec2 {
        self.chunk.position()
    }

    /// Whether content is still missing.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.chunk.is_dirty()
    }

    /// Loading state.
    #[must_use]
    pub fn state(&self) -> SlotState {
        self.chunk.state
    }

    /// Installed objects.
    #[must_use]
    pub fn objects(&self) -> &'a [PlacedObject] {
        &self.chunk.objects
    }

    /// Installed block matrix.
    #[must_use]
    pub fn blocks(&self) -> Option<&'a BlockMatrix> {
        self.chunk.blocks.as_ref()
    }

    /// Render partitions.
    #[must_use]
    pub fn partitions(&self) -> &'a PartitionSet {
        &self.chunk.partitions
    }
}
