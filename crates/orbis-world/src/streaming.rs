//! Streaming controller: moves the chunk window and installs finished results.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use glam::Vec2;
use orbis_common::{ChunkCoord, IdAllocator, ObjectId, Rect, WorldError, WorldResult};
use tracing::{debug, error, info, warn};

use crate::chunk::{ChunkView, DirtyFlag, InstallOutcome, MoveOutcome};
use crate::config::StreamingConfig;
use crate::content::PlacedObject;
use crate::factory::ObjectFactory;
use crate::generation::ProceduralGenerator;
use crate::grid::{ChunkGrid, SlotIndex};
use crate::pool::{PoolStats, Submission, WorkerPool};
use crate::provider::{ChunkDataProvider, GenerationReport};

/// Streaming counters for HUDs and logs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamingStats {
    /// Generation requests issued
    pub requested: u64,
    /// Requests that ran inline on the interactive thread
    pub inline: u64,
    /// Pending requests cancelled by a newer request or a shift
    pub superseded: u64,
    /// Results installed
    pub installed: u64,
    /// Results dropped as stale
    pub stale: u64,
    /// Failed generations
    pub failed: u64,
    /// Slots filled by copying a wrapped twin instead of generating
    pub copied: u64,
}

/// Results of one [`StreamingController::pump`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PumpReport {
    /// Results installed
    pub installed: usize,
    /// Results dropped as stale
    pub stale: usize,
    /// Failed generations
    pub failed: usize,
}

impl PumpReport {
    /// Total reports drained.
    #[must_use]
    pub const fn total(&self) -> usize {
        self.installed + self.stale + self.failed
    }
}

/// Where a moved object ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectMove {
    /// Stayed in its chunk
    Moved,
    /// Handed to the chunk in another slot
    Handed {
        /// Slot it left
        from: SlotIndex,
        /// Slot it joined
        to: SlotIndex,
    },
    /// Left the window and was dropped
    Dropped,
    /// No chunk holds the object
    NotFound,
}

/// Streams one scale (universe or planet) around a moving viewer.
pub struct StreamingController {
    config: StreamingConfig,
    grid: ChunkGrid,
    provider: ChunkDataProvider,
    factory: Arc<dyn ObjectFactory>,
    ids: Arc<IdAllocator>,
    results_tx: Sender<GenerationReport>,
    results_rx: Receiver<GenerationReport>,
    stats: StreamingStats,
}

impl std::fmt::Debug for StreamingController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamingController")
            .field("config", &self.config)
            .field("center", &self.grid.center())
            .field("provider", &self.provider)
            .field("stats", &self.stats)
            .finish()
    }
}

impl StreamingController {
    /// Creates a controller centred on `center` and requests every slot.
    pub fn new(
        config: StreamingConfig,
        generator: Arc<dyn ProceduralGenerator>,
        factory: Arc<dyn ObjectFactory>,
        ids: Arc<IdAllocator>,
        seed: u64,
        center: ChunkCoord,
    ) -> WorldResult<Self> {
        config.validate()?;

        let pool = WorkerPool::new(config.resolved_worker_threads(), config.queue_capacity);
        let grid = ChunkGrid::centered(
            config.cols,
            config.rows,
            config.extent,
            config.partitions_per_side,
            center,
        )?;
        info!(
            "Streaming {}x{} chunks of {} around {center} with {} ({} workers)",
            config.cols,
            config.rows,
            config.extent,
            generator.name(),
            pool.threads()
        );

        if config.planet_width_chunks != generator.wrap_width() {
            warn!(
                "Grid planet width {:?} differs from {} wrap width {:?}, wrapped slots are generated",
                config.planet_width_chunks,
                generator.name(),
                generator.wrap_width()
            );
        }

        let (results_tx, results_rx) = crossbeam_channel::unbounded();
        let mut controller = Self {
            config,
            grid,
            provider: ChunkDataProvider::new(generator, pool, seed),
            factory,
            ids,
            results_tx,
            results_rx,
            stats: StreamingStats::default(),
        };
        controller.request_all();
        Ok(controller)
    }

    /// Configuration in use.
    #[must_use]
    pub const fn config(&self) -> &StreamingConfig {
        &self.config
    }

    /// The chunk window.
    #[must_use]
    pub const fn grid(&self) -> &ChunkGrid {
        &self.grid
    }

    /// Id allocator shared with this world.
    #[must_use]
    pub fn ids(&self) -> &Arc<IdAllocator> {
        &self.ids
    }

    /// Streaming counters.
    #[must_use]
    pub const fn stats(&self) -> StreamingStats {
        self.stats
    }

    /// Worker pool counters.
    #[must_use]
    pub fn pool_stats(&self) -> PoolStats {
        self.provider.pool_stats()
    }

    /// Name of the current generator.
    #[must_use]
    pub fn generator_name(&self) -> String {
        self.provider.generator_name()
    }

    /// Centre chunk of the window.
    #[must_use]
    pub fn center(&self) -> ChunkCoord {
        self.grid.center()
    }

    /// Share of clean slots, for the loading gate.
    #[must_use]
    pub fn fraction_clean(&self) -> f32 {
        self.grid.fraction_clean()
    }

    /// (Re)requests the chunk at `coord`, cancelling any pending request for
    /// it, and returns its dirty flag.
    pub fn request_chunk(&mut self, coord: ChunkCoord) -> WorldResult<DirtyFlag> {
        let slot = self.grid.slot_for(coord).ok_or(WorldError::CoordOutsideWindow {
            x: coord.x,
            y: coord.y,
        })?;
        self.request_slot(slot);
        self.grid
            .get(slot)
            .map(|chunk| chunk.dirty_flag())
            .ok_or(WorldError::SlotOutOfRange {
                col: slot.col,
                row: slot.row,
            })
    }

    /// Read-only view of slot `(col, row)`.
    pub fn get_slot(&self, col: usize, row: usize) -> WorldResult<ChunkView<'_>> {
        self.grid
            .get(SlotIndex::new(col, row))
            .map(|chunk| chunk.view())
            .ok_or(WorldError::SlotOutOfRange { col, row })
    }

    /// Moves the window by whole chunks and requests the exposed slots.
    pub fn shift(&mut self, dx: i32, dy: i32) -> Vec<SlotIndex> {
        let exposed = self.grid.shift(dx, dy);
        if !exposed.is_empty() {
            debug!("Shifted by ({dx}, {dy}), {} slots exposed", exposed.len());
        }
        self.fill(&exposed);
        exposed
    }

    /// Keeps the window centred on a viewer at world position `viewer`.
    /// Movement inside the centre chunk does nothing.
    pub fn track(&mut self, viewer: Vec2) -> Vec<SlotIndex> {
        let target = ChunkGrid::chunk_at(viewer, self.config.extent);
        let exposed = self.grid.recenter(target);
        if !exposed.is_empty() {
            debug!("Recentred on {target}, {} slots exposed", exposed.len());
        }
        self.fill(&exposed);
        exposed
    }

    /// Resizes the window around its centre. Only new slots are requested.
    pub fn resize(&mut self, cols: usize, rows: usize) -> WorldResult<Vec<SlotIndex>> {
        let exposed = self.grid.resize(cols, rows)?;
        self.config.cols = cols;
        self.config.rows = rows;
        self.fill(&exposed);
        Ok(exposed)
    }

    /// Swaps the generator and re-requests every slot.
    pub fn set_generator(&mut self, generator: Arc<dyn ProceduralGenerator>) {
        info!("Generator changed to {}", generator.name());
        self.provider.set_generator(generator);
        self.request_all();
    }

    fn request_all(&mut self) {
        for slot in self.grid.slots_by_distance() {
            self.request_slot(slot);
        }
    }

    fn fill(&mut self, exposed: &[SlotIndex]) {
        for &slot in exposed {
            if !self.copy_twin(slot) {
                self.request_slot(slot);
            }
        }
    }

    fn request_slot(&mut self, slot: SlotIndex) {
        let coord = self.grid.slot_coord(slot);
        let tx = self.results_tx.clone();
        let (token, submission) = self.provider.request(coord, move |report| {
            // The receiver lives as long as the controller.
            let _ = tx.send(report);
        });

        self.stats.requested += 1;
        if submission == Submission::Inline {
            self.stats.inline += 1;
        }
        if let Some(chunk) = self.grid.get_mut(slot) {
            if chunk.begin_request(token) {
                self.stats.superseded += 1;
            }
        }
    }

    /// When the generator wraps X, fills `slot` from a clean slot that
    /// generates the same content. Returns false if there is no such slot.
    fn copy_twin(&mut self, slot: SlotIndex) -> bool {
        let Some(width) = self.provider.wrap_width() else {
            return false;
        };
        let target = self.grid.slot_coord(slot).wrap_x(width);
        let source = self.grid.iter().find_map(|(other, chunk)| {
            (other != slot && !chunk.is_dirty() && chunk.coord().wrap_x(width) == target)
                .then(|| chunk.source().cloned())
                .flatten()
        });
        let Some(source) = source else {
            return false;
        };
        let Some(chunk) = self.grid.get_mut(slot) else {
            return false;
        };
        chunk.install_copy(source, self.factory.as_ref(), &self.ids);
        self.stats.copied += 1;
        debug!("Copied wrapped twin into {}", chunk.coord());
        true
    }

    /// Installs every finished result waiting in the channel. Call once per
    /// tick on the interactive thread.
    pub fn pump(&mut self) -> PumpReport {
        let mut report = PumpReport::default();
        while let Ok(result) = self.results_rx.try_recv() {
            self.apply(result, &mut report);
        }
        report
    }

    /// Pumps until every slot is clean or `timeout` elapses. Returns true if
    /// the grid is fully clean.
    pub fn pump_until_clean(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut report = PumpReport::default();
        while self.grid.fraction_clean() < 1.0 {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.results_rx.recv_timeout(remaining) {
                Ok(result) => self.apply(result, &mut report),
                Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => return false,
            }
        }
        true
    }

    fn apply(&mut self, result: GenerationReport, report: &mut PumpReport) {
        let GenerationReport {
            coord,
            task,
            outcome,
            elapsed,
        } = result;

        let Some(slot) = self.grid.slot_for(coord) else {
            debug!("Dropping result for {coord}, no longer in the window");
            self.stats.stale += 1;
            report.stale += 1;
            return;
        };
        let Some(chunk) = self.grid.get_mut(slot) else {
            return;
        };

        match outcome {
            Ok(bundle) => match chunk.install(task, Arc::new(bundle), self.factory.as_ref(), &self.ids) {
                InstallOutcome::Installed => {
                    debug!(
                        "Installed {coord} in slot {slot} ({} placements, {} objects, {:.1}ms)",
                        chunk.source().map_or(0, |bundle| bundle.placement_count()),
                        chunk.objects().len(),
                        elapsed.as_secs_f64() * 1000.0
                    );
                    self.stats.installed += 1;
                    report.installed += 1;
                },
                InstallOutcome::Stale => {
                    debug!("Dropping stale result for {coord}, task {}", task.raw());
                    self.stats.stale += 1;
                    report.stale += 1;
                },
            },
            Err(e) => {
                if chunk.fail(task) {
                    error!("Generation failed for slot {slot} at {coord}: {}", e.into_world_error(coord));
                    self.stats.failed += 1;
                    report.failed += 1;
                } else {
                    debug!("Ignoring failure of superseded task {} for {coord}", task.raw());
                    self.stats.stale += 1;
                    report.stale += 1;
                }
            },
        }
    }

    /// Calls `f` for every object intersecting `view` in clean chunks.
    /// Returns the number of objects visited.
    pub fn visit_visible<F>(&self, view: &Rect, mut f: F) -> usize
    where
        F: FnMut(&PlacedObject),
    {
        let mut visited = 0;
        for (_, chunk) in self.grid.iter() {
            if chunk.is_dirty() || !chunk.reach_bounds().intersects(view) {
                continue;
            }
            chunk.visit_visible(view, |object| {
                visited += 1;
                f(object);
            });
        }
        visited
    }

    /// Moves object `id` to world position `to`, handing it to another slot
    /// if it crossed a chunk boundary.
    pub fn move_object(&mut self, id: ObjectId, to: Vec2) -> ObjectMove {
        let Some(from) = self
            .grid
            .iter()
            .find(|(_, chunk)| chunk.objects().iter().any(|o| o.id == id))
            .map(|(slot, _)| slot)
        else {
            return ObjectMove::NotFound;
        };

        let outcome = match self.grid.get_mut(from) {
            Some(chunk) => chunk.move_object(id, to),
            None => return ObjectMove::NotFound,
        };
        match outcome {
            MoveOutcome::Moved => ObjectMove::Moved,
            MoveOutcome::NotFound => ObjectMove::NotFound,
            MoveOutcome::Left(object) => {
                let target = self.grid.slot_containing(to);
                match target.and_then(|slot| self.grid.get_mut(slot).map(|chunk| (slot, chunk))) {
                    Some((slot, chunk)) => {
                        chunk.adopt(object);
                        ObjectMove::Handed { from, to: slot }
                    },
                    None => {
                        debug!("Object {} left the window", object.id.raw());
                        ObjectMove::Dropped
                    },
                }
            },
        }
    }
}
