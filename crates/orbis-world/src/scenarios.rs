//! Cross-module streaming scenarios with real worker threads.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use glam::Vec2;
use orbis_common::{ChunkCoord, IdAllocator};

use crate::config::StreamingConfig;
use crate::content::{ContentBundle, Placement};
use crate::factory::TemplateFactory;
use crate::gate::LoadingGate;
use crate::grid::SlotIndex;
use crate::generation::{
    object_types, GenerationError, GenerationResult, ProceduralGenerator, ReadySignal,
    TerrainGenerator, TerrainParams,
};
use crate::streaming::StreamingController;

const TIMEOUT: Duration = Duration::from_secs(10);
const SEED: u64 = 1;

/// One tree per chunk whose local x encodes `marker`.
struct Marker(u32);

impl ProceduralGenerator for Marker {
    fn generate(&self, _coord: ChunkCoord, _seed: u64) -> GenerationResult<ContentBundle> {
        Ok(ContentBundle {
            placements: vec![Placement::new(object_types::TREE, Vec2::new(self.0 as f32 * 10.0, 50.0))],
            blocks: None,
        })
    }

    fn name(&self) -> &str {
        "marker"
    }
}

/// Marker generator that blocks on `hold` for `target` (or every
/// coordinate when `target` is None).
struct Held {
    marker: Marker,
    hold: ReadySignal,
    target: Option<ChunkCoord>,
}

impl ProceduralGenerator for Held {
    fn generate(&self, coord: ChunkCoord, seed: u64) -> GenerationResult<ContentBundle> {
        if self.target.map_or(true, |target| target == coord) {
            self.hold.wait_timeout(TIMEOUT);
        }
        self.marker.generate(coord, seed)
    }

    fn name(&self) -> &str {
        "held"
    }
}

/// Fails for one coordinate.
struct FailsAt(ChunkCoord);

impl ProceduralGenerator for FailsAt {
    fn generate(&self, coord: ChunkCoord, seed: u64) -> GenerationResult<ContentBundle> {
        if coord == self.0 {
            return Err(GenerationError::Failed("heightmap overflow".into()));
        }
        Marker(1).generate(coord, seed)
    }

    fn name(&self) -> &str {
        "fails-at"
    }
}

/// Panics for one coordinate.
struct PanicsAt(ChunkCoord);

impl ProceduralGenerator for PanicsAt {
    fn generate(&self, coord: ChunkCoord, seed: u64) -> GenerationResult<ContentBundle> {
        assert_ne!(coord, self.0, "cave table exhausted");
        Marker(1).generate(coord, seed)
    }

    fn name(&self) -> &str {
        "panics-at"
    }
}

fn config(threads: usize) -> StreamingConfig {
    StreamingConfig {
        cols: 3,
        rows: 3,
        extent: 100,
        blocks_per_side: 10,
        partitions_per_side: 2,
        worker_threads: Some(threads),
        ..StreamingConfig::default()
    }
}

fn terrain() -> Arc<TerrainGenerator> {
    Arc::new(TerrainGenerator::new(TerrainParams {
        extent: 100,
        blocks_per_side: 10,
        ..TerrainParams::default()
    }))
}

fn controller(threads: usize, generator: Arc<dyn ProceduralGenerator>) -> StreamingController {
    StreamingController::new(
        config(threads),
        generator,
        Arc::new(TemplateFactory::standard()),
        Arc::new(IdAllocator::new()),
        SEED,
        ChunkCoord::new(1, 1),
    )
    .expect("controller")
}

/// Waits until the pool has finished or skipped `jobs` jobs.
fn wait_for_jobs(streaming: &StreamingController, jobs: u64) -> bool {
    let deadline = Instant::now() + TIMEOUT;
    while Instant::now() < deadline {
        let stats = streaming.pool_stats();
        if stats.completed + stats.skipped >= jobs {
            return true;
        }
        thread::sleep(Duration::from_millis(1));
    }
    false
}

fn marker_at(streaming: &StreamingController, col: usize, row: usize) -> f32 {
    let view = streaming.get_slot(col, row).expect("slot");
    let object = &view.objects()[0];
    object.position.x - view.position().x
}

mod shift_tests {
    use super::*;

    #[test]
    fn e2e_shift_right_requests_only_the_exposed_column() {
        let mut streaming = controller(2, terrain());
        assert!(streaming.pump_until_clean(TIMEOUT));

        let before: Vec<_> = streaming
            .grid()
            .iter()
            .map(|(_, chunk)| (chunk.coord(), chunk.objects().to_vec(), chunk.blocks().cloned()))
            .collect();
        let requested = streaming.stats().requested;

        let exposed = streaming.shift(1, 0);

        assert_eq!(exposed.len(), 3);
        assert!(exposed.iter().all(|slot| slot.col == 2));
        assert_eq!(streaming.stats().requested - requested, 3);
        let dirty: Vec<_> = streaming
            .grid()
            .iter()
            .filter(|(_, chunk)| chunk.is_dirty())
            .map(|(slot, _)| slot)
            .collect();
        assert_eq!(dirty.len(), 3);
        assert!(dirty.iter().all(|slot| slot.col == 2));

        for (slot, chunk) in streaming.grid().iter().filter(|(slot, _)| slot.col < 2) {
            let old = before
                .iter()
                .find(|(coord, _, _)| *coord == chunk.coord())
                .expect("surviving chunk was in the old window");
            assert_eq!(chunk.objects(), old.1.as_slice(), "objects changed in {slot}");
            assert_eq!(chunk.blocks(), old.2.as_ref(), "blocks changed in {slot}");
        }

        assert!(streaming.pump_until_clean(TIMEOUT));
        assert_eq!(streaming.fraction_clean(), 1.0);

        let generator = terrain();
        for slot in exposed {
            let chunk = streaming.grid().get(slot).expect("slot");
            let direct = generator.generate(chunk.coord(), SEED).expect("generate");
            assert_eq!(chunk.blocks(), direct.blocks.as_ref());
        }
    }

    #[test]
    fn e2e_in_flight_request_follows_its_chunk_on_small_shift() {
        let hold = ReadySignal::new();
        let mut streaming = controller(
            2,
            Arc::new(Held {
                marker: Marker(1),
                hold: hold.clone(),
                target: Some(ChunkCoord::new(1, 1)),
            }),
        );
        assert!(wait_for_jobs(&streaming, 8));
        assert_eq!(streaming.pump().installed, 8);

        streaming.shift(1, 0);
        assert!(wait_for_jobs(&streaming, 11));
        assert_eq!(streaming.pump().installed, 3);
        assert!(streaming.get_slot(0, 1).expect("slot").is_dirty());

        hold.set();
        assert!(streaming.pump_until_clean(TIMEOUT));
        assert_eq!(streaming.get_slot(0, 1).expect("slot").coord(), ChunkCoord::new(1, 1));
        assert_eq!(streaming.stats().stale, 0);
    }
}

mod stale_tests {
    use super::*;

    #[test]
    fn e2e_late_result_never_overwrites_newer_content() {
        let hold = ReadySignal::new();
        let mut streaming = controller(
            2,
            Arc::new(Held {
                marker: Marker(1),
                hold: hold.clone(),
                target: Some(ChunkCoord::new(1, 1)),
            }),
        );

        // Request B for every slot while A for the centre is still running.
        streaming.set_generator(Arc::new(Marker(2)));
        assert!(streaming.pump_until_clean(TIMEOUT));
        assert_eq!(marker_at(&streaming, 1, 1), 20.0);

        hold.set();
        assert!(wait_for_jobs(&streaming, 18));
        streaming.pump();
        assert_eq!(marker_at(&streaming, 1, 1), 20.0);
        assert!((0..3).all(|col| (0..3).all(|row| marker_at(&streaming, col, row) == 20.0)));
    }

    #[test]
    fn e2e_shift_cancels_request_that_left_the_window() {
        let hold = ReadySignal::new();
        let mut streaming = controller(
            2,
            Arc::new(Held {
                marker: Marker(1),
                hold: hold.clone(),
                target: Some(ChunkCoord::new(1, 1)),
            }),
        );
        assert!(wait_for_jobs(&streaming, 8));

        let exposed = streaming.shift(3, 0);
        assert_eq!(exposed.len(), 9);
        assert!(streaming.pump_until_clean(TIMEOUT));
        let center = streaming.get_slot(1, 1).expect("slot");
        assert_eq!(center.coord(), ChunkCoord::new(4, 1));
        let installed = center.objects().to_vec();

        hold.set();
        assert!(wait_for_jobs(&streaming, 18));
        assert_eq!(streaming.pump().total(), 0, "cancelled job must not report");
        assert_eq!(streaming.get_slot(1, 1).expect("slot").objects(), installed.as_slice());
    }

    #[test]
    fn e2e_at_most_one_request_in_flight_per_slot() {
        let hold = ReadySignal::new();
        let mut streaming = controller(
            1,
            Arc::new(Held {
                marker: Marker(1),
                hold: hold.clone(),
                target: None,
            }),
        );

        for _ in 0..5 {
            streaming.request_chunk(ChunkCoord::new(1, 1)).expect("in window");
        }
        assert_eq!(streaming.stats().superseded, 5);
        for (_, chunk) in streaming.grid().iter() {
            assert!(chunk.pending_task().is_some());
        }

        hold.set();
        assert!(wait_for_jobs(&streaming, 14));
        let report = streaming.pump();
        assert_eq!(report.installed, 9);
        assert_eq!(report.stale, 0);
        assert_eq!(streaming.fraction_clean(), 1.0);
    }
}

mod pool_tests {
    use super::*;

    #[test]
    fn e2e_inline_pool_matches_threaded_pool() {
        let mut inline = controller(0, terrain());
        let mut threaded = controller(3, terrain());

        assert_eq!(inline.pool_stats().inline, 9);
        assert!(inline.pump_until_clean(TIMEOUT));
        assert!(threaded.pump_until_clean(TIMEOUT));

        for ((slot, a), (_, b)) in inline.grid().iter().zip(threaded.grid().iter()) {
            assert_eq!(a.coord(), b.coord());
            assert_eq!(a.blocks(), b.blocks(), "blocks differ in {slot}");
            let shape = |chunk: &crate::chunk::Chunk| -> Vec<_> {
                chunk.objects().iter().map(|o| (o.type_id, o.position)).collect()
            };
            assert_eq!(shape(a), shape(b), "objects differ in {slot}");
        }
    }
}

mod gate_tests {
    use super::*;

    #[test]
    fn e2e_gate_opens_after_shift_burst() {
        let mut streaming = controller(2, terrain());
        let mut gate = LoadingGate::new("planet");

        for (dx, dy) in [(1, 0), (1, 0), (0, 1), (-2, 0), (0, -1), (5, 5)] {
            streaming.shift(dx, dy);
            streaming.pump();
            gate.poll(streaming.fraction_clean());
        }

        let deadline = Instant::now() + TIMEOUT;
        while !gate.is_live() && Instant::now() < deadline {
            streaming.pump();
            gate.poll(streaming.fraction_clean());
            thread::sleep(Duration::from_millis(1));
        }
        assert!(gate.is_live());
        assert_eq!(streaming.center(), ChunkCoord::new(6, 6));
    }

    #[test]
    fn e2e_failed_generation_holds_the_gate() {
        let mut streaming = controller(2, Arc::new(FailsAt(ChunkCoord::new(2, 0))));
        let mut gate = LoadingGate::new("planet");

        assert!(wait_for_jobs(&streaming, 9));
        let report = streaming.pump();
        assert_eq!(report.failed, 1);
        assert_eq!(report.installed, 8);
        assert!(!gate.poll(streaming.fraction_clean()));
        assert!(streaming.get_slot(2, 0).expect("slot").is_dirty());
        assert!(!streaming.get_slot(1, 0).expect("slot").is_dirty());

        // Re-requesting is the only recovery path.
        streaming.set_generator(Arc::new(Marker(1)));
        assert!(streaming.pump_until_clean(TIMEOUT));
        assert!(gate.poll(streaming.fraction_clean()));
    }

    #[test]
    fn e2e_panicking_generator_is_a_failure() {
        let mut streaming = controller(2, Arc::new(PanicsAt(ChunkCoord::new(1, 1))));
        let mut gate = LoadingGate::new("planet");

        assert!(wait_for_jobs(&streaming, 9));
        let report = streaming.pump();
        assert_eq!(report.failed, 1);
        assert_eq!(report.installed, 8);
        assert_eq!(streaming.stats().failed, 1);

        let center = streaming.grid().get(SlotIndex::new(1, 1)).expect("slot");
        assert!(center.is_dirty());
        assert_eq!(center.pending_task(), None, "no stale token left behind");
        assert!(!gate.poll(streaming.fraction_clean()));

        // Still the only recovery path.
        streaming.set_generator(Arc::new(Marker(1)));
        assert!(streaming.pump_until_clean(TIMEOUT));
        assert!(gate.poll(streaming.fraction_clean()));
    }
}
