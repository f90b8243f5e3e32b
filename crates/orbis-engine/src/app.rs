//! Headless interactive loop.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use glam::Vec2;
use orbis_common::{ChunkCoord, IdAllocator, Rect};
use orbis_world::{
    ChunkGrid, GatedGenerator, LoadingGate, ObjectFactory, PlacedObject, ReadySignal, StreamingController, StreamingStats,
    TemplateFactory, TerrainGenerator, TerrainParams, UniverseGenerator, UniverseParams,
};
use tracing::{debug, info};

use crate::config::EngineConfig;
use crate::timing::TickClock;

/// One streamed scale with its loading gate.
struct Scale {
    streaming: StreamingController,
    gate: LoadingGate,
}

impl Scale {
    fn new(name: &str, streaming: StreamingController) -> Self {
        Self {
            streaming,
            gate: LoadingGate::new(name),
        }
    }

    /// Follows the viewer, installs finished chunks and updates the gate.
    fn tick(&mut self, viewer: Vec2) {
        let exposed = self.streaming.track(viewer);
        if exposed.len() == self.streaming.grid().len() {
            self.gate.arm();
        }
        self.streaming.pump();
        self.gate.poll(self.streaming.fraction_clean());
    }

    /// Visits visible objects if the gate is open.
    fn visible<F: FnMut(&PlacedObject)>(&self, view: &Rect, f: F) -> usize {
        if !self.gate.is_live() {
            return 0;
        }
        self.streaming.visit_visible(view, f)
    }
}

/// What a run did.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    /// Ticks executed
    pub ticks: u32,
    /// Planet streaming counters
    pub planet: StreamingStats,
    /// Universe streaming counters
    pub universe: StreamingStats,
    /// Times the planet gate went live
    pub planet_gate_opened: u32,
    /// Times the universe gate went live
    pub universe_gate_opened: u32,
    /// Most planet objects visible in one tick
    pub max_visible: usize,
    /// Light emitters seen over the run
    pub lights_seen: usize,
    /// Planets seen in visible star systems over the run
    pub planets_seen: usize,
    /// Ticks that ran over budget
    pub overruns: u64,
}

/// Starts loading the block palette. Generators on the planet wait for it.
fn load_palette(delay: Duration) -> Result<ReadySignal> {
    let palette = ReadySignal::new();
    if delay.is_zero() {
        palette.set();
        return Ok(palette);
    }
    let loaded = palette.clone();
    thread::Builder::new()
        .name("orbis-assets".into())
        .spawn(move || {
            thread::sleep(delay);
            debug!("Block palette loaded");
            loaded.set();
        })
        .context("failed to spawn asset loader")?;
    Ok(palette)
}

/// Runs the loop for `config.ticks` ticks.
pub fn run(mut config: EngineConfig) -> Result<RunSummary> {
    config.validate().context("invalid configuration")?;
    let seed = config.resolve_seed();
    info!("World seed: {seed}");

    let factory: Arc<dyn ObjectFactory> = Arc::new(TemplateFactory::standard());

    let universe_generator = UniverseGenerator::new(UniverseParams {
        extent: config.universe.extent,
        ..UniverseParams::default()
    });
    let mut universe = Scale::new(
        "universe",
        StreamingController::new(
            config.universe.clone(),
            Arc::new(universe_generator),
            Arc::clone(&factory),
            Arc::new(IdAllocator::new()),
            seed,
            ChunkCoord::new(0, 0),
        )?,
    );

    let palette = load_palette(Duration::from_millis(config.palette_delay_ms))?;
    let terrain = TerrainGenerator::new(TerrainParams {
        extent: config.planet.extent,
        blocks_per_side: config.planet.blocks_per_side,
        planet_width_chunks: config.planet.planet_width_chunks,
        ..TerrainParams::default()
    });
    let surface = terrain.params().surface_level as f32;
    let planet_generator = GatedGenerator::new(
        terrain,
        palette,
        Duration::from_millis(config.palette_timeout_ms),
        "block palette",
    );

    let extent = config.planet.extent as f32;
    let mut viewer = Vec2::new(extent * 0.5, surface);
    let mut stargazer = Vec2::splat(config.universe.extent as f32 * 0.5);

    let mut planet = Scale::new(
        "planet",
        StreamingController::new(
            config.planet.clone(),
            Arc::new(planet_generator),
            factory,
            Arc::new(IdAllocator::new()),
            seed,
            ChunkGrid::chunk_at(viewer, config.planet.extent),
        )?,
    );

    let mut clock = TickClock::new(config.tick_rate);
    let dt = clock.fixed_dt();
    info!("Running {} ticks at {} Hz", config.ticks, clock.tick_rate());
    let half_view = Vec2::from(config.view_size) * 0.5;
    let mut summary = RunSummary::default();

    for tick in 1..=config.ticks {
        clock.begin_tick();

        let t = tick as f32 * dt;
        viewer.x += config.viewer_speed * dt;
        viewer.y = surface + (t * 0.5).sin() * extent * 0.75;
        if tick == config.teleport_tick {
            viewer.x += extent * (config.planet.cols * 4) as f32;
            info!("Viewer teleported to ({:.0}, {:.0})", viewer.x, viewer.y);
        }
        stargazer += Vec2::new(1.0, 0.4) * config.universe_speed * dt;

        planet.tick(viewer);
        universe.tick(stargazer);

        let view = Rect::from_center(viewer, half_view * 2.0);
        let visible = planet.visible(&view, |object| {
            if object.light().is_some() {
                summary.lights_seen += 1;
            }
        });
        summary.max_visible = summary.max_visible.max(visible);

        let sky = Rect::from_center(stargazer, Vec2::splat(config.universe.extent as f32));
        universe.visible(&sky, |system| {
            summary.planets_seen += system.children().len().saturating_sub(1);
        });

        if config.stats_interval > 0 && tick % config.stats_interval == 0 {
            let stats = planet.streaming.stats();
            let pool = planet.streaming.pool_stats();
            info!(
                "Tick {tick}: planet {:.0}% clean, {} installed, {} stale, {} failed, {} queued, {:.2}ms/tick",
                planet.streaming.fraction_clean() * 100.0,
                stats.installed,
                stats.stale,
                stats.failed,
                pool.queued,
                clock.average_work_ms()
            );
        }

        clock.end_tick();
        summary.ticks = tick;
    }

    summary.planet = planet.streaming.stats();
    summary.universe = universe.streaming.stats();
    summary.planet_gate_opened = planet.gate.times_opened();
    summary.universe_gate_opened = universe.gate.times_opened();
    summary.overruns = clock.overruns();
    Ok(summary)
}
