//! # Orbis Engine
//!
//! Headless driver for Project Orbis.
//!
//! Wires the two streamed scales together:
//! - Universe: star systems around a drifting observer
//! - Planet: terrain chunks around a walking viewer, wrapped at the planet
//!   width
//!
//! Usage: `orbis [config.toml]` runs the loop. Without an argument the config
//! is read from `orbis.toml` or the platform config directory.
//! `orbis --save-config [path]` writes the effective config and exits.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

mod app;
mod config;
mod timing;

use anyhow::Result;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::EngineConfig;

/// Main entry point.
fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive("orbis=info".parse()?))
        .init();

    info!("Project Orbis starting...");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let mut args = std::env::args().skip(1);
    let config = match args.next().as_deref() {
        Some("--save-config") => {
            let path = args.next().map_or_else(EngineConfig::config_path, Into::into);
            EngineConfig::load_from(&path).save_to(&path)?;
            return Ok(());
        },
        Some(path) => EngineConfig::load_from(path),
        None => EngineConfig::load(),
    };

    let summary = app::run(config)?;
    info!(
        "Ran {} ticks: planet {} installed / {} stale / {} failed / {} copied, universe {} installed, gates opened {}/{}, {} overruns",
        summary.ticks,
        summary.planet.installed,
        summary.planet.stale,
        summary.planet.failed,
        summary.planet.copied,
        summary.universe.installed,
        summary.planet_gate_opened,
        summary.universe_gate_opened,
        summary.overruns
    );
    info!(
        "Saw up to {} objects at once, {} lights, {} planets",
        summary.max_visible, summary.lights_seen, summary.planets_seen
    );

    info!("Project Orbis shutdown complete");
    Ok(())
}
