//! Engine configuration.

use orbis_common::{OrbisError, OrbisResult};
use orbis_world::StreamingConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Configuration file name.
const CONFIG_FILE: &str = "orbis.toml";

/// Engine configuration parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    // === World Settings ===
    /// World seed (None = random)
    pub world_seed: Option<u64>,
    /// Simulated delay before the block palette is ready, in milliseconds
    pub palette_delay_ms: u64,
    /// Longest a generator waits for the palette, in milliseconds
    pub palette_timeout_ms: u64,

    // === Loop Settings ===
    /// Interactive ticks per second
    pub tick_rate: u32,
    /// Ticks to run before exiting
    pub ticks: u32,
    /// Log streaming stats every this many ticks (0 = never)
    pub stats_interval: u32,

    // === Viewer Settings ===
    /// Planet viewer speed in world units per second
    pub viewer_speed: f32,
    /// Universe viewer speed in world units per second
    pub universe_speed: f32,
    /// Visible area around the viewer (width, height)
    pub view_size: [f32; 2],
    /// Tick at which the planet viewer teleports (0 = never)
    pub teleport_tick: u32,

    // === Grids ===
    /// Universe-scale grid
    pub universe: StreamingConfig,
    /// Planet-scale grid
    pub planet: StreamingConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            // World
            world_seed: None,
            palette_delay_ms: 50,
            palette_timeout_ms: 2000,

            // Loop
            tick_rate: 60,
            ticks: 600,
            stats_interval: 120,

            // Viewer
            viewer_speed: 240.0,
            universe_speed: 900.0,
            view_size: [640.0, 360.0],
            teleport_tick: 300,

            // Grids
            universe: StreamingConfig::universe(),
            planet: StreamingConfig::planet(64),
        }
    }
}

impl EngineConfig {
    /// Load configuration from the default file location.
    /// Returns default config if file doesn't exist.
    pub fn load() -> Self {
        Self::load_from(Self::config_path())
    }

    /// Load configuration from a specific path.
    /// Returns default config if file doesn't exist or is invalid.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();

        if !path.exists() {
            info!("Config file {} not found, using defaults", path.display());
            return Self::default();
        }

        match fs::read_to_string(path) {
            Ok(contents) => match toml::from_str(&contents) {
                Ok(config) => {
                    info!("Loaded config from {}", path.display());
                    config
                },
                Err(e) => {
                    warn!("Failed to parse config file: {e}");
                    Self::default()
                },
            },
            Err(e) => {
                warn!("Failed to read config file: {e}");
                Self::default()
            },
        }
    }

    /// Save configuration to a specific path.
    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> OrbisResult<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self).map_err(|e| OrbisError::Config(e.to_string()))?;
        fs::write(path, contents)?;

        info!("Saved config to {}", path.display());
        Ok(())
    }

    /// Default configuration file path: `orbis.toml` in the working
    /// directory, then the platform config directory.
    pub fn config_path() -> PathBuf {
        let local = PathBuf::from(CONFIG_FILE);
        if local.exists() {
            return local;
        }
        match dirs_config_path() {
            Some(config_dir) => config_dir.join("orbis").join(CONFIG_FILE),
            None => local,
        }
    }

    /// Clamps loop and viewer values to sensible ranges and checks both
    /// streaming grids.
    pub fn validate(&mut self) -> OrbisResult<()> {
        self.tick_rate = self.tick_rate.clamp(1, 240);
        self.viewer_speed = self.viewer_speed.clamp(0.0, 10_000.0);
        self.universe_speed = self.universe_speed.clamp(0.0, 100_000.0);
        self.view_size = [self.view_size[0].max(1.0), self.view_size[1].max(1.0)];
        self.palette_timeout_ms = self.palette_timeout_ms.max(1);

        self.universe.validate()?;
        self.planet.validate()?;
        if self.planet.blocks_per_side == 0 {
            return Err(OrbisError::Config("planet grid needs a block matrix".into()));
        }
        Ok(())
    }

    /// Seed to use for this run.
    pub fn resolve_seed(&self) -> u64 {
        self.world_seed.unwrap_or_else(|| fastrand::u64(..))
    }
}

/// Get platform-specific config directory.
fn dirs_config_path() -> Option<PathBuf> {
    #[cfg(target_os = "macos")]
    {
        std::env::var("HOME")
            .ok()
            .map(|home| PathBuf::from(home).join("Library/Application Support"))
    }

    #[cfg(target_os = "windows")]
    {
        std::env::var("APPDATA").ok().map(PathBuf::from)
    }

    #[cfg(target_os = "linux")]
    {
        std::env::var("XDG_CONFIG_HOME")
            .ok()
            .map(PathBuf::from)
            .or_else(|| {
                std::env::var("HOME")
                    .ok()
                    .map(|h| PathBuf::from(h).join(".config"))
            })
    }

    #[cfg(not(any(target_os = "macos", target_os = "windows", target_os = "linux")))]
    {
        None
    }
}
