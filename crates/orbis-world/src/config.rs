//! Streaming configuration.

use std::fs;
use std::path::Path;

use orbis_common::{WorldError, WorldResult};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Default chunk side length in world units.
pub const DEFAULT_EXTENT: u32 = 256;

/// Default bounded capacity of the worker pool queue.
pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

/// Parameters for one streamed chunk grid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamingConfig {
    /// Number of slot columns in the window
    pub cols: usize,
    /// Number of slot rows in the window
    pub rows: usize,
    /// Chunk side length in world units
    pub extent: u32,
    /// Blocks per chunk side (0 = this scale has no block matrix)
    pub blocks_per_side: u32,
    /// Render partitions per chunk side
    pub partitions_per_side: u32,
    /// Worker threads (None = available parallelism minus one, 0 = inline only)
    pub worker_threads: Option<usize>,
    /// Maximum queued jobs before submissions run inline
    pub queue_capacity: usize,
    /// Planet circumference in chunks (None = unbounded plane)
    pub planet_width_chunks: Option<u32>,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            cols: 5,
            rows: 3,
            extent: DEFAULT_EXTENT,
            blocks_per_side: 32,
            partitions_per_side: 4,
            worker_threads: None,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            planet_width_chunks: None,
        }
    }
}

impl StreamingConfig {
    /// Config for a universe-scale grid: large star-system cells, no blocks.
    #[must_use]
    pub fn universe() -> Self {
        Self {
            cols: 5,
            rows: 5,
            extent: 4096,
            blocks_per_side: 0,
            partitions_per_side: 2,
            ..Self::default()
        }
    }

    /// Config for a planet-scale grid wrapping around `width` chunks.
    #[must_use]
    pub fn planet(width: u32) -> Self {
        Self {
            planet_width_chunks: Some(width),
            ..Self::default()
        }
    }

    /// Total number of slots.
    #[must_use]
    pub const fn slot_count(&self) -> usize {
        self.cols * self.rows
    }

    /// Number of worker threads the pool will spawn.
    #[must_use]
    pub fn resolved_worker_threads(&self) -> usize {
        self.worker_threads.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map_or(1, usize::from)
                .saturating_sub(1)
                .max(1)
        })
    }

    /// Checks that the grid can be built from this config.
    pub fn validate(&self) -> WorldResult<()> {
        if self.cols == 0 || self.rows == 0 {
            return Err(WorldError::InvalidConfig(format!(
                "grid must have at least one slot, got {}x{}",
                self.cols, self.rows
            )));
        }
        if self.extent == 0 {
            return Err(WorldError::InvalidConfig("extent must be positive".into()));
        }
        if self.partitions_per_side == 0 || self.partitions_per_side > self.extent {
            return Err(WorldError::InvalidConfig(format!(
                "partitions_per_side must be in 1..={}, got {}",
                self.extent, self.partitions_per_side
            )));
        }
        if self.blocks_per_side > self.extent {
            return Err(WorldError::InvalidConfig(format!(
                "blocks_per_side {} exceeds extent {}",
                self.blocks_per_side, self.extent
            )));
        }
        if self.blocks_per_side > 0 && self.extent % self.blocks_per_side != 0 {
            return Err(WorldError::InvalidConfig(format!(
                "extent {} is not a multiple of blocks_per_side {}",
                self.extent, self.blocks_per_side
            )));
        }
        if self.planet_width_chunks == Some(0) {
            return Err(WorldError::InvalidConfig(
                "planet_width_chunks must be positive".into(),
            ));
        }
        Ok(())
    }

    /// Loads a config from a TOML file, falling back to defaults.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(contents) => match toml::from_str(&contents) {
                Ok(config) => {
                    info!("Loaded streaming config from {}", path.display());
                    config
                },
                Err(e) => {
                    warn!("Failed to parse streaming config: {e}");
                    Self::default()
                },
            },
            Err(e) => {
                warn!("Failed to read streaming config {}: {e}", path.display());
                Self::default()
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(StreamingConfig::default().validate().is_ok());
        assert!(StreamingConfig::universe().validate().is_ok());
        assert!(StreamingConfig::planet(16).validate().is_ok());
    }

    #[test]
    fn test_rejects_empty_grid() {
        let config = StreamingConfig {
            cols: 0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(WorldError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_rejects_uneven_blocks() {
        let config = StreamingConfig {
            extent: 100,
            blocks_per_side: 30,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_worker_threads_resolution() {
        let inline = StreamingConfig {
            worker_threads: Some(0),
            ..Default::default()
        };
        assert_eq!(inline.resolved_worker_threads(), 0);
        assert!(StreamingConfig::default().resolved_worker_threads() >= 1);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: StreamingConfig = toml::from_str("cols = 3\nrows = 3\nextent = 100")
            .expect("parse failed");
        assert_eq!(config.cols, 3);
        assert_eq!(config.extent, 100);
        assert_eq!(config.queue_capacity, DEFAULT_QUEUE_CAPACITY);
    }

    #[test]
    fn test_load_missing_file_falls_back() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = StreamingConfig::load_from(dir.path().join("missing.toml"));
        assert_eq!(config, StreamingConfig::default());
    }
}
