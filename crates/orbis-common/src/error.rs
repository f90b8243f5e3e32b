//! Error types for Project Orbis.

use thiserror::Error;

/// Top-level error type for Orbis operations.
#[derive(Debug, Error)]
pub enum OrbisError {
    /// World/chunk errors
    #[error("World error: {0}")]
    World(#[from] WorldError),

    /// Configuration errors
    #[error("Config error: {0}")]
    Config(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// World, chunk and generation errors.
#[derive(Debug, Error)]
pub enum WorldError {
    /// Streaming configuration rejected
    #[error("Invalid streaming config: {0}")]
    InvalidConfig(String),

    /// Slot index outside the grid
    #[error("Slot ({col}, {row}) is outside the grid")]
    SlotOutOfRange {
        /// Column index
        col: usize,
        /// Row index
        row: usize,
    },

    /// Chunk coordinate not covered by the current window
    #[error("Chunk ({x}, {y}) is outside the streamed window")]
    CoordOutsideWindow {
        /// X coordinate
        x: i32,
        /// Y coordinate
        y: i32,
    },

    /// Procedural generation failed
    #[error("Generation of chunk ({x}, {y}) failed: {reason}")]
    GenerationFailed {
        /// X coordinate
        x: i32,
        /// Y coordinate
        y: i32,
        /// Failure description
        reason: String,
    },

    /// A resource the generator depends on never became ready
    #[error("Generator dependency not ready: {0}")]
    NotReady(String),
}

/// Result type alias for world operations.
pub type WorldResult<T> = Result<T, WorldError>;

/// Result type alias for Orbis operations.
pub type OrbisResult<T> = Result<T, OrbisError>;
