//! # Orbis World
//!
//! Chunk streaming and concurrent generation for Project Orbis.
//!
//! This crate handles:
//! - A sliding window of chunks over an infinite 2D plane
//! - Asynchronous, cancellable procedural generation on a worker pool
//! - Dirty-flag tracking and the loading gate built on it
//! - Render partitions for per-frame culling
//! - Reference terrain and universe generators

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod chunk;
pub mod config;
pub mod content;
pub mod factory;
pub mod gate;
pub mod generation;
pub mod grid;
pub mod partition;
pub mod pool;
pub mod provider;
pub mod streaming;

#[cfg(test)]
mod scenarios;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::chunk::*;
    pub use crate::config::*;
    pub use crate::content::*;
    pub use crate::factory::*;
    pub use crate::gate::*;
    pub use crate::generation::*;
    pub use crate::grid::*;
    pub use crate::partition::*;
    pub use crate::pool::*;
    pub use crate::provider::*;
    pub use crate::streaming::*;
}

pub use prelude::*;
