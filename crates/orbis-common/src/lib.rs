//! # Orbis Common
//!
//! Common types, utilities, and shared abstractions for Project Orbis.
//!
//! This crate provides foundational types used by both streaming scales:
//! - Coordinate types (world, chunk, local)
//! - Rectangles for bounds and view culling
//! - ID types and the per-world id allocator
//! - Common error types
//! - Prelude for convenient imports

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod coords;
pub mod error;
pub mod ids;
pub mod rect;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::coords::*;
    pub use crate::error::*;
    pub use crate::ids::*;
    pub use crate::rect::*;
}

pub use prelude::*;
