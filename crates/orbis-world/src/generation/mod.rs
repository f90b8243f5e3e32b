//! Procedural generation.
//!
//! A [`ProceduralGenerator`] is a pure function of `(coordinate, seed)`.

pub mod octaves;
pub mod ready;
pub mod terrain;
pub mod universe;

use orbis_common::{ChunkCoord, WorldError};
use thiserror::Error;

use crate::content::ContentBundle;

pub use octaves::OctaveNoise;
pub use ready::{GatedGenerator, ReadySignal};
pub use terrain::{TerrainGenerator, TerrainParams};
pub use universe::{UniverseGenerator, UniverseParams};

/// Object type ids emitted by the built-in generators.
pub mod object_types {
    use orbis_common::ObjectTypeId;

    /// Surface tree.
    pub const TREE: ObjectTypeId = ObjectTypeId::new(1);
    /// Surface rock.
    pub const ROCK: ObjectTypeId = ObjectTypeId::new(2);
    /// Glowing underground crystal.
    pub const CRYSTAL: ObjectTypeId = ObjectTypeId::new(3);
    /// Star system container.
    pub const STAR_SYSTEM: ObjectTypeId = ObjectTypeId::new(10);
    /// Star at the center of a system.
    pub const STAR: ObjectTypeId = ObjectTypeId::new(11);
    /// Planet orbiting a star.
    pub const PLANET: ObjectTypeId = ObjectTypeId::new(12);
}

/// Generation errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GenerationError {
    /// A resource the generator waits on did not become ready in time
    #[error("dependency not ready: {0}")]
    NotReady(String),
    /// The generator could not produce content
    #[error("{0}")]
    Failed(String),
}

impl GenerationError {
    /// Converts into a world error for the chunk at `coord`.
    #[must_use]
    pub fn into_world_error(self, coord: ChunkCoord) -> WorldError {
        match self {
            Self::NotReady(what) => WorldError::NotReady(what),
            Self::Failed(reason) => WorldError::GenerationFailed {
                x: coord.x,
                y: coord.y,
                reason,
            },
        }
    }
}

/// Result type for generation.
pub type GenerationResult<T> = Result<T, GenerationError>;

/// Deterministic coordinate + seed to chunk content.
pub trait ProceduralGenerator: Send + Sync {
    /// Generates the content of the chunk at `coord`.
    fn generate(&self, coord: ChunkCoord, seed: u64) -> GenerationResult<ContentBundle>;

    /// Short name for logs.
    fn name(&self) -> &str;

    /// Width in chunks after which X wraps, if it does. Coordinates equal
    /// after wrapping must generate identical content.
    fn wrap_width(&self) -> Option<u32> {
        None
    }
}

/// Mixes a chunk coordinate and world seed into a per-chunk RNG seed.
#[must_use]
pub fn cell_seed(coord: ChunkCoord, seed: u64) -> u64 {
    // splitmix64 over the packed coordinate
    let packed = (u64::from(coord.x as u32) << 32) | u64::from(coord.y as u32);
    let mut z = seed ^ packed.wrapping_mul(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Derives the 32-bit seed for one noise layer.
#[must_use]
pub(crate) fn layer_seed(seed: u64, layer: u32) -> u32 {
    let mixed = cell_seed(ChunkCoord::new(layer as i32, -(layer as i32) - 1), seed);
    (mixed ^ (mixed >> 32)) as u32
}
