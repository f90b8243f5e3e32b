//! Planet-scale side-view terrain generation.

use glam::Vec2;
use orbis_common::{ChunkCoord, LocalCoord};
use serde::{Deserialize, Serialize};

use super::{cell_seed, object_types, GenerationError, GenerationResult, OctaveNoise, ProceduralGenerator};
use crate::content::{BlockLayer, BlockMatrix, ContentBundle, Placement, AIR};

/// Block ids produced by the terrain generator.
pub mod blocks {
    use crate::content::BlockId;

    /// Top surface block.
    pub const GRASS: BlockId = 1;
    /// Shallow soil.
    pub const DIRT: BlockId = 2;
    /// Deep rock.
    pub const STONE: BlockId = 3;
    /// Soil wall behind the foreground.
    pub const DIRT_WALL: BlockId = 10;
    /// Rock wall behind the foreground.
    pub const STONE_WALL: BlockId = 11;
}

/// Noise stream ids.
const HEIGHT_STREAM: u32 = 0;
const CAVE_STREAM: u32 = 1;
const TREE_STREAM: u32 = 2;
const CRYSTAL_STREAM: u32 = 3;

/// Terrain shape parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerrainParams {
    /// Chunk side length in world units
    pub extent: u32,
    /// Blocks per chunk side
    pub blocks_per_side: u32,
    /// Planet circumference in chunks (None = unbounded)
    pub planet_width_chunks: Option<u32>,
    /// Mean surface depth in world units
    pub surface_level: f64,
    /// Maximum deviation of the surface from its mean
    pub height_amplitude: f64,
    /// Octaves in the height profile
    pub octaves: u32,
    /// Amplitude falloff between height octaves
    pub roughness: f64,
    /// Base frequency of the height profile
    pub height_frequency: f64,
    /// Dirt blocks under the grass before stone starts
    pub dirt_depth: u32,
    /// Cave noise above which foreground blocks are carved (0.0-1.0)
    pub cave_threshold: f64,
    /// Tree density noise above which trees may spawn (0.0-1.0)
    pub tree_threshold: f64,
    /// Crystal noise above which crystals may spawn (0.0-1.0)
    pub crystal_threshold: f64,
}

impl Default for TerrainParams {
    fn default() -> Self {
        Self {
            extent: 256,
            blocks_per_side: 32,
            planet_width_chunks: None,
            surface_level: 128.0,
            height_amplitude: 96.0,
            octaves: 5,
            roughness: 0.5,
            height_frequency: 0.004,
            dirt_depth: 3,
            cave_threshold: 0.72,
            tree_threshold: 0.55,
            crystal_threshold: 0.8,
        }
    }
}

/// Terrain generator for one planet type.
#[derive(Debug, Clone)]
pub struct TerrainGenerator {
    params: TerrainParams,
}

impl TerrainGenerator {
    /// Creates a generator.
    #[must_use]
    pub fn new(params: TerrainParams) -> Self {
        Self { params }
    }

    /// Returns the parameters.
    #[must_use]
    pub const fn params(&self) -> &TerrainParams {
        &self.params
    }

    /// Surface depth (world Y) at world column `x`, including seam blending.
    #[must_use]
    pub fn surface_at(&self, height: &OctaveNoise, x: f64) -> f64 {
        let extent = f64::from(self.params.extent);
        let raw = |wx: f64| self.params.surface_level - height.sample1(wx) * self.params.height_amplitude;

        let Some(width) = self.params.planet_width_chunks else {
            return raw(x);
        };
        let circumference = f64::from(width) * extent;
        let x = x.rem_euclid(circumference);
        let blend_start = circumference - extent;
        if x < blend_start {
            return raw(x);
        }
        let t = (x - blend_start) / extent;
        raw(x) * (1.0 - t) + raw(0.0) * t
    }

    fn block_size(&self) -> f64 {
        f64::from(self.params.extent) / f64::from(self.params.blocks_per_side)
    }

    fn fill_blocks(&self, blocks: &mut BlockMatrix, origin: Vec2, height: &OctaveNoise, caves: &OctaveNoise) {
        let side = self.params.blocks_per_side;
        let block = self.block_size();

        for bx in 0..side {
            let wx = f64::from(origin.x) + (f64::from(bx) + 0.5) * block;
            let surface = self.surface_at(height, wx);

            for by in 0..side {
                let wy = f64::from(origin.y) + (f64::from(by) + 0.5) * block;
                if wy < surface {
                    continue;
                }
                let depth = ((wy - surface) / block) as u32;
                let local = LocalCoord::new(bx as u16, by as u16);

                let (fg, bg) = match depth {
                    0 => (blocks::GRASS, AIR),
                    d if d <= self.params.dirt_depth => (blocks::DIRT, blocks::DIRT_WALL),
                    _ => (blocks::STONE, blocks::STONE_WALL),
                };
                blocks.set(BlockLayer::Background, local, bg);

                let carved = depth > 1 && caves.sample2_unit(wx, wy) > self.params.cave_threshold;
                blocks.set(BlockLayer::Foreground, local, if carved { AIR } else { fg });
            }
        }
    }

    fn place_surface_objects(
        &self,
        placements: &mut Vec<Placement>,
        origin: Vec2,
        height: &OctaveNoise,
        trees: &OctaveNoise,
        rng: &mut fastrand::Rng,
    ) {
        let extent = f64::from(self.params.extent);
        let block = self.block_size();
        let side = self.params.blocks_per_side;

        // One candidate every four columns keeps trees from overlapping.
        for bx in (0..side).step_by(4) {
            let lx = (f64::from(bx) + 0.5) * block;
            let wx = f64::from(origin.x) + lx;
            let ly = self.surface_at(height, wx) - f64::from(origin.y);
            if !(0.0..extent).contains(&ly) {
                continue;
            }

            let density = trees.sample2_unit(wx, 0.0);
            let roll = rng.f64();
            if density > self.params.tree_threshold && roll < density {
                placements.push(Placement::new(
                    object_types::TREE,
                    Vec2::new(lx as f32, (ly - 12.0).max(0.0) as f32),
                ));
            } else if roll < 0.1 {
                placements.push(Placement::new(
                    object_types::ROCK,
                    Vec2::new(lx as f32, (ly - 2.0).max(0.0) as f32),
                ));
            }
        }
    }

    fn place_crystals(
        &self,
        placements: &mut Vec<Placement>,
        blocks: &BlockMatrix,
        origin: Vec2,
        crystals: &OctaveNoise,
        rng: &mut fastrand::Rng,
    ) {
        let side = self.params.blocks_per_side;
        let block = self.block_size();

        for (index, &id) in blocks.layer(BlockLayer::Foreground).iter().enumerate() {
            if id != blocks::STONE {
                continue;
            }
            let local = LocalCoord::from_index(index, side);
            let lx = (f64::from(local.x) + 0.5) * block;
            let ly = (f64::from(local.y) + 0.5) * block;
            let field = crystals.sample2_unit(f64::from(origin.x) + lx, f64::from(origin.y) + ly);
            if field > self.params.crystal_threshold && rng.f64() < 0.25 {
                placements.push(Placement::new(
                    object_types::CRYSTAL,
                    Vec2::new(lx as f32, ly as f32),
                ));
            }
        }
    }
}

impl Default for TerrainGenerator {
    fn default() -> Self {
        Self::new(TerrainParams::default())
    }
}

impl ProceduralGenerator for TerrainGenerator {
    fn generate(&self, coord: ChunkCoord, seed: u64) -> GenerationResult<ContentBundle> {
        if self.params.blocks_per_side == 0 || self.params.extent % self.params.blocks_per_side != 0 {
            return Err(GenerationError::Failed(format!(
                "extent {} cannot be split into {} blocks",
                self.params.extent, self.params.blocks_per_side
            )));
        }

        let coord = coord.wrap_x(self.params.planet_width_chunks.unwrap_or(0));
        let origin = coord.origin(self.params.extent);

        let height = OctaveNoise::new(seed, HEIGHT_STREAM, self.params.octaves, self.params.height_frequency)
            .with_persistence(self.params.roughness);
        let caves = OctaveNoise::new(seed, CAVE_STREAM, 3, 0.02);
        let trees = OctaveNoise::new(seed, TREE_STREAM, 2, 0.01);
        let crystals = OctaveNoise::new(seed, CRYSTAL_STREAM, 2, 0.05);
        let mut rng = fastrand::Rng::with_seed(cell_seed(coord, seed));

        let mut blocks = BlockMatrix::new(self.params.blocks_per_side);
        self.fill_blocks(&mut blocks, origin, &height, &caves);

        let mut placements = Vec::new();
        self.place_surface_objects(&mut placements, origin, &height, &trees, &mut rng);
        self.place_crystals(&mut placements, &blocks, origin, &crystals, &mut rng);

        Ok(ContentBundle {
            placements,
            blocks: Some(blocks),
        })
    }

    fn name(&self) -> &str {
        "terrain"
    }

    fn wrap_width(&self) -> Option<u32> {
        self.params.planet_width_chunks
    }
}
