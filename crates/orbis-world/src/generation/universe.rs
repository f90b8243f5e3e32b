//! Universe-scale generation: star systems scattered by a density field.

use std::f32::consts::TAU;

use glam::Vec2;
use orbis_common::ChunkCoord;
use serde::{Deserialize, Serialize};

use super::{cell_seed, object_types, GenerationResult, OctaveNoise, ProceduralGenerator};
use crate::content::{ContentBundle, Placement};

const DENSITY_STREAM: u32 = 16;

/// Star field parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UniverseParams {
    /// Chunk side length in world units
    pub extent: u32,
    /// Candidate sites per chunk side
    pub sites_per_side: u32,
    /// Density above which a site may hold a system (0.0-1.0)
    pub density_threshold: f64,
    /// Base frequency of the density field
    pub density_frequency: f64,
    /// Maximum planets per system
    pub max_planets: u32,
}

impl Default for UniverseParams {
    fn default() -> Self {
        Self {
            extent: 4096,
            sites_per_side: 4,
            density_threshold: 0.45,
            density_frequency: 0.0002,
            max_planets: 6,
        }
    }
}

/// Star system generator.
#[derive(Debug, Clone, Default)]
pub struct UniverseGenerator {
    params: UniverseParams,
}

impl UniverseGenerator {
    /// Creates a generator.
    #[must_use]
    pub fn new(params: UniverseParams) -> Self {
        Self { params }
    }

    /// Returns the parameters.
    #[must_use]
    pub const fn params(&self) -> &UniverseParams {
        &self.params
    }

    fn system_at(&self, center: Vec2, site_size: f32, rng: &mut fastrand::Rng) -> Placement {
        let mut system = Placement::new(object_types::STAR_SYSTEM, center)
            .with_child(Placement::new(object_types::STAR, center));

        let planets = rng.u32(0..=self.params.max_planets);
        let max_orbit = site_size * 0.45;
        for i in 0..planets {
            let orbit = max_orbit * (i + 1) as f32 / (planets + 1) as f32;
            let angle = rng.f32() * TAU;
            let offset = Vec2::new(angle.cos(), angle.sin()) * orbit;
            system = system.with_child(Placement::new(object_types::PLANET, center + offset));
        }
        system
    }
}

impl ProceduralGenerator for UniverseGenerator {
    fn generate(&self, coord: ChunkCoord, seed: u64) -> GenerationResult<ContentBundle> {
        let sites = self.params.sites_per_side.max(1);
        let site_size = self.params.extent as f32 / sites as f32;
        let origin = coord.origin(self.params.extent);

        let density = OctaveNoise::new(seed, DENSITY_STREAM, 3, self.params.density_frequency);
        let mut rng = fastrand::Rng::with_seed(cell_seed(coord, seed));

        let mut placements = Vec::new();
        for sy in 0..sites {
            for sx in 0..sites {
                // Jitter is drawn for every site so the RNG stream does not
                // depend on which sites end up populated.
                let jitter = Vec2::new(rng.f32(), rng.f32()) * 0.5 + Vec2::splat(0.25);
                let roll = f64::from(rng.f32());

                let local = (Vec2::new(sx as f32, sy as f32) + jitter) * site_size;
                let world = origin + local;
                let field = density.sample2_unit(f64::from(world.x), f64::from(world.y));
                if field > self.params.density_threshold && roll < field {
                    placements.push(self.system_at(local, site_size, &mut rng));
                }
            }
        }

        Ok(ContentBundle {
            placements,
            blocks: None,
        })
    }

    fn name(&self) -> &str {
        "universe"
    }
}
