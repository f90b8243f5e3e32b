//! Chunk content: block matrices, placement records and placed objects.

use glam::Vec2;
use orbis_common::{LocalCoord, ObjectId, ObjectTypeId, Rect};
use serde::{Deserialize, Serialize};

/// Block identifier.
pub type BlockId = u16;

/// Empty block.
pub const AIR: BlockId = 0;

/// Which layer of a block matrix to address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BlockLayer {
    /// Solid blocks the player collides with
    Foreground,
    /// Decorative wall blocks behind the foreground
    Background,
}

/// Square matrix of block ids with a foreground and a background layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockMatrix {
    side: u32,
    foreground: Vec<BlockId>,
    background: Vec<BlockId>,
}

impl BlockMatrix {
    /// Creates a matrix filled with air.
    #[must_use]
    pub fn new(side: u32) -> Self {
        let count = (side * side) as usize;
        Self {
            side,
            foreground: vec![AIR; count],
            background: vec![AIR; count],
        }
    }

    /// Blocks per side.
    #[must_use]
    pub const fn side(&self) -> u32 {
        self.side
    }

    /// Gets a block at local coordinates.
    #[must_use]
    pub fn get(&self, layer: BlockLayer, local: LocalCoord) -> Option<BlockId> {
        if u32::from(local.x) >= self.side || u32::from(local.y) >= self.side {
            return None;
        }
        self.layer(layer).get(local.to_index(self.side)).copied()
    }

    /// Sets a block at local coordinates. Returns false when out of range.
    pub fn set(&mut self, layer: BlockLayer, local: LocalCoord, block: BlockId) -> bool {
        if u32::from(local.x) >= self.side || u32::from(local.y) >= self.side {
            return false;
        }
        let index = local.to_index(self.side);
        match self.layer_mut(layer).get_mut(index) {
            Some(slot) => {
                *slot = block;
                true
            },
            None => false,
        }
    }

    /// Row-major view of one layer.
    #[must_use]
    pub fn layer(&self, layer: BlockLayer) -> &[BlockId] {
        match layer {
            BlockLayer::Foreground => &self.foreground,
            BlockLayer::Background => &self.background,
        }
    }

    /// Mutable row-major view of one layer.
    pub fn layer_mut(&mut self, layer: BlockLayer) -> &mut [BlockId] {
        match layer {
            BlockLayer::Foreground => &mut self.foreground,
            BlockLayer::Background => &mut self.background,
        }
    }

    /// Number of non-air blocks in a layer.
    #[must_use]
    pub fn solid_count(&self, layer: BlockLayer) -> usize {
        self.layer(layer).iter().filter(|&&b| b != AIR).count()
    }
}

/// A request to place an object, as emitted by a generator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Placement {
    /// Kind of object to instantiate
    pub type_id: ObjectTypeId,
    /// Position relative to the chunk's top-left corner
    pub local_position: Vec2,
    /// Nested placements for composite objects (also chunk-local)
    pub children: Vec<Placement>,
}

impl Placement {
    /// Creates a leaf placement.
    #[must_use]
    pub fn new(type_id: ObjectTypeId, local_position: Vec2) -> Self {
        Self {
            type_id,
            local_position,
            children: Vec::new(),
        }
    }

    /// Adds a child placement.
    #[must_use]
    pub fn with_child(mut self, child: Placement) -> Self {
        self.children.push(child);
        self
    }
}

/// Everything a generator produces for one chunk coordinate.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContentBundle {
    /// Objects to place, in generation order
    pub placements: Vec<Placement>,
    /// Block layers (terrain scale only)
    pub blocks: Option<BlockMatrix>,
}

impl ContentBundle {
    /// Total number of placements including nested children.
    #[must_use]
    pub fn placement_count(&self) -> usize {
        fn count(p: &Placement) -> usize {
            1 + p.children.iter().map(count).sum::<usize>()
        }
        self.placements.iter().map(count).sum()
    }
}

/// Behavioural shape of a placed object.
#[derive(Debug, Clone, PartialEq)]
pub enum ObjectVariant {
    /// Static terrain decoration (trees, rocks, asteroids)
    Terrain,
    /// Object that emits light
    Light {
        /// Light radius in world units
        radius: f32,
        /// Light intensity (0.0-1.0)
        intensity: f32,
    },
    /// Object made of child objects (a star with its planets)
    Composite {
        /// Child objects in world space
        children: Vec<PlacedObject>,
    },
}

/// An instantiated object living in a chunk.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedObject {
    /// Unique id within the world
    pub id: ObjectId,
    /// Kind of object
    pub type_id: ObjectTypeId,
    /// Center position in world space
    pub position: Vec2,
    /// Footprint size in world units
    pub size: Vec2,
    /// Behaviour
    pub variant: ObjectVariant,
}

impl PlacedObject {
    /// World-space bounds of the object's footprint.
    #[must_use]
    pub fn bounds(&self) -> Rect {
        Rect::from_center(self.position, self.size)
    }

    /// Light emitted by this object, if any.
    #[must_use]
    pub fn light(&self) -> Option<(f32, f32)> {
        match self.variant {
            ObjectVariant::Light { radius, intensity } => Some((radius, intensity)),
            _ => None,
        }
    }

    /// Child objects of a composite, empty otherwise.
    #[must_use]
    pub fn children(&self) -> &[PlacedObject] {
        match &self.variant {
            ObjectVariant::Composite { children } => children,
            _ => &[],
        }
    }

    /// Moves the object and its children by `delta`.
    pub fn translate(&mut self, delta: Vec2) {
        self.position += delta;
        if let ObjectVariant::Composite { children } = &mut self.variant {
            for child in children {
                child.translate(delta);
            }
        }
    }
}
