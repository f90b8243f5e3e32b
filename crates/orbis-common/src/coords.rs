//! Coordinate types for world, chunk, and local positions.

use bytemuck::{Pod, Zeroable};
use glam::Vec2;
use serde::{Deserialize, Serialize};

/// World coordinate in world units (global integer position).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Pod, Zeroable)]
#[repr(C)]
pub struct WorldCoord {
    /// X coordinate in world space
    pub x: i64,
    /// Y coordinate in world space
    pub y: i64,
}

impl WorldCoord {
    /// Creates a new world coordinate.
    #[must_use]
    pub const fn new(x: i64, y: i64) -> Self {
        Self { x, y }
    }

    /// Converts to chunk coordinate given the chunk extent.
    #[must_use]
    pub const fn to_chunk_coord(self, extent: u32) -> ChunkCoord {
        let size = extent as i64;
        ChunkCoord {
            x: self.x.div_euclid(size) as i32,
            y: self.y.div_euclid(size) as i32,
        }
    }

    /// Converts to a floating point position.
    #[must_use]
    pub fn as_vec2(self) -> Vec2 {
        Vec2::new(self.x as f32, self.y as f32)
    }
}

/// Chunk coordinate (identifies a cell of the logical chunk plane).
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Pod, Zeroable,
)]
#[repr(C)]
pub struct ChunkCoord {
    /// X coordinate in chunk space
    pub x: i32,
    /// Y coordinate in chunk space
    pub y: i32,
}

impl ChunkCoord {
    /// Creates a new chunk coordinate.
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Returns this coordinate moved by whole chunks, saturating at the
    /// edge of the coordinate space.
    #[must_use]
    pub const fn offset(self, dx: i32, dy: i32) -> Self {
        Self {
            x: self.x.saturating_add(dx),
            y: self.y.saturating_add(dy),
        }
    }

    /// Converts to world coordinate (top-left corner of chunk).
    #[must_use]
    pub const fn to_world_coord(self, extent: u32) -> WorldCoord {
        WorldCoord {
            x: (self.x as i64) * (extent as i64),
            y: (self.y as i64) * (extent as i64),
        }
    }

    /// Top-left corner of the chunk as a floating point position.
    #[must_use]
    pub fn origin(self, extent: u32) -> Vec2 {
        self.to_world_coord(extent).as_vec2()
    }

    /// Wraps the X coordinate onto a planet that is `width` chunks around.
    ///
    /// A width of zero leaves the coordinate untouched.
    #[must_use]
    pub const fn wrap_x(self, width: u32) -> Self {
        if width == 0 {
            return self;
        }
        Self {
            x: self.x.rem_euclid(width as i32),
            y: self.y,
        }
    }

    /// Squared chunk distance to another coordinate.
    #[must_use]
    pub const fn distance_sq(self, other: Self) -> i64 {
        let dx = self.x as i64 - other.x as i64;
        let dy = self.y as i64 - other.y as i64;
        dx * dx + dy * dy
    }
}

impl std::fmt::Display for ChunkCoord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Local block coordinate within a chunk (0 to blocks_per_side-1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Pod, Zeroable)]
#[repr(C)]
pub struct LocalCoord {
    /// X coordinate within chunk
    pub x: u16,
    /// Y coordinate within chunk
    pub y: u16,
}

impl LocalCoord {
    /// Creates a new local coordinate.
    #[must_use]
    pub const fn new(x: u16, y: u16) -> Self {
        Self { x, y }
    }

    /// Converts to linear index for array access.
    #[must_use]
    pub const fn to_index(self, side: u32) -> usize {
        (self.y as usize) * (side as usize) + (self.x as usize)
    }

    /// Creates from linear index.
    #[must_use]
    pub const fn from_index(index: usize, side: u32) -> Self {
        let size = side as usize;
        Self {
            x: (index % size) as u16,
            y: (index / size) as u16,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offset_saturates() {
        let edge = ChunkCoord::new(i32::MAX - 1, i32::MIN + 1);
        assert_eq!(edge.offset(5, -5), ChunkCoord::new(i32::MAX, i32::MIN));
        assert_eq!(ChunkCoord::new(2, 3).offset(-4, 1), ChunkCoord::new(-2, 4));
    }

    #[test]
    fn test_distance_does_not_overflow_i32() {
        let a = ChunkCoord::new(i32::MIN, 0);
        let b = ChunkCoord::new(0, i32::MAX);
        assert_eq!(a.distance_sq(b), (1i64 << 62) + i64::from(i32::MAX).pow(2));
    }

    #[test]
    fn test_wrap_x() {
        assert_eq!(ChunkCoord::new(-1, 4).wrap_x(8), ChunkCoord::new(7, 4));
        assert_eq!(ChunkCoord::new(9, 0).wrap_x(0), ChunkCoord::new(9, 0));
    }
}
