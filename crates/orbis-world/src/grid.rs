//! Sliding chunk window.

use glam::Vec2;
use orbis_common::{ChunkCoord, WorldError, WorldResult};

use crate::chunk::Chunk;

/// Address of a slot in the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotIndex {
    /// Column (0 = left)
    pub col: usize,
    /// Row (0 = top)
    pub row: usize,
}

impl SlotIndex {
    /// Creates a slot index.
    #[must_use]
    pub const fn new(col: usize, row: usize) -> Self {
        Self { col, row }
    }
}

impl std::fmt::Display for SlotIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {}]", self.col, self.row)
    }
}

/// Fixed-size window of chunks over the infinite chunk plane.
#[derive(Debug)]
pub struct ChunkGrid {
    cols: usize,
    rows: usize,
    extent: u32,
    partitions_per_side: u32,
    origin: ChunkCoord,
    cells: Vec<Chunk>,
}

impl ChunkGrid {
    /// Creates a grid of empty chunks whose top-left slot sits at `origin`.
    pub fn new(
        cols: usize,
        rows: usize,
        extent: u32,
        partitions_per_side: u32,
        origin: ChunkCoord,
    ) -> WorldResult<Self> {
        if cols == 0 || rows == 0 {
            return Err(WorldError::InvalidConfig(format!(
                "grid must have at least one slot, got {cols}x{rows}"
            )));
        }
        let mut grid = Self {
            cols,
            rows,
            extent,
            partitions_per_side,
            origin,
            cells: Vec::with_capacity(cols * rows),
        };
        for row in 0..rows {
            for col in 0..cols {
                let coord = grid.slot_coord(SlotIndex::new(col, row));
                grid.cells.push(Chunk::new(coord, extent, partitions_per_side));
            }
        }
        Ok(grid)
    }

    /// Creates a grid centred on `center`.
    pub fn centered(
        cols: usize,
        rows: usize,
        extent: u32,
        partitions_per_side: u32,
        center: ChunkCoord,
    ) -> WorldResult<Self> {
        Self::new(cols, rows, extent, partitions_per_side, Self::origin_for(center, cols, rows))
    }

    fn origin_for(center: ChunkCoord, cols: usize, rows: usize) -> ChunkCoord {
        center.offset(-((cols / 2) as i32), -((rows / 2) as i32))
    }

    /// Number of columns.
    #[must_use]
    pub const fn cols(&self) -> usize {
        self.cols
    }

    /// Number of rows.
    #[must_use]
    pub const fn rows(&self) -> usize {
        self.rows
    }

    /// Total number of slots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Always false; a grid has at least one slot.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Chunk side length.
    #[must_use]
    pub const fn extent(&self) -> u32 {
        self.extent
    }

    /// Coordinate of slot `[0, 0]`.
    #[must_use]
    pub const fn origin(&self) -> ChunkCoord {
        self.origin
    }

    /// Coordinate of the centre slot.
    #[must_use]
    pub fn center(&self) -> ChunkCoord {
        self.origin.offset((self.cols / 2) as i32, (self.rows / 2) as i32)
    }

    /// Coordinate held by `slot`.
    #[must_use]
    pub fn slot_coord(&self, slot: SlotIndex) -> ChunkCoord {
        self.origin.offset(slot.col as i32, slot.row as i32)
    }

    /// Slot holding `coord`, if it is inside the window.
    #[must_use]
    pub fn slot_for(&self, coord: ChunkCoord) -> Option<SlotIndex> {
        Self::slot_in(self.origin, self.cols, self.rows, coord)
    }

    fn slot_in(origin: ChunkCoord, cols: usize, rows: usize, coord: ChunkCoord) -> Option<SlotIndex> {
        let col = i64::from(coord.x) - i64::from(origin.x);
        let row = i64::from(coord.y) - i64::from(origin.y);
        if col < 0 || row < 0 || col >= cols as i64 || row >= rows as i64 {
            return None;
        }
        Some(SlotIndex::new(col as usize, row as usize))
    }

    /// Slot whose chunk contains world position `pos`.
    #[must_use]
    pub fn slot_containing(&self, pos: Vec2) -> Option<SlotIndex> {
        self.slot_for(Self::chunk_at(pos, self.extent))
    }

    /// Chunk coordinate containing world position `pos`.
    #[must_use]
    pub fn chunk_at(pos: Vec2, extent: u32) -> ChunkCoord {
        let extent = extent as f32;
        ChunkCoord::new((pos.x / extent).floor() as i32, (pos.y / extent).floor() as i32)
    }

    fn index(&self, slot: SlotIndex) -> Option<usize> {
        (slot.col < self.cols && slot.row < self.rows).then(|| slot.row * self.cols + slot.col)
    }

    /// Chunk at `slot`.
    #[must_use]
    pub fn get(&self, slot: SlotIndex) -> Option<&Chunk> {
        self.index(slot).and_then(|i| self.cells.get(i))
    }

    /// Mutable chunk at `slot`.
    pub fn get_mut(&mut self, slot: SlotIndex) -> Option<&mut Chunk> {
        self.index(slot).and_then(|i| self.cells.get_mut(i))
    }

    /// All chunks with their slots, row-major.
    pub fn iter(&self) -> impl Iterator<Item = (SlotIndex, &Chunk)> {
        let cols = self.cols;
        self.cells
            .iter()
            .enumerate()
            .map(move |(i, chunk)| (SlotIndex::new(i % cols, i / cols), chunk))
    }

    /// All slots ordered nearest-to-centre first.
    #[must_use]
    pub fn slots_by_distance(&self) -> Vec<SlotIndex> {
        let mut slots: Vec<_> = self.iter().map(|(slot, _)| slot).collect();
        self.sort_by_distance(&mut slots);
        slots
    }

    fn sort_by_distance(&self, slots: &mut [SlotIndex]) {
        let center = self.center();
        slots.sort_by_key(|&slot| (self.slot_coord(slot).distance_sq(center), slot.row, slot.col));
    }

    /// Share of slots whose content is installed (0.0-1.0).
    #[must_use]
    pub fn fraction_clean(&self) -> f32 {
        let clean = self.cells.iter().filter(|c| !c.is_dirty()).count();
        clean as f32 / self.cells.len() as f32
    }

    /// Moves the window by whole chunks. Returns the newly exposed slots,
    /// nearest to the centre first.
    pub fn shift(&mut self, dx: i32, dy: i32) -> Vec<SlotIndex> {
        if dx == 0 && dy == 0 {
            return Vec::new();
        }
        let origin = self.origin.offset(dx, dy);
        self.rearrange(origin, self.cols, self.rows)
    }

    /// Moves the window so that `center` is its centre slot.
    pub fn recenter(&mut self, center: ChunkCoord) -> Vec<SlotIndex> {
        let origin = Self::origin_for(center, self.cols, self.rows);
        if origin == self.origin {
            return Vec::new();
        }
        self.rearrange(origin, self.cols, self.rows)
    }

    /// Changes the window size around the current centre. Chunks whose
    /// coordinate stays inside the window are kept.
    pub fn resize(&mut self, cols: usize, rows: usize) -> WorldResult<Vec<SlotIndex>> {
        if cols == 0 || rows == 0 {
            return Err(WorldError::InvalidConfig(format!(
                "grid must have at least one slot, got {cols}x{rows}"
            )));
        }
        if cols == self.cols && rows == self.rows {
            return Ok(Vec::new());
        }
        let origin = Self::origin_for(self.center(), cols, rows);
        Ok(self.rearrange(origin, cols, rows))
    }

    fn rearrange(&mut self, origin: ChunkCoord, cols: usize, rows: usize) -> Vec<SlotIndex> {
        let (old_origin, old_cols, old_rows) = (self.origin, self.cols, self.rows);
        let mut old: Vec<Option<Chunk>> = std::mem::take(&mut self.cells).into_iter().map(Some).collect();

        self.origin = origin;
        self.cols = cols;
        self.rows = rows;

        let mut placed: Vec<Option<Chunk>> = Vec::with_capacity(cols * rows);
        for row in 0..rows {
            for col in 0..cols {
                let coord = self.slot_coord(SlotIndex::new(col, row));
                let kept = Self::slot_in(old_origin, old_cols, old_rows, coord)
                    .and_then(|s| old.get_mut(s.row * old_cols + s.col))
                    .and_then(Option::take);
                placed.push(kept);
            }
        }

        // Chunks that left the window are recycled; extras are dropped,
        // which cancels their pending work.
        let mut spares: Vec<Chunk> = old.into_iter().flatten().collect();
        let mut exposed = Vec::new();
        for (i, cell) in placed.iter_mut().enumerate() {
            if cell.is_some() {
                continue;
            }
            let slot = SlotIndex::new(i % cols, i / cols);
            let coord = self.slot_coord(slot);
            let chunk = match spares.pop() {
                Some(mut chunk) => {
                    chunk.reposition(coord);
                    chunk
                },
                None => Chunk::new(coord, self.extent, self.partitions_per_side),
            };
            *cell = Some(chunk);
            exposed.push(slot);
        }

        self.cells = placed.into_iter().flatten().collect();
        self.sort_by_distance(&mut exposed);
        exposed
    }
}
