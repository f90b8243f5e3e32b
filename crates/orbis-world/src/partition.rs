//! Render partitions: a fixed sub-grid of buckets per chunk.
//!
//! Bounds are half-open, so an object on a shared edge belongs to the
//! right/bottom partition.

use glam::Vec2;
use orbis_common::Rect;

/// One bucket of a chunk's objects.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderPartition {
    local_bounds: Rect,
    members: Vec<usize>,
}

impl RenderPartition {
    /// Bounds in the owning chunk's local space.
    #[must_use]
    pub const fn local_bounds(&self) -> &Rect {
        &self.local_bounds
    }

    /// Indices into the owning chunk's object list.
    #[must_use]
    pub fn members(&self) -> &[usize] {
        &self.members
    }
}

/// All partitions of one chunk.
#[derive(Debug, Clone, PartialEq)]
pub struct PartitionSet {
    per_side: u32,
    extent: f32,
    cell: f32,
    partitions: Vec<RenderPartition>,
}

impl PartitionSet {
    /// Tiles a chunk of side `extent` with `per_side²` partitions.
    #[must_use]
    pub fn new(extent: u32, per_side: u32) -> Self {
        let per_side = per_side.max(1);
        let extent = extent as f32;
        let cell = extent / per_side as f32;

        let mut partitions = Vec::with_capacity((per_side * per_side) as usize);
        for py in 0..per_side {
            for px in 0..per_side {
                let x = px as f32 * cell;
                let y = py as f32 * cell;
                // The last row/column absorbs rounding so the tiling is exact.
                let right = if px + 1 == per_side { extent } else { (px + 1) as f32 * cell };
                let bottom = if py + 1 == per_side { extent } else { (py + 1) as f32 * cell };
                partitions.push(RenderPartition {
                    local_bounds: Rect::new(x, y, right - x, bottom - y),
                    members: Vec::new(),
                });
            }
        }

        Self {
            per_side,
            extent,
            cell,
            partitions,
        }
    }

    /// Partitions in row-major order.
    #[must_use]
    pub fn partitions(&self) -> &[RenderPartition] {
        &self.partitions
    }

    /// Partitions per side.
    #[must_use]
    pub const fn per_side(&self) -> u32 {
        self.per_side
    }

    /// Index of the partition owning a chunk-local position.
    ///
    /// Positions outside the chunk clamp to the nearest edge partition.
    #[must_use]
    pub fn index_for(&self, local: Vec2) -> usize {
        let max = self.per_side - 1;
        // Row 0 holds every column's x range, column 0 every row's y range.
        let column = |i: u32| self.partitions[i as usize].local_bounds;
        let row = |i: u32| self.partitions[(i * self.per_side) as usize].local_bounds;

        let px = Self::axis_index(local.x, self.cell, max, |i| column(i).x, |i| column(i).right());
        let py = Self::axis_index(local.y, self.cell, max, |i| row(i).y, |i| row(i).bottom());
        (py * self.per_side + px) as usize
    }

    fn axis_index(
        v: f32,
        cell: f32,
        max: u32,
        start: impl Fn(u32) -> f32,
        end: impl Fn(u32) -> f32,
    ) -> u32 {
        if v.is_nan() || v < 0.0 {
            return 0;
        }
        let mut i = ((v / cell) as u32).min(max);
        // Division rounding must agree with the stored bounds.
        while i > 0 && v < start(i) {
            i -= 1;
        }
        while i < max && v >= end(i) {
            i += 1;
        }
        i
    }

    /// Removes every member from every partition.
    pub fn clear(&mut self) {
        for partition in &mut self.partitions {
            partition.members.clear();
        }
    }

    /// Rebuilds membership from scratch for objects at `positions`
    /// (chunk-local).
    pub fn rebuild<I>(&mut self, positions: I)
    where
        I: IntoIterator<Item = Vec2>,
    {
        self.clear();
        for (object, local) in positions.into_iter().enumerate() {
            self.insert(object, local);
        }
    }

    /// Adds object index `object` at chunk-local `local`.
    pub fn insert(&mut self, object: usize, local: Vec2) {
        let index = self.index_for(local);
        if let Some(partition) = self.partitions.get_mut(index) {
            partition.members.push(object);
        }
    }

    /// Moves object index `object` from `from` to `to` (both chunk-local).
    /// Returns true if it changed partitions.
    pub fn relocate(&mut self, object: usize, from: Vec2, to: Vec2) -> bool {
        let old = self.index_for(from);
        let new = self.index_for(to);
        if old == new {
            return false;
        }
        if let Some(partition) = self.partitions.get_mut(old) {
            partition.members.retain(|&m| m != object);
        }
        if let Some(partition) = self.partitions.get_mut(new) {
            partition.members.push(object);
        }
        true
    }

    /// Object indices in partitions overlapping `view_local` (chunk-local).
    pub fn members_overlapping<'a>(&'a self, view_local: &'a Rect) -> impl Iterator<Item = usize> + 'a {
        self.partitions
            .iter()
            .filter(move |p| p.local_bounds.intersects(view_local))
            .flat_map(|p| p.members.iter().copied())
    }

    /// Total number of members over all partitions.
    #[must_use]
    pub fn member_count(&self) -> usize {
        self.partitions.iter().map(|p| p.members.len()).sum()
    }

    /// Side length of the tiled chunk.
    #[must_use]
    pub const fn extent(&self) -> f32 {
        self.extent
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_partition_count() {
        let set = PartitionSet::new(256, 4);
        assert_eq!(set.partitions().len(), 16);
        assert_eq!(set.partitions()[5].local_bounds(), &Rect::new(64.0, 64.0, 64.0, 64.0));
    }

    #[test]
    fn test_boundary_object_is_counted_once() {
        let mut set = PartitionSet::new(100, 2);
        set.rebuild([Vec2::new(50.0, 50.0), Vec2::new(0.0, 0.0)]);
        assert_eq!(set.member_count(), 2);
        // Shared corner goes to the bottom-right partition.
        assert_eq!(set.partitions()[3].members(), &[0]);
        assert_eq!(set.partitions()[0].members(), &[1]);
    }

    #[test]
    fn test_relocate_moves_membership() {
        let mut set = PartitionSet::new(100, 2);
        set.rebuild([Vec2::new(10.0, 10.0)]);
        assert!(set.relocate(0, Vec2::new(10.0, 10.0), Vec2::new(90.0, 10.0)));
        assert!(set.partitions()[0].members().is_empty());
        assert_eq!(set.partitions()[1].members(), &[0]);
        assert!(!set.relocate(0, Vec2::new(90.0, 10.0), Vec2::new(95.0, 20.0)));
    }

    #[test]
    fn test_members_overlapping_skips_far_partitions() {
        let mut set = PartitionSet::new(100, 2);
        set.rebuild([Vec2::new(10.0, 10.0), Vec2::new(90.0, 90.0)]);
        let view = Rect::new(0.0, 0.0, 20.0, 20.0);
        let visible: Vec<_> = set.members_overlapping(&view).collect();
        assert_eq!(visible, vec![0]);
    }

    proptest! {
        #[test]
        fn prop_partitions_tile_chunk(extent in 1u32..2048, per_side in 1u32..16) {
            prop_assume!(per_side <= extent);
            let set = PartitionSet::new(extent, per_side);
            let chunk = Rect::new(0.0, 0.0, extent as f32, extent as f32);

            let total: f32 = set.partitions().iter().map(|p| p.local_bounds().area()).sum();
            prop_assert!((total - chunk.area()).abs() <= chunk.area() * 1e-4);

            for (i, a) in set.partitions().iter().enumerate() {
                prop_assert!(a.local_bounds().x >= 0.0 && a.local_bounds().right() <= extent as f32);
                prop_assert!(a.local_bounds().y >= 0.0 && a.local_bounds().bottom() <= extent as f32);
                for b in &set.partitions()[i + 1..] {
                    prop_assert!(a.local_bounds().overlap_area(b.local_bounds()) <= 1e-3);
                }
            }
        }

        #[test]
        fn prop_every_object_in_exactly_one_partition(
            points in proptest::collection::vec((0.0f32..256.0, 0.0f32..256.0), 0..64),
            per_side in 1u32..9,
        ) {
            let mut set = PartitionSet::new(256, per_side);
            set.rebuild(points.iter().map(|&(x, y)| Vec2::new(x, y)));
            prop_assert_eq!(set.member_count(), points.len());

            for (object, &(x, y)) in points.iter().enumerate() {
                let owners: Vec<_> = set
                    .partitions()
                    .iter()
                    .filter(|p| p.members().contains(&object))
                    .collect();
                prop_assert_eq!(owners.len(), 1);
                prop_assert!(owners[0].local_bounds().contains_point(Vec2::new(x, y)));
            }
        }
    }
}
