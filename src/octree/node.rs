//! Octree node variants
//!
//! A node is either a `Leaf` buffering raw points or an `Inner` node with
//! exactly eight children addressed by octant (bit 0 = +x, bit 1 = +y,
//! bit 2 = +z). Nodes live in the builder's arena and refer to their
//! children by index.

use glam::Vec3;

use super::reducer::{cell_coord, linear_cell};
use crate::math::Aabb;
use crate::points::{Point, PointBuffer};

/// Index of a node in the builder arena
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NodeIndex(pub u32);

/// Cube covered by a node and how much it may still subdivide
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OctreeNodeInfo {
    pub center: Vec3,
    /// Cube edge length
    pub size: f32,
    /// Subgrid cells per axis
    pub resolution: u32,
    /// Subdivision levels still allowed below this node
    pub depth_remaining: u32,
}

impl OctreeNodeInfo {
    pub fn new(center: Vec3, size: f32, resolution: u32, depth_remaining: u32) -> Self {
        Self { center, size, resolution, depth_remaining }
    }

    pub fn cube(&self) -> Aabb {
        Aabb::from_center_half_extent(self.center, Vec3::splat(self.size * 0.5))
    }

    /// Octant of `pos` relative to the cube center
    pub fn octant_of(&self, pos: Vec3) -> usize {
        (pos.x >= self.center.x) as usize
            | ((pos.y >= self.center.y) as usize) << 1
            | ((pos.z >= self.center.z) as usize) << 2
    }

    /// Info for child `octant`, one level deeper
    pub fn child(&self, octant: usize) -> OctreeNodeInfo {
        debug_assert!(octant < 8);
        let quarter = self.size * 0.25;
        let offset = Vec3::new(
            if octant & 1 != 0 { quarter } else { -quarter },
            if octant & 2 != 0 { quarter } else { -quarter },
            if octant & 4 != 0 { quarter } else { -quarter },
        );
        OctreeNodeInfo {
            center: self.center + offset,
            size: self.size * 0.5,
            resolution: self.resolution,
            depth_remaining: self.depth_remaining.saturating_sub(1),
        }
    }

    pub fn is_max_depth(&self) -> bool {
        self.depth_remaining == 0
    }
}

/// Point-buffering leaf with a subgrid occupancy bitfield
#[derive(Clone, Debug)]
pub struct LeafNode {
    pub info: OctreeNodeInfo,
    pub points: PointBuffer,
    occupancy: Vec<u64>,
    split_needed: bool,
    /// Points this leaf may hold once a collision has been seen
    capacity: usize,
}

impl LeafNode {
    pub fn new(info: OctreeNodeInfo, capacity: usize) -> Self {
        let cells = (info.resolution as usize).pow(3);
        Self {
            info,
            points: PointBuffer::new(),
            occupancy: vec![0; cells.div_ceil(64)],
            split_needed: false,
            capacity,
        }
    }

    /// Buffer `point`, or refuse it when this leaf has to be subdivided.
    ///
    /// Refusal needs both a cell collision and more than `capacity` buffered
    /// points. Leaves at maximum depth accept everything.
    pub fn try_insert(&mut self, point: &Point) -> bool {
        let (cell, stray) = cell_coord(point.position(), &self.info.cube(), self.info.resolution, Vec3::ZERO);
        if stray {
            log::warn!(
                "point {:?} outside leaf cube centered at {:?}, clamping",
                point.position,
                self.info.center
            );
        }
        let c = linear_cell(cell, self.info.resolution);
        let (word, bit) = (c / 64, 1u64 << (c % 64));

        if self.occupancy[word] & bit != 0 {
            self.split_needed = true;
        }
        if self.split_needed && self.points.len() > self.capacity && !self.info.is_max_depth() {
            return false;
        }

        self.occupancy[word] |= bit;
        self.points.push(point);
        true
    }

    pub fn split_needed(&self) -> bool {
        self.split_needed
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Number of distinct occupied subgrid cells
    pub fn occupied_cells(&self) -> u32 {
        self.occupancy.iter().map(|w| w.count_ones()).sum()
    }
}

/// Fully subdivided node; always has all eight children
#[derive(Clone, Debug)]
pub struct InnerNode {
    pub info: OctreeNodeInfo,
    pub children: [NodeIndex; 8],
}

/// Arena-resident octree node
#[derive(Clone, Debug)]
pub enum OctreeNode {
    Leaf(LeafNode),
    Inner(InnerNode),
}

impl OctreeNode {
    pub fn info(&self) -> &OctreeNodeInfo {
        match self {
            OctreeNode::Leaf(leaf) => &leaf.info,
            OctreeNode::Inner(inner) => &inner.info,
        }
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, OctreeNode::Leaf(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(resolution: u32, depth: u32) -> OctreeNodeInfo {
        OctreeNodeInfo::new(Vec3::ZERO, 2.0, resolution, depth)
    }

    #[test]
    fn test_octant_of() {
        let info = info(2, 1);
        assert_eq!(info.octant_of(Vec3::new(-0.5, -0.5, -0.5)), 0);
        assert_eq!(info.octant_of(Vec3::new(0.5, -0.5, -0.5)), 1);
        assert_eq!(info.octant_of(Vec3::new(-0.5, 0.5, -0.5)), 2);
        assert_eq!(info.octant_of(Vec3::new(0.5, 0.5, 0.5)), 7);
    }

    #[test]
    fn test_child_info() {
        let info = info(2, 3);
        let child = info.child(7);
        assert_eq!(child.center, Vec3::splat(0.5));
        assert_eq!(child.size, 1.0);
        assert_eq!(child.depth_remaining, 2);
        assert_eq!(info.child(0).center, Vec3::splat(-0.5));
        // Every child's center maps back to its own octant
        for octant in 0..8 {
            assert_eq!(info.octant_of(info.child(octant).center), octant);
        }
    }

    #[test]
    fn test_leaf_accepts_distinct_cells() {
        let mut leaf = LeafNode::new(info(2, 1), 0);
        for octant in 0..8 {
            let p = Point::at(info(2, 1).child(octant).center);
            assert!(leaf.try_insert(&p));
        }
        assert!(!leaf.split_needed());
        assert_eq!(leaf.occupied_cells(), 8);
    }

    #[test]
    fn test_leaf_refuses_after_collision_and_threshold() {
        let mut leaf = LeafNode::new(info(2, 1), 2);
        let p = Point::at(Vec3::splat(0.5));
        assert!(leaf.try_insert(&p));
        assert!(leaf.try_insert(&p)); // collision, but only 1 buffered
        assert!(leaf.split_needed());
        assert!(leaf.try_insert(&p)); // 2 buffered, not above threshold
        assert!(!leaf.try_insert(&p)); // 3 > 2
        // A fresh cell is refused too once both conditions hold
        assert!(!leaf.try_insert(&Point::at(Vec3::splat(-0.5))));
        assert_eq!(leaf.len(), 3);
    }

    #[test]
    fn test_leaf_without_collision_never_refuses() {
        let mut leaf = LeafNode::new(info(4, 1), 0);
        let mut accepted = 0;
        for x in 0..4 {
            for y in 0..4 {
                let p = Point::at(Vec3::new(-0.75 + x as f32 * 0.5, -0.75 + y as f32 * 0.5, 0.1));
                assert!(leaf.try_insert(&p));
                accepted += 1;
            }
        }
        assert_eq!(leaf.len(), accepted);
        assert!(!leaf.split_needed());
    }

    #[test]
    fn test_max_depth_leaf_never_refuses() {
        let mut leaf = LeafNode::new(info(1, 0), 0);
        for _ in 0..1000 {
            assert!(leaf.try_insert(&Point::at(Vec3::ZERO)));
        }
        assert!(leaf.split_needed());
        assert_eq!(leaf.len(), 1000);
    }
}
