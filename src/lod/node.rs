//! Immutable LOD tree node

use crate::math::BoundingSphere;
use crate::points::PointBuffer;

/// One region of the LOD tree: its representative splats, a bounding sphere
/// enclosing them and every descendant, and the ids of its children.
///
/// Children are referenced by id only; the streaming side attaches loaded
/// children separately. `points.weights` is populated at build time and is
/// never persisted.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LodNode {
    pub id: u32,
    pub bounding_sphere: BoundingSphere,
    pub points: PointBuffer,
    pub child_ids: Vec<u32>,
}

impl LodNode {
    pub fn point_count(&self) -> usize {
        self.points.len()
    }

    pub fn is_leaf(&self) -> bool {
        self.child_ids.is_empty()
    }
}

/// Hands out node ids: monotonically increasing, never reused
#[derive(Clone, Debug, Default)]
pub struct IdAllocator {
    next: u32,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start numbering at `first`
    pub fn starting_at(first: u32) -> Self {
        Self { next: first }
    }

    pub fn allocate(&mut self) -> u32 {
        assert!(self.next != u32::MAX, "LOD node id space exhausted");
        let id = self.next;
        self.next += 1;
        id
    }

    /// Id the next call to `allocate` will return
    pub fn peek(&self) -> u32 {
        self.next
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_monotonic() {
        let mut ids = IdAllocator::starting_at(5);
        assert_eq!(ids.allocate(), 5);
        assert_eq!(ids.allocate(), 6);
        assert_eq!(ids.peek(), 7);
    }

    #[test]
    fn test_leaf() {
        let node = LodNode { id: 1, ..Default::default() };
        assert!(node.is_leaf());
        assert_eq!(node.point_count(), 0);
    }
}
