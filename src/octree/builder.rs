//! Arena-backed adaptive octree construction
//!
//! Points are streamed in with `add_point`. A leaf that reports it must split
//! is overwritten in place by an inner node with eight fresh leaves, and its
//! buffered points are re-inserted. `compute_lod` then consumes the arena
//! bottom-up, merging children into coarser representatives.

use rand::Rng;

use super::config::BuildConfig;
use super::node::{InnerNode, LeafNode, NodeIndex, OctreeNode, OctreeNodeInfo};
use super::reducer::SubgridReducer;
use crate::lod::{IdAllocator, LodNode, LodTree};
use crate::math::{Aabb, BoundingSphere};
use crate::points::{Point, PointBuffer};

/// Radius growth above this fraction of the radius is reported when a parent
/// sphere is widened to cover its children
const WIDEN_REPORT_RATIO: f32 = 1e-3;

/// Adaptive octree under construction
pub struct OctreeBuilder {
    nodes: Vec<OctreeNode>,
    root: NodeIndex,
    split_threshold: usize,
    point_count: u64,
    expansions: u64,
}

impl OctreeBuilder {
    /// Start a tree over the cube described by `root_info`.
    ///
    /// The root starts subdivided (eight leaves) unless no depth is allowed.
    pub fn new(root_info: OctreeNodeInfo, split_threshold: usize) -> Self {
        let mut builder = Self {
            nodes: Vec::with_capacity(64),
            root: NodeIndex(0),
            split_threshold,
            point_count: 0,
            expansions: 0,
        };
        builder.nodes.push(OctreeNode::Leaf(LeafNode::new(root_info, split_threshold)));
        if !root_info.is_max_depth() {
            builder.subdivide(builder.root);
        }
        builder
    }

    /// Tree covering the bounding cube of `bounds`, padded slightly so points
    /// on the max faces stay strictly inside
    pub fn from_bounds(bounds: &Aabb, config: &BuildConfig) -> Self {
        let (center, size) = if bounds.is_empty() {
            (glam::Vec3::ZERO, 1.0)
        } else {
            let extent = bounds.max_extent();
            let size = if extent > 0.0 { extent * 1.0001 } else { 1.0 };
            (bounds.center(), size)
        };
        let info = OctreeNodeInfo::new(center, size, config.resolution, config.max_depth);
        Self::new(info, config.split_threshold())
    }

    /// Insert one raw point. Never fails: refusing leaves are expanded.
    pub fn add_point(&mut self, point: &Point) {
        self.insert(self.root, point);
        self.point_count += 1;
    }

    pub fn add_points<'a>(&mut self, points: impl IntoIterator<Item = &'a Point>) {
        for p in points {
            self.add_point(p);
        }
    }

    fn insert(&mut self, start: NodeIndex, point: &Point) {
        let pos = point.position();
        let mut index = start;
        loop {
            let accepted = match &mut self.nodes[index.0 as usize] {
                OctreeNode::Inner(inner) => {
                    index = inner.children[inner.info.octant_of(pos)];
                    continue;
                }
                OctreeNode::Leaf(leaf) => leaf.try_insert(point),
            };
            if accepted {
                return;
            }
            self.expand(index);
        }
    }

    /// Replace the leaf at `index` with an inner node and redistribute its points
    fn expand(&mut self, index: NodeIndex) {
        let old = self.subdivide(index);
        self.expansions += 1;
        log::trace!(
            "expanded leaf {} ({} points, depth remaining {})",
            index.0,
            old.len(),
            old.info.depth_remaining
        );
        for p in old.points.iter() {
            self.insert(index, &p);
        }
    }

    /// Overwrite slot `index` with an inner node over eight new leaves,
    /// returning the leaf that was there
    fn subdivide(&mut self, index: NodeIndex) -> LeafNode {
        let info = *self.nodes[index.0 as usize].info();
        let first = self.nodes.len() as u32;
        let children = std::array::from_fn(|octant| NodeIndex(first + octant as u32));
        for octant in 0..8 {
            self.nodes.push(OctreeNode::Leaf(LeafNode::new(info.child(octant), self.split_threshold)));
        }
        let inner = OctreeNode::Inner(InnerNode { info, children });
        match std::mem::replace(&mut self.nodes[index.0 as usize], inner) {
            OctreeNode::Leaf(leaf) => leaf,
            OctreeNode::Inner(_) => unreachable!("only leaves are subdivided"),
        }
    }

    pub fn root(&self) -> NodeIndex {
        self.root
    }

    pub fn node(&self, index: NodeIndex) -> &OctreeNode {
        &self.nodes[index.0 as usize]
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn leaf_count(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_leaf()).count()
    }

    pub fn point_count(&self) -> u64 {
        self.point_count
    }

    pub fn expansions(&self) -> u64 {
        self.expansions
    }

    /// Deepest level reached (root = 0)
    pub fn depth(&self) -> u32 {
        let root_depth = self.node(self.root).info().depth_remaining;
        self.nodes
            .iter()
            .map(|n| root_depth - n.info().depth_remaining)
            .max()
            .unwrap_or(0)
    }

    /// Consume the octree into a LOD tree held in memory.
    pub fn compute_lod<R: Rng + ?Sized>(self, reducer: &SubgridReducer, ids: &mut IdAllocator, rng: &mut R) -> LodTree {
        let mut nodes = Vec::new();
        let root_id = self.compute_lod_into(reducer, ids, rng, &mut |node| nodes.push(node));
        LodTree::new(nodes, root_id)
    }

    /// Consume the octree, handing each finished LOD node to `sink`.
    ///
    /// A node is emitted once its parent has merged it, so at most one level
    /// per open branch is held in memory. The root is emitted last and its id
    /// returned. An empty tree still yields one empty root node.
    pub fn compute_lod_into<R: Rng + ?Sized>(
        self,
        reducer: &SubgridReducer,
        ids: &mut IdAllocator,
        rng: &mut R,
        sink: &mut dyn FnMut(LodNode),
    ) -> u32 {
        let root_info = *self.node(self.root).info();
        let root = self.root;
        let mut slots: Vec<Option<OctreeNode>> = self.nodes.into_iter().map(Some).collect();

        let root_node = lod_for(&mut slots, root, reducer, ids, rng, sink).unwrap_or_else(|| LodNode {
            id: ids.allocate(),
            bounding_sphere: BoundingSphere::new(root_info.center, 0.0),
            points: PointBuffer::new(),
            child_ids: Vec::new(),
        });
        let root_id = root_node.id;
        log::debug!(
            "root LOD node {} holds {} points (weight {})",
            root_id,
            root_node.point_count(),
            root_node.points.total_weight()
        );
        sink(root_node);
        root_id
    }
}

/// Post-order reduction of the subtree at `index`. Returns `None` for a
/// subtree without points; such subtrees get no id and no node.
fn lod_for<R: Rng + ?Sized>(
    slots: &mut [Option<OctreeNode>],
    index: NodeIndex,
    reducer: &SubgridReducer,
    ids: &mut IdAllocator,
    rng: &mut R,
    sink: &mut dyn FnMut(LodNode),
) -> Option<LodNode> {
    let node = slots[index.0 as usize].take()?;
    match node {
        OctreeNode::Leaf(leaf) => {
            if leaf.is_empty() {
                return None;
            }
            // Finest level keeps the raw samples
            let points = leaf.points;
            let bounding_sphere = BoundingSphere::from_splats(&points.positions, &points.sizes)?;
            Some(LodNode {
                id: ids.allocate(),
                bounding_sphere,
                points,
                child_ids: Vec::new(),
            })
        }
        OctreeNode::Inner(inner) => {
            let mut merged = PointBuffer::new();
            let mut children = Vec::with_capacity(8);
            for &child in &inner.children {
                if let Some(lod) = lod_for(slots, child, reducer, ids, rng, sink) {
                    merged.extend_from(&lod.points);
                    children.push(lod);
                }
            }
            if children.is_empty() {
                return None;
            }

            let points = reducer.reduce_jittered(&merged, &inner.info.cube(), rng);
            drop(merged);
            let mut bounding_sphere = BoundingSphere::from_splats(&points.positions, &points.sizes)?;
            let mut child_ids = Vec::with_capacity(children.len());
            for child in children {
                let grown = bounding_sphere.widen_to_contain(&child.bounding_sphere);
                if grown > bounding_sphere.radius * WIDEN_REPORT_RATIO {
                    log::debug!("widened sphere by {:.5} to contain child {}", grown, child.id);
                }
                child_ids.push(child.id);
                sink(child);
            }

            Some(LodNode {
                id: ids.allocate(),
                bounding_sphere,
                points,
                child_ids,
            })
        }
    }
}
