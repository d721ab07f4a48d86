//! Complete in-memory LOD tree and the build entry point

use std::collections::HashMap;

use glam::Vec3;
use rand::SeedableRng;
use rand::rngs::StdRng;

use super::node::{IdAllocator, LodNode};
use crate::math::Aabb;
use crate::octree::{BuildConfig, OctreeBuilder, SubgridReducer};
use crate::points::Point;

/// All nodes produced by one build, addressable by id
#[derive(Clone, Debug)]
pub struct LodTree {
    nodes: Vec<LodNode>,
    index: HashMap<u32, usize>,
    root_id: u32,
}

impl LodTree {
    /// Wrap `nodes` (any order). `root_id` must name one of them.
    pub fn new(nodes: Vec<LodNode>, root_id: u32) -> Self {
        let index: HashMap<u32, usize> = nodes.iter().enumerate().map(|(i, n)| (n.id, i)).collect();
        assert_eq!(index.len(), nodes.len(), "duplicate LOD node ids");
        assert!(index.contains_key(&root_id), "root id {} not among nodes", root_id);
        Self { nodes, index, root_id }
    }

    pub fn root_id(&self) -> u32 {
        self.root_id
    }

    pub fn root(&self) -> &LodNode {
        &self.nodes[self.index[&self.root_id]]
    }

    pub fn get(&self, id: u32) -> Option<&LodNode> {
        self.index.get(&id).map(|&i| &self.nodes[i])
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &LodNode> {
        self.nodes.iter()
    }

    pub fn into_nodes(self) -> Vec<LodNode> {
        self.nodes
    }

    /// Total splats stored across all levels
    pub fn total_points(&self) -> usize {
        self.nodes.iter().map(|n| n.point_count()).sum()
    }

    /// Levels below the root (0 for a lone root)
    pub fn depth(&self) -> u32 {
        let mut depth = 0;
        let mut frontier = vec![(self.root_id, 0u32)];
        while let Some((id, level)) = frontier.pop() {
            depth = depth.max(level);
            if let Some(node) = self.get(id) {
                frontier.extend(node.child_ids.iter().map(|&c| (c, level + 1)));
            }
        }
        depth
    }

    /// Parent/child pairs whose spheres break the containment invariant
    pub fn containment_violations(&self, epsilon: f32) -> Vec<(u32, u32)> {
        let mut violations = Vec::new();
        for node in &self.nodes {
            for &child_id in &node.child_ids {
                if let Some(child) = self.get(child_id) {
                    if !node.bounding_sphere.contains_sphere(&child.bounding_sphere, epsilon) {
                        violations.push((node.id, child_id));
                    }
                }
            }
        }
        violations
    }
}

/// Build a LOD tree over `points` in one call.
///
/// The root cube is the bounding cube of the input. Zero points give a tree
/// with a single empty root.
pub fn build_lod_tree(points: &[Point], config: &BuildConfig) -> LodTree {
    let positions: Vec<Vec3> = points.iter().map(|p| p.position()).collect();
    let bounds = Aabb::from_points(&positions);
    drop(positions);

    let mut builder = OctreeBuilder::from_bounds(&bounds, config);
    builder.add_points(points);
    log::info!(
        "octree built: {} points, {} nodes, depth {}, {} expansions",
        builder.point_count(),
        builder.node_count(),
        builder.depth(),
        builder.expansions()
    );

    let reducer = SubgridReducer::new(config.resolution).with_jitter(config.jitter);
    let mut rng = StdRng::seed_from_u64(config.seed);
    let tree = builder.compute_lod(&reducer, &mut IdAllocator::new(), &mut rng);
    log::info!(
        "LOD tree: {} nodes, {} stored points, depth {}",
        tree.len(),
        tree.total_points(),
        tree.depth()
    );
    tree
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid_cloud(n: usize) -> Vec<Point> {
        (0..n * n * n)
            .map(|i| {
                let (x, y, z) = (i % n, (i / n) % n, i / (n * n));
                Point::new(Vec3::new(x as f32, y as f32, z as f32) * 0.1, 0.05, Vec3::splat(0.7), Vec3::Y)
            })
            .collect()
    }

    #[test]
    fn test_build_empty() {
        let tree = build_lod_tree(&[], &BuildConfig::default());
        assert_eq!(tree.len(), 1);
        assert_eq!(tree.root().point_count(), 0);
        assert_eq!(tree.depth(), 0);
    }

    #[test]
    fn test_build_single_point() {
        let p = Point::at(Vec3::new(3.0, -2.0, 1.0));
        let tree = build_lod_tree(&[p], &BuildConfig::default());
        assert_eq!(tree.root().points.total_weight(), 1.0);
        assert!(tree.root().points.positions[0].distance(p.position()) < 1e-5);
    }

    #[test]
    fn test_build_grid() {
        let points = grid_cloud(12);
        let config = BuildConfig { resolution: 4, max_depth: 6, ..Default::default() };
        let tree = build_lod_tree(&points, &config);

        assert_eq!(tree.root().points.total_weight(), points.len() as f64);
        assert!(tree.root().point_count() <= 64);
        assert!(tree.depth() >= 1);
        assert!(tree.containment_violations(1e-4).is_empty());

        // Leaves together hold every raw point exactly once
        let leaf_weight: f64 = tree.iter().filter(|n| n.is_leaf()).map(|n| n.points.total_weight()).sum();
        assert_eq!(leaf_weight, points.len() as f64);
    }

    #[test]
    fn test_seeded_builds_are_reproducible() {
        let points = grid_cloud(8);
        let config = BuildConfig { resolution: 3, max_depth: 4, ..Default::default() };
        let a = build_lod_tree(&points, &config);
        let b = build_lod_tree(&points, &config);
        assert_eq!(a.len(), b.len());
        assert_eq!(a.root(), b.root());
    }

    #[test]
    fn test_get_unknown_id() {
        let tree = build_lod_tree(&[], &BuildConfig::default());
        assert!(tree.get(999).is_none());
    }
}
