//! Pointlod - level-of-detail trees for point splat clouds
//!
//! Builds a sparse octree over raw splats, reduces every node to a bounded
//! set of representative splats, serializes each node as an independent blob
//! and streams the resulting tree against a moving camera.

pub mod core;
pub mod math;
pub mod points;
pub mod octree;
pub mod lod;
pub mod streaming;
