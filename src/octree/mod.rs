//! Adaptive point octree and grid reduction

pub mod config;
pub mod node;
pub mod reducer;
pub mod builder;

pub use config::BuildConfig;
pub use node::{NodeIndex, OctreeNode, OctreeNodeInfo, LeafNode, InnerNode};
pub use reducer::SubgridReducer;
pub use builder::OctreeBuilder;
