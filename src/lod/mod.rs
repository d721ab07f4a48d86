//! LOD tree output and its per-node binary format

pub mod node;
pub mod tree;
pub mod codec;

pub use node::{IdAllocator, LodNode};
pub use tree::{LodTree, build_lod_tree};
pub use codec::{CodecError, decode, encode};
