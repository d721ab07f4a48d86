//! Node fetching collaborator

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

use thiserror::Error;

use crate::lod::{CodecError, LodNode, LodTree, decode, encode};

/// Storage key of a node blob: the tree entry point or a numeric node id
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NodeKey {
    Root,
    Id(u32),
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeKey::Root => f.write_str("root"),
            NodeKey::Id(id) => write!(f, "{}", id),
        }
    }
}

impl FromStr for NodeKey {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "root" {
            Ok(NodeKey::Root)
        } else {
            s.parse().map(NodeKey::Id)
        }
    }
}

/// Why a node could not be fetched
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LoadError {
    #[error("node {0} not found")]
    NotFound(NodeKey),

    #[error("IO error: {0}")]
    Io(String),

    #[error("decode error: {0}")]
    Codec(#[from] CodecError),

    #[error("transport error: {0}")]
    Transport(String),
}

impl From<std::io::Error> for LoadError {
    fn from(err: std::io::Error) -> Self {
        LoadError::Io(err.to_string())
    }
}

/// Boxed future returned by loaders
pub type LoadFuture = Pin<Box<dyn Future<Output = Result<LodNode, LoadError>> + Send + 'static>>;

/// Fetches node payloads by key. Implementations decide transport and
/// any concurrency limits; the controller issues one call per child.
pub trait Loader: Send + Sync + 'static {
    fn load_node(&self, key: NodeKey) -> LoadFuture;
}

/// Serves encoded blobs from memory.
///
/// Every fetch goes through the binary codec, so it behaves like a store
/// that happens to be instant. Requests are recorded for inspection.
#[derive(Default)]
pub struct MemoryLoader {
    blobs: HashMap<NodeKey, Arc<Vec<u8>>>,
    requests: Mutex<Vec<NodeKey>>,
}

impl MemoryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Encode every node of `tree`; the root is reachable as both
    /// `NodeKey::Root` and its numeric id
    pub fn from_tree(tree: &LodTree) -> Self {
        let mut loader = Self::new();
        for node in tree.iter() {
            loader.insert_node(NodeKey::Id(node.id), node);
        }
        loader.insert_node(NodeKey::Root, tree.root());
        loader
    }

    pub fn insert_node(&mut self, key: NodeKey, node: &LodNode) {
        self.blobs.insert(key, Arc::new(encode(node)));
    }

    pub fn insert_blob(&mut self, key: NodeKey, blob: Vec<u8>) {
        self.blobs.insert(key, Arc::new(blob));
    }

    pub fn remove(&mut self, key: NodeKey) -> bool {
        self.blobs.remove(&key).is_some()
    }

    pub fn len(&self) -> usize {
        self.blobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.is_empty()
    }

    /// Keys requested so far, in request order
    pub fn requests(&self) -> Vec<NodeKey> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

impl Loader for MemoryLoader {
    fn load_node(&self, key: NodeKey) -> LoadFuture {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(key);
        }
        let blob = self.blobs.get(&key).cloned();
        Box::pin(async move {
            let blob = blob.ok_or(LoadError::NotFound(key))?;
            Ok(decode(&blob)?)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::BoundingSphere;
    use glam::Vec3;

    fn node(id: u32, child_ids: Vec<u32>) -> LodNode {
        LodNode {
            id,
            bounding_sphere: BoundingSphere::new(Vec3::ZERO, 1.0),
            child_ids,
            ..Default::default()
        }
    }

    #[test]
    fn test_node_key_display_and_parse() {
        assert_eq!(NodeKey::Root.to_string(), "root");
        assert_eq!(NodeKey::Id(42).to_string(), "42");
        assert_eq!("root".parse::<NodeKey>().unwrap(), NodeKey::Root);
        assert_eq!("17".parse::<NodeKey>().unwrap(), NodeKey::Id(17));
        assert!("leaf".parse::<NodeKey>().is_err());
    }

    #[tokio::test]
    async fn test_memory_loader_roundtrip() {
        let tree = LodTree::new(vec![node(0, vec![]), node(1, vec![0])], 1);
        let loader = MemoryLoader::from_tree(&tree);
        assert_eq!(loader.len(), 3);

        let root = loader.load_node(NodeKey::Root).await.unwrap();
        assert_eq!(root.id, 1);
        assert_eq!(root.child_ids, vec![0]);
        let child = loader.load_node(NodeKey::Id(0)).await.unwrap();
        assert_eq!(child.id, 0);

        assert_eq!(loader.requests(), vec![NodeKey::Root, NodeKey::Id(0)]);
    }

    #[tokio::test]
    async fn test_memory_loader_errors() {
        let mut loader = MemoryLoader::new();
        assert_eq!(loader.load_node(NodeKey::Id(5)).await, Err(LoadError::NotFound(NodeKey::Id(5))));

        loader.insert_blob(NodeKey::Root, vec![2, 0, 0, 0]);
        let err = loader.load_node(NodeKey::Root).await.unwrap_err();
        assert_eq!(err, LoadError::Codec(CodecError::InvalidVersion { found: 2 }));
    }
}
