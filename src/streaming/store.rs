//! Node blob files on disk
//!
//! One file per node, named after its key: `<dir>/root.lod` for the entry
//! point and `<dir>/<id>.lod` for everything else. Blobs hold the codec
//! bytes unchanged, optionally wrapped in LZ4 with a prepended size.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::loader::{LoadError, LoadFuture, Loader, NodeKey};
use crate::lod::{LodNode, LodTree, decode, encode};

/// File extension of node blobs
pub const BLOB_EXTENSION: &str = "lod";

/// On-disk framing options
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Wrap each blob in LZ4
    pub compress: bool,
}

/// Path of the blob for `key`
pub fn blob_path(dir: &Path, key: NodeKey) -> PathBuf {
    dir.join(format!("{}.{}", key, BLOB_EXTENSION))
}

/// Frame encoded node bytes for storage
pub fn pack_blob(encoded: Vec<u8>, config: StoreConfig) -> Vec<u8> {
    if config.compress {
        lz4_flex::compress_prepend_size(&encoded)
    } else {
        encoded
    }
}

/// Undo `pack_blob`
pub fn unpack_blob(blob: Vec<u8>, config: StoreConfig) -> io::Result<Vec<u8>> {
    if config.compress {
        lz4_flex::decompress_size_prepended(&blob)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, format!("LZ4 decompression failed: {}", e)))
    } else {
        Ok(blob)
    }
}

/// Write a raw blob, creating `dir` if needed
pub async fn save_blob(dir: &Path, key: NodeKey, blob: &[u8]) -> io::Result<()> {
    tokio::fs::create_dir_all(dir).await?;
    tokio::fs::write(blob_path(dir, key), blob).await
}

/// Read a raw blob; `None` if it does not exist
pub async fn load_blob(dir: &Path, key: NodeKey) -> io::Result<Option<Vec<u8>>> {
    match tokio::fs::read(blob_path(dir, key)).await {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

pub async fn blob_exists(dir: &Path, key: NodeKey) -> bool {
    tokio::fs::try_exists(blob_path(dir, key)).await.unwrap_or(false)
}

pub async fn delete_blob(dir: &Path, key: NodeKey) -> io::Result<()> {
    match tokio::fs::remove_file(blob_path(dir, key)).await {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

/// Encode and write one node under `key`
pub async fn save_node(dir: &Path, key: NodeKey, node: &LodNode, config: StoreConfig) -> io::Result<()> {
    save_blob(dir, key, &pack_blob(encode(node), config)).await
}

/// Read and decode the node stored under `key`
pub async fn load_node(dir: &Path, key: NodeKey, config: StoreConfig) -> Result<LodNode, LoadError> {
    let blob = load_blob(dir, key).await?.ok_or(LoadError::NotFound(key))?;
    let encoded = unpack_blob(blob, config)?;
    Ok(decode(&encoded)?)
}

/// Persist every node of `tree` under its id, plus the root under `root`.
/// Returns the number of blobs written.
pub async fn save_tree(dir: &Path, tree: &LodTree, config: StoreConfig) -> io::Result<usize> {
    let mut written = 0;
    for node in tree.iter() {
        save_node(dir, NodeKey::Id(node.id), node, config).await?;
        written += 1;
    }
    save_node(dir, NodeKey::Root, tree.root(), config).await?;
    written += 1;
    log::info!("saved {} node blobs to {}", written, dir.display());
    Ok(written)
}

/// Loader reading blobs written by `save_tree`
#[derive(Clone, Debug)]
pub struct DirectoryLoader {
    dir: Arc<PathBuf>,
    config: StoreConfig,
}

impl DirectoryLoader {
    pub fn new(dir: impl Into<PathBuf>, config: StoreConfig) -> Self {
        Self { dir: Arc::new(dir.into()), config }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl Loader for DirectoryLoader {
    fn load_node(&self, key: NodeKey) -> LoadFuture {
        let dir = Arc::clone(&self.dir);
        let config = self.config;
        Box::pin(async move { load_node(&dir, key, config).await })
    }
}
