//! View-dependent loading of persisted LOD trees

pub mod arena;
pub mod config;
pub mod controller;
pub mod loader;
pub mod renderer;
pub mod store;

pub use config::StreamingConfig;
pub use controller::{LoadState, StreamingController, StreamingStats};
pub use loader::{LoadError, LoadFuture, Loader, MemoryLoader, NodeKey};
pub use renderer::{RenderHandle, RenderStats, Renderer};
pub use store::{
    BLOB_EXTENSION, DirectoryLoader, StoreConfig,
    blob_exists, blob_path, delete_blob, load_blob, load_node, save_blob, save_node, save_tree,
};
