//! View-driven LOD streaming
//!
//! Each frame the controller walks the resident part of the tree breadth
//! first, picks the coarsest node whose projected size is below the
//! threshold, falls back to the best resident node while finer detail is
//! fetched, and periodically evicts subtrees that have gone unused.
//!
//! Fetches run as tokio tasks. Their results are queued on a channel and
//! applied at the start of the next `update`, so the tree is only ever
//! mutated on the caller's thread. A fetch cannot be cancelled; instead every
//! node carries a load generation that is bumped when its children are
//! dropped, and completions carrying an older generation are discarded.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Instant;

use tokio::runtime::{Handle, Runtime};
use tokio::sync::mpsc;
use tokio::task::JoinSet;

use super::arena::{Arena, NodeHandle};
use super::config::StreamingConfig;
use super::loader::{LoadError, Loader, NodeKey};
use super::renderer::{RenderHandle, RenderStats, Renderer};
use crate::lod::LodNode;

/// Runtime state of a node with respect to its children
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoadState {
    /// Children exist in storage but are not resident
    ChildrenNeedLoading,
    /// A fetch for all children is in flight
    ChildrenLoading,
    /// All children resident (or the node has none)
    FullyLoaded,
    /// Fetching children failed; not retried
    ChildrenLoadError,
    /// The node itself is not resident. Never stored on a resident node;
    /// reported by `state_of` for ids that have been evicted or never loaded.
    Unloaded,
}

/// Cumulative counters plus the last frame's draw numbers
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StreamingStats {
    pub nodes_drawn: u32,
    pub points_drawn: u64,
    pub loads_started: u64,
    pub loads_completed: u64,
    pub loads_failed: u64,
    pub loads_discarded: u64,
    pub nodes_unloaded: u64,
}

/// Mutable runtime wrapper around an immutable `LodNode`
struct DynamicNode {
    node: LodNode,
    render_handle: RenderHandle,
    state: LoadState,
    unload_counter: u32,
    children: Vec<NodeHandle>,
    load_generation: u32,
}

impl DynamicNode {
    fn new(node: LodNode, render_handle: RenderHandle) -> Self {
        let state = if node.child_ids.is_empty() {
            LoadState::FullyLoaded
        } else {
            LoadState::ChildrenNeedLoading
        };
        Self {
            node,
            render_handle,
            state,
            unload_counter: 0,
            children: Vec::new(),
            load_generation: 0,
        }
    }
}

/// Finished fetch, queued until the next frame
enum Completion {
    Root(Result<LodNode, LoadError>),
    Children {
        parent: NodeHandle,
        generation: u32,
        result: Result<Vec<LodNode>, LoadError>,
    },
}

/// Streams a persisted LOD tree against a moving camera.
pub struct StreamingController {
    config: StreamingConfig,
    loader: Arc<dyn Loader>,
    nodes: Arena<DynamicNode>,
    by_id: HashMap<u32, NodeHandle>,
    root: Option<NodeHandle>,
    error_loading_root: bool,
    completion_tx: mpsc::UnboundedSender<Completion>,
    completion_rx: mpsc::UnboundedReceiver<Completion>,
    /// Completions received but not applied yet
    ready: Vec<Completion>,
    /// Fetch tasks spawned whose completion has not been received
    in_flight: usize,
    frame: u64,
    render_list: Vec<RenderHandle>,
    stats: StreamingStats,
    handle: Handle,
    /// Owned runtime when not spawning onto the caller's
    #[allow(dead_code)]
    runtime: Option<Runtime>,
}

impl StreamingController {
    /// Create a controller with its own multi-thread tokio runtime and start
    /// fetching the root.
    ///
    /// The controller owns that runtime, so it must be created and dropped
    /// outside any async context: tokio panics when a runtime is dropped from
    /// within one. Async callers should use `with_handle` instead.
    pub fn new(loader: Arc<dyn Loader>, config: StreamingConfig) -> crate::core::Result<Self> {
        let runtime = Runtime::new()?;
        let handle = runtime.handle().clone();
        Ok(Self::build(loader, config, handle, Some(runtime)))
    }

    /// Create a controller that spawns fetches onto an existing runtime
    pub fn with_handle(loader: Arc<dyn Loader>, config: StreamingConfig, handle: Handle) -> Self {
        Self::build(loader, config, handle, None)
    }

    fn build(loader: Arc<dyn Loader>, config: StreamingConfig, handle: Handle, runtime: Option<Runtime>) -> Self {
        let (completion_tx, completion_rx) = mpsc::unbounded_channel();
        let mut controller = Self {
            config,
            loader,
            nodes: Arena::new(),
            by_id: HashMap::new(),
            root: None,
            error_loading_root: false,
            completion_tx,
            completion_rx,
            ready: Vec::new(),
            in_flight: 0,
            frame: 0,
            render_list: Vec::new(),
            stats: StreamingStats::default(),
            handle,
            runtime,
        };
        controller.start_root_load();
        controller
    }

    fn start_root_load(&mut self) {
        let loader = Arc::clone(&self.loader);
        let tx = self.completion_tx.clone();
        self.in_flight += 1;
        self.stats.loads_started += 1;
        self.handle.spawn(async move {
            let result = loader.load_node(NodeKey::Root).await;
            let _ = tx.send(Completion::Root(result));
        });
    }

    /// Run one frame: apply finished fetches, sweep stale detail when due,
    /// select nodes for the current view and render them.
    pub fn update(&mut self, renderer: &mut dyn Renderer) -> RenderStats {
        self.apply_completions(renderer);

        let interval = self.config.unload_interval.max(1) as u64;
        if self.frame > 0 && self.frame % interval == 0 {
            self.sweep(renderer);
        }

        self.render_list.clear();
        if let Some(root) = self.root {
            self.traverse(root, renderer);
        }

        let drawn = renderer.render(&self.render_list);
        self.stats.nodes_drawn = drawn.nodes_drawn;
        self.stats.points_drawn = drawn.points_drawn;
        self.frame += 1;
        drawn
    }

    fn traverse(&mut self, root: NodeHandle, renderer: &mut dyn Renderer) {
        let mut frontier = VecDeque::from([root]);
        let mut to_load = Vec::new();

        while let Some(handle) = frontier.pop_front() {
            let Some(dyn_node) = self.nodes.get_mut(handle) else {
                continue;
            };
            let sphere = dyn_node.node.bounding_sphere;

            if !renderer.is_sphere_in_frustum(&sphere) {
                dyn_node.unload_counter += 1;
                continue;
            }

            let size = renderer.projected_sphere_size(&sphere);
            if size < self.config.size_threshold {
                self.render_list.push(dyn_node.render_handle);
                dyn_node.unload_counter += 1;
                continue;
            }

            if dyn_node.node.child_ids.is_empty() {
                // Finest level available
                self.render_list.push(dyn_node.render_handle);
                continue;
            }

            match dyn_node.state {
                LoadState::FullyLoaded => {
                    dyn_node.unload_counter = 0;
                    frontier.extend(dyn_node.children.iter().copied());
                }
                LoadState::ChildrenNeedLoading => {
                    self.render_list.push(dyn_node.render_handle);
                    to_load.push(handle);
                }
                LoadState::ChildrenLoading | LoadState::ChildrenLoadError => {
                    self.render_list.push(dyn_node.render_handle);
                }
                // Resident nodes never carry this state
                LoadState::Unloaded => {}
            }
        }

        for handle in to_load {
            self.start_child_load(handle);
        }
    }

    fn start_child_load(&mut self, handle: NodeHandle) {
        let Some(dyn_node) = self.nodes.get_mut(handle) else {
            return;
        };
        dyn_node.state = LoadState::ChildrenLoading;
        let generation = dyn_node.load_generation;
        let ids = dyn_node.node.child_ids.clone();
        log::debug!("loading {} children of node {}", ids.len(), dyn_node.node.id);

        let loader = Arc::clone(&self.loader);
        let tx = self.completion_tx.clone();
        self.in_flight += 1;
        self.stats.loads_started += 1;
        self.handle.spawn(async move {
            let result = fetch_children(loader, ids).await;
            let _ = tx.send(Completion::Children { parent: handle, generation, result });
        });
    }

    fn receive_completions(&mut self) {
        while let Ok(completion) = self.completion_rx.try_recv() {
            self.in_flight = self.in_flight.saturating_sub(1);
            self.ready.push(completion);
        }
    }

    fn apply_completions(&mut self, renderer: &mut dyn Renderer) {
        self.receive_completions();
        for completion in std::mem::take(&mut self.ready) {
            match completion {
                Completion::Root(result) => self.apply_root(result, renderer),
                Completion::Children { parent, generation, result } => {
                    self.apply_children(parent, generation, result, renderer)
                }
            }
        }
    }

    fn apply_root(&mut self, result: Result<LodNode, LoadError>, renderer: &mut dyn Renderer) {
        match result {
            Ok(node) => {
                log::info!(
                    "root node {} loaded: {} points, {} children",
                    node.id,
                    node.point_count(),
                    node.child_ids.len()
                );
                let id = node.id;
                let render_handle = renderer.add_data(&node.points);
                let handle = self.nodes.insert(DynamicNode::new(node, render_handle));
                self.by_id.insert(id, handle);
                self.root = Some(handle);
                self.stats.loads_completed += 1;
            }
            Err(err) => {
                log::warn!("failed to load root node: {}", err);
                self.error_loading_root = true;
                self.stats.loads_failed += 1;
            }
        }
    }

    fn apply_children(
        &mut self,
        parent: NodeHandle,
        generation: u32,
        result: Result<Vec<LodNode>, LoadError>,
        renderer: &mut dyn Renderer,
    ) {
        let current = self
            .nodes
            .get(parent)
            .filter(|p| p.load_generation == generation && p.state == LoadState::ChildrenLoading);
        if current.is_none() {
            // Parent was evicted or reset while the fetch was in flight.
            // Nothing was uploaded for these results yet, so dropping them
            // releases everything.
            log::debug!("discarding stale child load");
            self.stats.loads_discarded += 1;
            return;
        }

        match result {
            Ok(children) => {
                let mut handles = Vec::with_capacity(children.len());
                for child in children {
                    let id = child.id;
                    let render_handle = renderer.add_data(&child.points);
                    let handle = self.nodes.insert(DynamicNode::new(child, render_handle));
                    if self.by_id.insert(id, handle).is_some() {
                        log::warn!("node {} loaded twice, keeping newest", id);
                    }
                    handles.push(handle);
                }
                if let Some(p) = self.nodes.get_mut(parent) {
                    log::debug!("node {}: {} children resident", p.node.id, handles.len());
                    p.children = handles;
                    p.state = LoadState::FullyLoaded;
                }
                self.stats.loads_completed += 1;
            }
            Err(err) => {
                if let Some(p) = self.nodes.get_mut(parent) {
                    log::warn!("failed to load children of node {}: {}", p.node.id, err);
                    p.state = LoadState::ChildrenLoadError;
                }
                self.stats.loads_failed += 1;
            }
        }
    }

    /// Evict the children of every node whose unload counter exceeds the
    /// remaining budget. Below a node that stays, the budget shrinks by that
    /// node's own counter.
    fn sweep(&mut self, renderer: &mut dyn Renderer) {
        let Some(root) = self.root else {
            return;
        };
        let mut stack = vec![(root, self.config.unload_threshold)];
        while let Some((handle, budget)) = stack.pop() {
            let Some(dyn_node) = self.nodes.get(handle) else {
                continue;
            };
            if dyn_node.unload_counter > budget {
                self.unload_children(handle, renderer);
            } else {
                let remaining = budget - dyn_node.unload_counter;
                stack.extend(dyn_node.children.iter().map(|&c| (c, remaining)));
            }
        }
    }

    /// Drop every descendant of `handle` and reset it to need its children
    fn unload_children(&mut self, handle: NodeHandle, renderer: &mut dyn Renderer) {
        let Some(dyn_node) = self.nodes.get_mut(handle) else {
            return;
        };
        dyn_node.unload_counter = 0;
        match dyn_node.state {
            // Nothing resident below; errors stay terminal
            LoadState::ChildrenNeedLoading | LoadState::ChildrenLoadError | LoadState::Unloaded => return,
            LoadState::FullyLoaded if dyn_node.node.child_ids.is_empty() => return,
            LoadState::FullyLoaded | LoadState::ChildrenLoading => {}
        }
        dyn_node.state = LoadState::ChildrenNeedLoading;
        dyn_node.load_generation = dyn_node.load_generation.wrapping_add(1);
        let mut pending = std::mem::take(&mut dyn_node.children);
        let parent_id = dyn_node.node.id;

        let mut unloaded = 0u64;
        while let Some(child) = pending.pop() {
            if let Some(mut removed) = self.nodes.remove(child) {
                renderer.remove_node(removed.render_handle);
                if self.by_id.get(&removed.node.id) == Some(&child) {
                    self.by_id.remove(&removed.node.id);
                }
                pending.append(&mut removed.children);
                unloaded += 1;
            }
        }
        if unloaded > 0 {
            log::debug!("unloaded {} nodes below node {}", unloaded, parent_id);
        }
        self.stats.nodes_unloaded += unloaded;
    }

    /// Block the calling thread until every outstanding fetch has reported
    /// back or the configured timeout passes. Results are applied on the
    /// next `update`. Returns `true` if nothing is left in flight.
    ///
    /// Must not be called from inside the runtime's worker threads.
    pub fn wait_for_loads(&mut self) -> bool {
        let deadline = Instant::now() + self.config.load_timeout();
        loop {
            self.receive_completions();
            if self.in_flight == 0 {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            std::thread::sleep(std::time::Duration::from_millis(1));
        }
    }

    /// Sticky flag set when the root could not be fetched
    pub fn error_loading_root(&self) -> bool {
        self.error_loading_root
    }

    pub fn is_root_loaded(&self) -> bool {
        self.root.is_some()
    }

    pub fn root_id(&self) -> Option<u32> {
        self.root.and_then(|h| self.nodes.get(h)).map(|n| n.node.id)
    }

    /// State of node `id`; `Unloaded` when it is not resident
    pub fn state_of(&self, id: u32) -> LoadState {
        self.resident(id).map(|n| n.state).unwrap_or(LoadState::Unloaded)
    }

    pub fn is_resident(&self, id: u32) -> bool {
        self.resident(id).is_some()
    }

    pub fn render_handle_of(&self, id: u32) -> Option<RenderHandle> {
        self.resident(id).map(|n| n.render_handle)
    }

    pub fn unload_counter_of(&self, id: u32) -> Option<u32> {
        self.resident(id).map(|n| n.unload_counter)
    }

    fn resident(&self, id: u32) -> Option<&DynamicNode> {
        self.by_id.get(&id).and_then(|&h| self.nodes.get(h))
    }

    pub fn resident_count(&self) -> usize {
        self.nodes.len()
    }

    /// Fetches spawned whose results have not arrived yet
    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    /// Frames rendered so far
    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn stats(&self) -> StreamingStats {
        self.stats
    }

    /// Handles drawn in the most recent frame
    pub fn render_list(&self) -> &[RenderHandle] {
        &self.render_list
    }

    pub fn config(&self) -> &StreamingConfig {
        &self.config
    }
}

/// Fetch all `ids` concurrently, preserving their order. Any failure fails
/// the whole batch.
async fn fetch_children(loader: Arc<dyn Loader>, ids: Vec<u32>) -> Result<Vec<LodNode>, LoadError> {
    let mut tasks = JoinSet::new();
    for (slot, &id) in ids.iter().enumerate() {
        let fetch = loader.load_node(NodeKey::Id(id));
        tasks.spawn(async move { (slot, fetch.await) });
    }

    let mut fetched: Vec<Option<LodNode>> = vec![None; ids.len()];
    while let Some(joined) = tasks.join_next().await {
        let (slot, result) = joined.map_err(|e| LoadError::Transport(e.to_string()))?;
        let node = result?;
        if node.id != ids[slot] {
            log::warn!("requested node {} but storage returned node {}", ids[slot], node.id);
        }
        fetched[slot] = Some(node);
    }
    Ok(fetched.into_iter().flatten().collect())
}
