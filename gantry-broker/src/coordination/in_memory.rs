//! In-process coordination service with ZooKeeper-shaped semantics.
//!
//! Backs tests, embedded multi-broker clusters, and standalone deployments.
//! A production deployment points the same [`Coordination`] trait at an
//! external coordination cluster instead.

// Layer 1: Standard library imports
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

// Layer 2: Third-party crate imports
use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;

// Layer 3: Internal module imports
use super::error::CoordinationError;
use super::traits::Coordination;

#[derive(Debug)]
struct NodeEntry {
    data: Vec<u8>,
    /// Owning session for ephemeral nodes; `None` marks a container.
    owner: Option<u64>,
}

#[derive(Debug, Default)]
struct RegistryState {
    nodes: BTreeMap<String, NodeEntry>,
    sequences: HashMap<String, u32>,
    watchers: HashMap<String, Vec<mpsc::UnboundedSender<Vec<String>>>>,
    next_session: u64,
}

#[derive(Debug, Default)]
struct Registry {
    state: Mutex<RegistryState>,
}

fn parent_of(path: &str) -> &str {
    match path.rfind('/') {
        Some(0) | None => "/",
        Some(idx) => &path[..idx],
    }
}

impl Registry {
    /// Direct children of `parent`, as names relative to it.
    fn children_locked(state: &RegistryState, parent: &str) -> Vec<String> {
        let prefix = if parent == "/" {
            "/".to_string()
        } else {
            format!("{parent}/")
        };
        state
            .nodes
            .keys()
            .filter_map(|path| path.strip_prefix(&prefix))
            .filter(|rest| !rest.is_empty() && !rest.contains('/'))
            .map(str::to_string)
            .collect()
    }

    fn notify_locked(state: &mut RegistryState, parent: &str) {
        let children = Self::children_locked(state, parent);
        if let Some(watchers) = state.watchers.get_mut(parent) {
            watchers.retain(|sender| sender.send(children.clone()).is_ok());
        }
    }

    /// Delete every node owned by `session` and wake the affected watchers.
    fn close_session(&self, session: u64) {
        let mut state = self.state.lock();
        let doomed: Vec<String> = state
            .nodes
            .iter()
            .filter(|(_, entry)| entry.owner == Some(session))
            .map(|(path, _)| path.clone())
            .collect();
        let mut parents: Vec<String> = Vec::new();
        for path in doomed {
            state.nodes.remove(&path);
            let parent = parent_of(&path).to_string();
            if !parents.contains(&parent) {
                parents.push(parent);
            }
        }
        for parent in parents {
            Self::notify_locked(&mut state, &parent);
        }
    }
}

/// Shared in-process coordination service.
///
/// Each broker obtains its own [`CoordinationSession`]; ephemeral nodes die
/// with the session that created them, which is what drives failover in an
/// embedded cluster.
///
/// # Example
/// ```rust,ignore
/// let service = InMemoryCoordination::new();
/// let session_a = service.session();
/// let session_b = service.session();
/// // both sessions see the same namespace
/// ```
#[derive(Debug, Clone, Default)]
pub struct InMemoryCoordination {
    registry: Arc<Registry>,
}

impl InMemoryCoordination {
    /// Create an empty coordination namespace.
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a new session against this namespace.
    pub fn session(&self) -> CoordinationSession {
        let id = {
            let mut state = self.registry.state.lock();
            state.next_session += 1;
            state.next_session
        };
        CoordinationSession {
            id,
            registry: Arc::clone(&self.registry),
            closed: Arc::new(AtomicBool::new(false)),
        }
    }
}

/// One broker's session against an [`InMemoryCoordination`] namespace.
///
/// Dropping the session (or calling [`Coordination::close`]) deletes its
/// ephemeral nodes, mirroring a coordination session expiry.
#[derive(Debug)]
pub struct CoordinationSession {
    id: u64,
    registry: Arc<Registry>,
    closed: Arc<AtomicBool>,
}

impl CoordinationSession {
    fn check_open(&self) -> Result<(), CoordinationError> {
        if self.closed.load(Ordering::Acquire) {
            Err(CoordinationError::SessionClosed)
        } else {
            Ok(())
        }
    }

    fn create_node(
        &self,
        path: &str,
        data: &[u8],
        ephemeral: bool,
    ) -> Result<(), CoordinationError> {
        let mut state = self.registry.state.lock();
        let parent = parent_of(path).to_string();
        if parent != "/" && !state.nodes.contains_key(&parent) {
            return Err(CoordinationError::NoNode(parent));
        }
        if state.nodes.contains_key(path) {
            return Err(CoordinationError::NodeExists(path.to_string()));
        }
        state.nodes.insert(
            path.to_string(),
            NodeEntry {
                data: data.to_vec(),
                owner: ephemeral.then_some(self.id),
            },
        );
        Registry::notify_locked(&mut state, &parent);
        Ok(())
    }
}

#[async_trait]
impl Coordination for CoordinationSession {
    async fn ensure_container(&self, path: &str) -> Result<(), CoordinationError> {
        self.check_open()?;
        let mut state = self.registry.state.lock();
        if !state.nodes.contains_key(path) {
            state.nodes.insert(
                path.to_string(),
                NodeEntry {
                    data: Vec::new(),
                    owner: None,
                },
            );
        }
        Ok(())
    }

    async fn create_ephemeral(&self, path: &str, data: &[u8]) -> Result<(), CoordinationError> {
        self.check_open()?;
        self.create_node(path, data, true)
    }

    async fn create_ephemeral_sequential(
        &self,
        prefix: &str,
        data: &[u8],
    ) -> Result<u32, CoordinationError> {
        self.check_open()?;
        let sequence = {
            let mut state = self.registry.state.lock();
            let counter = state.sequences.entry(prefix.to_string()).or_insert(0);
            let sequence = *counter;
            *counter += 1;
            sequence
        };
        let path = format!("{prefix}{sequence:010}");
        self.create_node(&path, data, true)?;
        Ok(sequence)
    }

    async fn get_data(&self, path: &str) -> Result<Option<Vec<u8>>, CoordinationError> {
        self.check_open()?;
        let state = self.registry.state.lock();
        Ok(state.nodes.get(path).map(|entry| entry.data.clone()))
    }

    async fn watch_children(
        &self,
        path: &str,
    ) -> Result<(Vec<String>, mpsc::UnboundedReceiver<Vec<String>>), CoordinationError> {
        self.check_open()?;
        let mut state = self.registry.state.lock();
        let current = Registry::children_locked(&state, path);
        let (tx, rx) = mpsc::unbounded_channel();
        state.watchers.entry(path.to_string()).or_default().push(tx);
        Ok((current, rx))
    }

    async fn close(&self) -> Result<(), CoordinationError> {
        if !self.closed.swap(true, Ordering::AcqRel) {
            self.registry.close_session(self.id);
        }
        Ok(())
    }
}

impl Drop for CoordinationSession {
    fn drop(&mut self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            self.registry.close_session(self.id);
        }
    }
}
