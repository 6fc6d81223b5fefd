//! Coordination service abstraction: the broker's view of its ZooKeeper-like
//! backend.

// Layer 1: Standard library imports
// (none)

// Layer 2: Third-party crate imports
use async_trait::async_trait;
use tokio::sync::mpsc;

// Layer 3: Internal module imports
use super::error::CoordinationError;

/// Root container for everything Gantry stores in the coordination service.
pub const ROOT_PATH: &str = "/gantry";
/// Container for broker membership and leader advertisement.
pub const BROKER_PATH: &str = "/gantry/broker";
/// Container for id block allocation.
pub const ID_PATH: &str = "/gantry/id";
/// Parent of the ephemeral sequential member nodes.
pub const NODES_PATH: &str = "/gantry/broker/nodes";
/// Ephemeral node advertising the current leader's address.
pub const LEADER_PATH: &str = "/gantry/broker/leader";
/// Prefix for ephemeral sequential id block nodes.
pub const ID_BLOCK_PREFIX: &str = "/gantry/id/block-";
/// Prefix for ephemeral sequential member nodes.
pub const NODE_PREFIX: &str = "/gantry/broker/nodes/node-";

/// Containers created at startup when absent.
pub const CONTAINER_PATHS: [&str; 4] = [ROOT_PATH, BROKER_PATH, ID_PATH, NODES_PATH];

/// One broker's session against the coordination service.
///
/// The trait mirrors the small slice of ZooKeeper semantics the broker
/// relies on: containers, ephemeral nodes scoped to the session's lifetime,
/// ephemeral *sequential* nodes whose suffix is a monotonically increasing
/// number, and child watches. The production backend is an external
/// collaborator; the bundled [`super::InMemoryCoordination`] implements the
/// same contract for tests and standalone deployments.
#[async_trait]
pub trait Coordination: Send + Sync + 'static {
    /// Create a persistent container node, succeeding if it already exists.
    async fn ensure_container(&self, path: &str) -> Result<(), CoordinationError>;

    /// Create an ephemeral node carrying `data`.
    ///
    /// # Errors
    ///
    /// `CoordinationError::NodeExists` when the path is already taken.
    async fn create_ephemeral(&self, path: &str, data: &[u8]) -> Result<(), CoordinationError>;

    /// Create an ephemeral sequential node under `prefix` and return the
    /// assigned sequence number.
    async fn create_ephemeral_sequential(
        &self,
        prefix: &str,
        data: &[u8],
    ) -> Result<u32, CoordinationError>;

    /// Read a node's data; `None` when the node does not exist.
    async fn get_data(&self, path: &str) -> Result<Option<Vec<u8>>, CoordinationError>;

    /// Watch the children of `path`.
    ///
    /// Returns the current child names (relative to `path`) plus a stream
    /// that yields the full child list after every change. The watch stays
    /// installed for the life of the receiver.
    async fn watch_children(
        &self,
        path: &str,
    ) -> Result<(Vec<String>, mpsc::UnboundedReceiver<Vec<String>>), CoordinationError>;

    /// End the session, deleting every ephemeral node it created.
    async fn close(&self) -> Result<(), CoordinationError>;
}

/// Parse the sequence suffix of a sequential child name such as
/// `node-0000000007`. Returns `None` for names that do not follow the
/// pattern; membership handling ignores those.
pub fn parse_sequence(child: &str) -> Option<u32> {
    child.rsplit('-').next()?.parse().ok()
}
