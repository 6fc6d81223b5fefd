//! In-process sync connector for embedded clusters and tests.

// Layer 1: Standard library imports
use std::sync::Arc;

// Layer 2: Third-party crate imports
use async_trait::async_trait;
use dashmap::DashMap;

// Layer 3: Internal module imports
use super::error::ReplicationError;
use super::traits::{ReplicaSync, SyncConnector};

/// Address registry mapping advertised addresses to local sync services.
///
/// Every broker in an embedded cluster registers its follower-facing service
/// here under its advertised `host:port`; "connecting" is a map lookup. A
/// networked deployment substitutes a connector that dials the address
/// instead.
#[derive(Debug)]
pub struct InProcessConnector<S> {
    targets: DashMap<String, Arc<S>>,
}

impl<S> InProcessConnector<S> {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            targets: DashMap::new(),
        }
    }

    /// Register the sync service listening at `address`.
    pub fn register(&self, address: impl Into<String>, service: Arc<S>) {
        self.targets.insert(address.into(), service);
    }

    /// Remove the registration for `address`.
    pub fn unregister(&self, address: &str) {
        self.targets.remove(address);
    }
}

impl<S> Default for InProcessConnector<S> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<S: ReplicaSync> SyncConnector for Arc<InProcessConnector<S>> {
    type Client = Arc<S>;

    async fn connect(&self, address: &str) -> Result<Self::Client, ReplicationError> {
        self.targets
            .get(address)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| ReplicationError::UnknownFollower(address.to_string()))
    }
}
