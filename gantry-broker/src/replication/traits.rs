//! Replication seams: the follower-facing sync surface and the connector
//! that resolves member addresses to transport handles.

// Layer 1: Standard library imports
use std::sync::Arc;

// Layer 2: Third-party crate imports
use async_trait::async_trait;

// Layer 3: Internal module imports
use super::error::ReplicationError;
use gantry_mq::message::{Dependency, Message, MessageId, MessageState};
use gantry_mq::snapshot::SnapshotSdto;

/// The three state updates a primary ships to its followers.
///
/// This is both the follower-facing RPC surface and the primary's client
/// handle for one follower; the transport carrying it is an external
/// collaborator behind this trait.
#[async_trait]
pub trait ReplicaSync: Send + Sync + 'static {
    /// Replace the follower's entire state with `snapshot`.
    async fn sync_snapshot(&self, snapshot: SnapshotSdto) -> Result<(), ReplicationError>;

    /// Mirror pushed messages (ids pre-assigned) into `queue`.
    async fn sync_add_messages(
        &self,
        queue: &str,
        messages: Vec<Message>,
        deps: Vec<Dependency>,
    ) -> Result<(), ReplicationError>;

    /// Mirror a state transition of one message in `queue`.
    async fn sync_set_message_state(
        &self,
        queue: &str,
        id: MessageId,
        state: MessageState,
    ) -> Result<(), ReplicationError>;
}

#[async_trait]
impl<T: ReplicaSync + ?Sized> ReplicaSync for Arc<T> {
    async fn sync_snapshot(&self, snapshot: SnapshotSdto) -> Result<(), ReplicationError> {
        (**self).sync_snapshot(snapshot).await
    }

    async fn sync_add_messages(
        &self,
        queue: &str,
        messages: Vec<Message>,
        deps: Vec<Dependency>,
    ) -> Result<(), ReplicationError> {
        (**self).sync_add_messages(queue, messages, deps).await
    }

    async fn sync_set_message_state(
        &self,
        queue: &str,
        id: MessageId,
        state: MessageState,
    ) -> Result<(), ReplicationError> {
        (**self).sync_set_message_state(queue, id, state).await
    }
}

/// Resolves a member's advertised address to a [`ReplicaSync`] handle.
///
/// The primary connects to every follower it discovers through membership;
/// what "connect" means is the transport's business. The bundled
/// [`super::InProcessConnector`] hands out direct references for embedded
/// clusters and tests.
#[async_trait]
pub trait SyncConnector: Send + Sync + 'static {
    /// The per-follower client handle this connector produces.
    type Client: ReplicaSync;

    /// Open a sync channel to the member advertised at `address`.
    async fn connect(&self, address: &str) -> Result<Self::Client, ReplicationError>;
}
