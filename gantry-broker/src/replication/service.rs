//! Follower-side application of replication updates.

// Layer 1: Standard library imports
use std::sync::Arc;

// Layer 2: Third-party crate imports
use async_trait::async_trait;
use tracing::debug;

// Layer 3: Internal module imports
use super::error::ReplicationError;
use super::traits::ReplicaSync;
use gantry_mq::dispatch::Dispatcher;
use gantry_mq::message::{Dependency, Message, MessageId, MessageState};
use gantry_mq::queue::MessageQueue;
use gantry_mq::snapshot::SnapshotSdto;

/// Applies a primary's updates to the local dispatcher.
///
/// This is what a broker exposes on its internal surface while it is a
/// follower. Updates are applied verbatim: messages arrive with their ids,
/// state changes advance records monotonically, and a snapshot replaces the
/// whole engine map.
#[derive(Debug)]
pub struct SyncService<Q: MessageQueue> {
    dispatcher: Arc<Dispatcher<Q>>,
}

impl<Q: MessageQueue> SyncService<Q> {
    /// Wrap the local dispatcher.
    pub fn new(dispatcher: Arc<Dispatcher<Q>>) -> Self {
        Self { dispatcher }
    }
}

#[async_trait]
impl<Q: MessageQueue> ReplicaSync for SyncService<Q> {
    async fn sync_snapshot(&self, snapshot: SnapshotSdto) -> Result<(), ReplicationError> {
        debug!(queues = snapshot.queues.len(), "installing snapshot");
        self.dispatcher.install_snapshot(snapshot)?;
        Ok(())
    }

    async fn sync_add_messages(
        &self,
        queue: &str,
        messages: Vec<Message>,
        deps: Vec<Dependency>,
    ) -> Result<(), ReplicationError> {
        self.dispatcher.sync_push(queue, messages, &deps)?;
        Ok(())
    }

    async fn sync_set_message_state(
        &self,
        queue: &str,
        id: MessageId,
        state: MessageState,
    ) -> Result<(), ReplicationError> {
        self.dispatcher.sync_set_state(queue, id, state)?;
        Ok(())
    }
}
