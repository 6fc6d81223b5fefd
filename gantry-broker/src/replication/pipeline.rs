//! Primary-side replication pipeline: ordered update streams per follower.

// Layer 1: Standard library imports
// (none)

// Layer 2: Third-party crate imports
use dashmap::DashMap;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

// Layer 3: Internal module imports
use super::traits::ReplicaSync;
use gantry_mq::message::{Dependency, Message, MessageId, MessageState};
use gantry_mq::snapshot::SnapshotSdto;

/// One live state-changing operation mirrored from the primary.
///
/// Snapshot catch-up is not an op: each follower's stream opens with a full
/// snapshot before any of these are drained.
#[derive(Debug, Clone)]
pub enum SyncOp {
    /// Messages pushed into a queue, ids pre-assigned.
    AddMessages {
        /// Target queue name.
        queue: String,
        /// The pushed messages.
        messages: Vec<Message>,
        /// Dependency list shared by the whole batch.
        deps: Vec<Dependency>,
    },
    /// A message advanced its lifecycle state.
    SetState {
        /// Target queue name.
        queue: String,
        /// The affected message.
        id: MessageId,
        /// The state it advanced to.
        state: MessageState,
    },
}

#[derive(Debug)]
struct FollowerHandle {
    address: String,
    tx: mpsc::UnboundedSender<SyncOp>,
    task: JoinHandle<()>,
}

/// Fans state-changing operations out to every registered follower.
///
/// Each follower gets its own unbounded, ordered queue drained by a
/// forwarding task. The task's first action, taken only once the follower is
/// registered for broadcasts, is to capture and ship a full snapshot; every
/// mutation therefore reaches the follower either inside the snapshot or as
/// a queued op behind it. The overlap between the two is harmless because
/// update application is idempotent. Transport failures are logged per
/// follower and never surface to the client operation that produced the
/// update.
#[derive(Debug)]
pub struct ReplicationPipeline<R: ReplicaSync> {
    followers: DashMap<u32, FollowerHandle>,
    _client: std::marker::PhantomData<fn() -> R>,
}

impl<R: ReplicaSync> ReplicationPipeline<R> {
    /// Create a pipeline with no followers.
    pub fn new() -> Self {
        Self {
            followers: DashMap::new(),
            _client: std::marker::PhantomData,
        }
    }

    /// Register a follower and start streaming to it, snapshot first.
    ///
    /// `snapshot_source` is invoked by the forwarding task after the
    /// follower is already receiving broadcasts, closing the window in
    /// which a concurrent mutation could miss both the snapshot and the
    /// stream. Re-registering a node id replaces its stream.
    pub fn add_follower<F>(&self, node_id: u32, address: String, client: R, snapshot_source: F)
    where
        F: FnOnce() -> SnapshotSdto + Send + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let (registered_tx, registered_rx) = oneshot::channel();
        let task = tokio::spawn(forward(node_id, client, rx, registered_rx, snapshot_source));
        debug!(follower = node_id, %address, "follower registered");
        if let Some(previous) = self
            .followers
            .insert(node_id, FollowerHandle { address, tx, task })
        {
            previous.task.abort();
        }
        // Only now may the snapshot be captured.
        let _ = registered_tx.send(());
    }

    /// Whether `node_id` has a registered stream.
    pub fn has_follower(&self, node_id: u32) -> bool {
        self.followers.contains_key(&node_id)
    }

    /// The address a follower was registered under.
    pub fn follower_address(&self, node_id: u32) -> Option<String> {
        self.followers
            .get(&node_id)
            .map(|handle| handle.address.clone())
    }

    /// Drop every follower not present in `live`.
    pub fn retain(&self, live: &[u32]) {
        self.followers.retain(|node_id, handle| {
            let keep = live.contains(node_id);
            if !keep {
                debug!(follower = node_id, "follower departed");
                handle.task.abort();
            }
            keep
        });
    }

    /// Enqueue `op` on every follower's stream.
    pub fn broadcast(&self, op: SyncOp) {
        for entry in self.followers.iter() {
            // A closed receiver only means the forwarder is gone; membership
            // reconciliation will drop the handle.
            let _ = entry.value().tx.send(op.clone());
        }
    }

    /// Registered follower ids.
    pub fn follower_ids(&self) -> Vec<u32> {
        self.followers.iter().map(|entry| *entry.key()).collect()
    }
}

impl<R: ReplicaSync> Default for ReplicationPipeline<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: ReplicaSync> Drop for ReplicationPipeline<R> {
    fn drop(&mut self) {
        for entry in self.followers.iter() {
            entry.value().task.abort();
        }
    }
}

/// Ship the catch-up snapshot, then drain the follower's op stream in order.
async fn forward<R, F>(
    node_id: u32,
    client: R,
    mut rx: mpsc::UnboundedReceiver<SyncOp>,
    registered: oneshot::Receiver<()>,
    snapshot_source: F,
) where
    R: ReplicaSync,
    F: FnOnce() -> SnapshotSdto + Send + 'static,
{
    if registered.await.is_err() {
        return;
    }
    if let Err(error) = client.sync_snapshot(snapshot_source()).await {
        // The follower keeps applying idempotent live updates, but anything
        // only present in the snapshot stays missing until it re-registers.
        warn!(follower = node_id, %error, "snapshot transfer failed");
    }

    while let Some(op) = rx.recv().await {
        let result = match op {
            SyncOp::AddMessages {
                queue,
                messages,
                deps,
            } => client.sync_add_messages(&queue, messages, deps).await,
            SyncOp::SetState { queue, id, state } => {
                client.sync_set_message_state(&queue, id, state).await
            }
        };
        if let Err(error) = result {
            warn!(follower = node_id, %error, "replication update failed");
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)] // Tests are allowed to use unwrap for simplicity
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use parking_lot::Mutex;

    use crate::replication::error::ReplicationError;

    #[derive(Debug, Default)]
    struct RecordingReplica {
        ops: Arc<Mutex<Vec<String>>>,
        failing: bool,
    }

    #[async_trait]
    impl ReplicaSync for RecordingReplica {
        async fn sync_snapshot(&self, _snapshot: SnapshotSdto) -> Result<(), ReplicationError> {
            if self.failing {
                return Err(ReplicationError::Transport("down".to_string()));
            }
            self.ops.lock().push("snapshot".to_string());
            Ok(())
        }

        async fn sync_add_messages(
            &self,
            queue: &str,
            messages: Vec<Message>,
            _deps: Vec<Dependency>,
        ) -> Result<(), ReplicationError> {
            if self.failing {
                return Err(ReplicationError::Transport("down".to_string()));
            }
            self.ops
                .lock()
                .push(format!("add:{queue}:{}", messages.len()));
            Ok(())
        }

        async fn sync_set_message_state(
            &self,
            queue: &str,
            id: MessageId,
            state: MessageState,
        ) -> Result<(), ReplicationError> {
            if self.failing {
                return Err(ReplicationError::Transport("down".to_string()));
            }
            self.ops.lock().push(format!("set:{queue}:{id}:{state:?}"));
            Ok(())
        }
    }

    async fn wait_until(check: impl Fn() -> bool) {
        for _ in 0..200 {
            if check() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(check(), "condition not reached in time");
    }

    fn msg(raw: u64) -> Message {
        let mut m = Message::new(b"m".as_ref());
        m.id = MessageId::from_raw(raw);
        m
    }

    #[tokio::test]
    async fn snapshot_precedes_live_updates() {
        let pipeline = ReplicationPipeline::<Arc<RecordingReplica>>::new();
        let replica = Arc::new(RecordingReplica::default());
        let ops = Arc::clone(&replica.ops);

        pipeline.add_follower(1, "a:1".to_string(), Arc::clone(&replica), SnapshotSdto::default);
        pipeline.broadcast(SyncOp::AddMessages {
            queue: "jobs".to_string(),
            messages: vec![msg(1)],
            deps: vec![],
        });
        pipeline.broadcast(SyncOp::SetState {
            queue: "jobs".to_string(),
            id: MessageId::from_raw(1),
            state: MessageState::InProgress,
        });

        wait_until(|| ops.lock().len() == 3).await;
        let recorded = ops.lock().clone();
        assert_eq!(recorded[0], "snapshot");
        assert_eq!(recorded[1], "add:jobs:1");
        assert!(recorded[2].starts_with("set:jobs:"));
    }

    #[tokio::test]
    async fn one_failing_follower_does_not_stall_the_rest() {
        let pipeline = ReplicationPipeline::<Arc<RecordingReplica>>::new();
        let healthy = Arc::new(RecordingReplica::default());
        let failing = Arc::new(RecordingReplica {
            ops: Arc::default(),
            failing: true,
        });
        let ops = Arc::clone(&healthy.ops);

        pipeline.add_follower(1, "a:1".to_string(), Arc::clone(&failing), SnapshotSdto::default);
        pipeline.add_follower(2, "a:2".to_string(), Arc::clone(&healthy), SnapshotSdto::default);
        pipeline.broadcast(SyncOp::AddMessages {
            queue: "jobs".to_string(),
            messages: vec![msg(1)],
            deps: vec![],
        });

        wait_until(|| ops.lock().len() == 2).await;
        assert!(failing.ops.lock().is_empty());
    }

    #[tokio::test]
    async fn retain_drops_departed_followers() {
        let pipeline = ReplicationPipeline::<Arc<RecordingReplica>>::new();
        let replica = Arc::new(RecordingReplica::default());
        pipeline.add_follower(1, "a:1".to_string(), Arc::clone(&replica), SnapshotSdto::default);
        pipeline.add_follower(2, "a:2".to_string(), Arc::clone(&replica), SnapshotSdto::default);

        pipeline.retain(&[2]);
        assert!(!pipeline.has_follower(1));
        assert!(pipeline.has_follower(2));
        assert_eq!(pipeline.follower_ids(), vec![2]);
        assert_eq!(pipeline.follower_address(2).as_deref(), Some("a:2"));
    }
}
