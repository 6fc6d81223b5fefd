//! Request handler wiring the dispatcher to the replication pipeline.

// Layer 1: Standard library imports
use std::sync::Arc;
use std::time::Duration;

// Layer 2: Third-party crate imports
use async_trait::async_trait;
use tracing::instrument;

// Layer 3: Internal module imports
use super::error::ServiceError;
use super::traits::BrokerApi;
use crate::node::NodeStatus;
use crate::replication::{ReplicaSync, ReplicationPipeline, SyncOp};
use gantry_mq::dispatch::Dispatcher;
use gantry_mq::message::{Dependency, Message, MessageId, MessageState};
use gantry_mq::queue::MessageQueue;

/// Serves client operations on the primary and mirrors every state change
/// to the replication pipeline.
///
/// Mutating operations are refused while this broker is not the leader;
/// clients discover the primary through the coordination service's leader
/// advertisement and retry there.
#[derive(Debug)]
pub struct BrokerHandler<Q: MessageQueue, R: ReplicaSync> {
    dispatcher: Arc<Dispatcher<Q>>,
    pipeline: Arc<ReplicationPipeline<R>>,
    status: Arc<NodeStatus>,
    pop_timeout: Duration,
}

impl<Q: MessageQueue, R: ReplicaSync> BrokerHandler<Q, R> {
    /// Wire a handler over the node's dispatcher and pipeline.
    pub fn new(
        dispatcher: Arc<Dispatcher<Q>>,
        pipeline: Arc<ReplicationPipeline<R>>,
        status: Arc<NodeStatus>,
        pop_timeout: Duration,
    ) -> Self {
        Self {
            dispatcher,
            pipeline,
            status,
            pop_timeout,
        }
    }

    fn require_leader(&self) -> Result<(), ServiceError> {
        if self.status.is_leader() {
            Ok(())
        } else {
            Err(ServiceError::NotLeader)
        }
    }
}

#[async_trait]
impl<Q: MessageQueue, R: ReplicaSync> BrokerApi for BrokerHandler<Q, R> {
    #[instrument(skip(self))]
    async fn get_message(
        &self,
        queue: &str,
        last_id: MessageId,
    ) -> Result<Message, ServiceError> {
        self.require_leader()?;
        let message = self
            .dispatcher
            .get_message(queue, last_id, self.pop_timeout)
            .await?;
        self.pipeline.broadcast(SyncOp::SetState {
            queue: queue.to_string(),
            id: message.id,
            state: MessageState::InProgress,
        });
        Ok(message)
    }

    #[instrument(skip(self, message, deps))]
    async fn add_message(
        &self,
        queue: &str,
        message: Message,
        deps: Vec<Dependency>,
    ) -> Result<MessageId, ServiceError> {
        self.require_leader()?;
        let pushed = self.dispatcher.add_message(queue, message, &deps)?;
        let id = pushed.id;
        self.pipeline.broadcast(SyncOp::AddMessages {
            queue: queue.to_string(),
            messages: vec![pushed],
            deps,
        });
        Ok(id)
    }

    #[instrument(skip(self, messages, deps))]
    async fn add_message_group(
        &self,
        queue: &str,
        messages: Vec<Message>,
        deps: Vec<Dependency>,
    ) -> Result<Vec<MessageId>, ServiceError> {
        self.require_leader()?;
        let pushed = self.dispatcher.add_message_group(queue, messages, &deps)?;
        let ids = pushed.iter().map(|message| message.id).collect();
        self.pipeline.broadcast(SyncOp::AddMessages {
            queue: queue.to_string(),
            messages: pushed,
            deps,
        });
        Ok(ids)
    }

    #[instrument(skip(self))]
    async fn ack(&self, queue: &str, id: MessageId) -> Result<(), ServiceError> {
        self.require_leader()?;
        self.dispatcher.ack(queue, id)?;
        self.pipeline.broadcast(SyncOp::SetState {
            queue: queue.to_string(),
            id,
            state: MessageState::Acked,
        });
        Ok(())
    }

    #[instrument(skip(self))]
    async fn fail(&self, queue: &str, id: MessageId) -> Result<(), ServiceError> {
        self.require_leader()?;
        self.dispatcher.fail(queue, id)?;
        self.pipeline.broadcast(SyncOp::SetState {
            queue: queue.to_string(),
            id,
            state: MessageState::Failed,
        });
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)] // Tests are allowed to use unwrap for simplicity
mod tests {
    use super::*;
    use std::time::Duration;

    use parking_lot::Mutex;

    use crate::node::NodeState;
    use crate::replication::ReplicationError;
    use gantry_mq::queue::{InMemoryQueue, ServeMode};
    use gantry_mq::snapshot::SnapshotSdto;

    #[derive(Debug, Default)]
    struct RecordingReplica {
        ops: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl ReplicaSync for RecordingReplica {
        async fn sync_snapshot(&self, _snapshot: SnapshotSdto) -> Result<(), ReplicationError> {
            self.ops.lock().push("snapshot".to_string());
            Ok(())
        }

        async fn sync_add_messages(
            &self,
            queue: &str,
            messages: Vec<Message>,
            _deps: Vec<Dependency>,
        ) -> Result<(), ReplicationError> {
            self.ops
                .lock()
                .push(format!("add:{queue}:{}", messages.len()));
            Ok(())
        }

        async fn sync_set_message_state(
            &self,
            queue: &str,
            _id: MessageId,
            state: MessageState,
        ) -> Result<(), ReplicationError> {
            self.ops.lock().push(format!("set:{queue}:{state:?}"));
            Ok(())
        }
    }

    type TestHandler = BrokerHandler<InMemoryQueue, Arc<RecordingReplica>>;

    fn leader_handler() -> (TestHandler, Arc<Mutex<Vec<String>>>) {
        let dispatcher = Arc::new(Dispatcher::new(ServeMode::Primary, 1));
        let pipeline = Arc::new(ReplicationPipeline::new());
        let replica = Arc::new(RecordingReplica::default());
        let ops = Arc::clone(&replica.ops);
        pipeline.add_follower(2, "f:1".to_string(), replica, SnapshotSdto::default);

        let status = Arc::new(NodeStatus::new());
        status.set_node_id(1);
        status.set_state(NodeState::Leader);

        let handler = BrokerHandler::new(
            dispatcher,
            pipeline,
            status,
            Duration::from_millis(50),
        );
        (handler, ops)
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

    #[tokio::test]
    async fn followers_see_every_mutation() {
        let (handler, ops) = leader_handler();

        let id = handler
            .add_message("jobs", Message::new(b"work".as_ref()), vec![])
            .await
            .unwrap();
        let got = handler.get_message("jobs", MessageId::UNSET).await.unwrap();
        assert_eq!(got.id, id);
        handler.ack("jobs", id).await.unwrap();

        wait_until(|| ops.lock().len() == 4).await;
        let recorded = ops.lock().clone();
        assert_eq!(
            recorded,
            vec![
                "snapshot".to_string(),
                "add:jobs:1".to_string(),
                "set:jobs:InProgress".to_string(),
                "set:jobs:Acked".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn group_ids_come_back_in_input_order() {
        let (handler, _ops) = leader_handler();
        let ids = handler
            .add_message_group(
                "jobs",
                vec![Message::new(b"a".as_ref()), Message::new(b"b".as_ref())],
                vec![Dependency::new("k", 1)],
            )
            .await
            .unwrap();
        assert_eq!(ids.len(), 2);
        assert!(ids[1] > ids[0]);
    }

    #[tokio::test]
    async fn followers_refuse_client_traffic() {
        let dispatcher = Arc::new(Dispatcher::<InMemoryQueue>::new(ServeMode::Replica, 1));
        let pipeline = Arc::new(ReplicationPipeline::<Arc<RecordingReplica>>::new());
        let status = Arc::new(NodeStatus::new());
        status.set_state(NodeState::Follower);
        let handler =
            BrokerHandler::new(dispatcher, pipeline, status, Duration::from_millis(50));

        assert!(matches!(
            handler.get_message("jobs", MessageId::UNSET).await,
            Err(ServiceError::NotLeader)
        ));
        assert!(matches!(
            handler
                .add_message("jobs", Message::new(b"x".as_ref()), vec![])
                .await,
            Err(ServiceError::NotLeader)
        ));
        assert!(matches!(
            handler.ack("jobs", MessageId::from_raw(1)).await,
            Err(ServiceError::NotLeader)
        ));
    }

    #[tokio::test]
    async fn ack_of_unknown_id_is_a_client_error() {
        let (handler, _ops) = leader_handler();
        assert!(matches!(
            handler.ack("jobs", MessageId::from_raw(404)).await,
            Err(ServiceError::UnknownMessage(_))
        ));
    }

    #[tokio::test]
    async fn empty_queue_times_out() {
        let (handler, _ops) = leader_handler();
        assert!(matches!(
            handler.get_message("idle", MessageId::UNSET).await,
            Err(ServiceError::Timeout)
        ));
    }
}
