//! Broker dispatcher: queue name routing and id assignment.

// Layer 1: Standard library imports
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

// Layer 2: Third-party crate imports
use dashmap::DashMap;

// Layer 3: Internal module imports
use super::allocator::IdAllocator;
use super::error::DispatchError;
use crate::message::{Dependency, Message, MessageId, MessageState};
use crate::queue::{MessageQueue, ServeMode};
use crate::snapshot::SnapshotSdto;

/// Routes operations to per-queue engines, creating them on first use.
///
/// The queue map only ever grows; engines live until broker shutdown. Ids
/// are minted from a coordination-assigned block so every message pushed
/// through one broker incarnation gets a strictly increasing id.
///
/// The dispatcher carries the broker's serving mode: engines created while
/// the broker is a replica mirror state without delivering, and
/// [`Dispatcher::start_serving_all`] promotes everything at election time.
#[derive(Debug)]
pub struct Dispatcher<Q: MessageQueue> {
    queues: DashMap<String, Arc<Q>>,
    ids: IdAllocator,
    serving: AtomicBool,
}

impl<Q: MessageQueue> Dispatcher<Q> {
    /// Create a dispatcher minting ids from `block`.
    pub fn new(mode: ServeMode, block: u32) -> Self {
        Self {
            queues: DashMap::new(),
            ids: IdAllocator::new(block),
            serving: AtomicBool::new(mode == ServeMode::Primary),
        }
    }

    /// Find or create the engine for `name`.
    pub fn queue(&self, name: &str) -> Arc<Q> {
        if let Some(queue) = self.queues.get(name) {
            return Arc::clone(queue.value());
        }
        let mode = if self.serving.load(Ordering::Acquire) {
            ServeMode::Primary
        } else {
            ServeMode::Replica
        };
        let entry = self
            .queues
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(Q::with_mode(mode)));
        Arc::clone(entry.value())
    }

    /// Pop the next deliverable message from `queue`.
    ///
    /// `_last_id` is advisory: it reports the caller's last received id and
    /// does not filter delivery.
    pub async fn get_message(
        &self,
        queue: &str,
        _last_id: MessageId,
        timeout: Duration,
    ) -> Result<Message, DispatchError> {
        Ok(self.queue(queue).pop_free(timeout).await?)
    }

    /// Assign an id to `message` and push it into `queue`.
    ///
    /// Returns the message as pushed (id included) so the caller can mirror
    /// it to followers.
    pub fn add_message(
        &self,
        queue: &str,
        mut message: Message,
        deps: &[Dependency],
    ) -> Result<Message, DispatchError> {
        message.id = self.ids.allocate()?;
        self.queue(queue).push(message.clone(), deps)?;
        Ok(message)
    }

    /// Push a group of messages sharing one dependency list.
    ///
    /// Ids are assigned in input order; the returned messages carry them.
    pub fn add_message_group(
        &self,
        queue: &str,
        messages: Vec<Message>,
        deps: &[Dependency],
    ) -> Result<Vec<Message>, DispatchError> {
        let engine = self.queue(queue);
        let mut pushed = Vec::with_capacity(messages.len());
        for mut message in messages {
            message.id = self.ids.allocate()?;
            engine.push(message.clone(), deps)?;
            pushed.push(message);
        }
        Ok(pushed)
    }

    /// Acknowledge a delivered message.
    pub fn ack(&self, queue: &str, id: MessageId) -> Result<(), DispatchError> {
        Ok(self.queue(queue).ack(id)?)
    }

    /// Mark a delivered message as failed.
    pub fn fail(&self, queue: &str, id: MessageId) -> Result<(), DispatchError> {
        Ok(self.queue(queue).fail(id)?)
    }

    /// Follower path: push messages that already carry their ids.
    pub fn sync_push(
        &self,
        queue: &str,
        messages: Vec<Message>,
        deps: &[Dependency],
    ) -> Result<(), DispatchError> {
        let engine = self.queue(queue);
        for message in messages {
            engine.push(message, deps)?;
        }
        Ok(())
    }

    /// Follower path: advance a record's state.
    pub fn sync_set_state(
        &self,
        queue: &str,
        id: MessageId,
        state: MessageState,
    ) -> Result<(), DispatchError> {
        Ok(self.queue(queue).set_state(id, state)?)
    }

    /// Replace every engine with ones rebuilt from `snapshot`.
    pub fn install_snapshot(&self, snapshot: SnapshotSdto) -> Result<(), DispatchError> {
        self.queues.clear();
        for (name, queue_sdto) in snapshot.queues {
            let engine = Q::from_snapshot(queue_sdto)?;
            self.queues.insert(name, Arc::new(engine));
        }
        Ok(())
    }

    /// Capture every engine's state.
    pub fn snapshot(&self) -> SnapshotSdto {
        let mut snapshot = SnapshotSdto::default();
        for entry in self.queues.iter() {
            snapshot
                .queues
                .insert(entry.key().clone(), entry.value().snapshot());
        }
        snapshot
    }

    /// Promote every engine (and future engines) to serving.
    pub fn start_serving_all(&self) {
        self.serving.store(true, Ordering::Release);
        for entry in self.queues.iter() {
            entry.value().start_serving();
        }
    }

    /// Whether this dispatcher creates serving engines.
    pub fn is_serving(&self) -> bool {
        self.serving.load(Ordering::Acquire)
    }

    /// Ids left in the current block.
    pub fn ids_remaining(&self) -> u64 {
        self.ids.remaining()
    }

    /// Mint from a freshly allocated block from now on.
    pub fn install_id_block(&self, block: u32) {
        self.ids.install_block(block);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)] // Tests are allowed to use unwrap for simplicity
mod tests {
    use super::*;
    use std::collections::VecDeque;

    use async_trait::async_trait;
    use parking_lot::Mutex;

    use crate::queue::{InMemoryQueue, QueueError};
    use crate::snapshot::QueueSdto;

    /// Recording stand-in for the real engine.
    #[derive(Debug, Default)]
    struct FakeQueue {
        pushed: Mutex<Vec<(Message, Vec<Dependency>)>>,
        acked: Mutex<Vec<MessageId>>,
        failed: Mutex<Vec<MessageId>>,
        free: Mutex<VecDeque<Message>>,
    }

    #[async_trait]
    impl MessageQueue for FakeQueue {
        fn with_mode(_mode: ServeMode) -> Self {
            Self::default()
        }

        fn from_snapshot(_snapshot: QueueSdto) -> Result<Self, QueueError> {
            Ok(Self::default())
        }

        fn push(&self, message: Message, deps: &[Dependency]) -> Result<(), QueueError> {
            self.pushed.lock().push((message, deps.to_vec()));
            Ok(())
        }

        async fn pop_free(&self, _timeout: Duration) -> Result<Message, QueueError> {
            self.free.lock().pop_front().ok_or(QueueError::Timeout)
        }

        fn ack(&self, id: MessageId) -> Result<(), QueueError> {
            self.acked.lock().push(id);
            Ok(())
        }

        fn fail(&self, id: MessageId) -> Result<(), QueueError> {
            self.failed.lock().push(id);
            Ok(())
        }

        fn set_state(&self, _id: MessageId, _state: MessageState) -> Result<(), QueueError> {
            Ok(())
        }

        fn start_serving(&self) {}

        fn is_serving(&self) -> bool {
            true
        }

        fn snapshot(&self) -> QueueSdto {
            QueueSdto::default()
        }
    }

    const POP: Duration = Duration::from_millis(10);

    fn msg(payload: &str) -> Message {
        Message::new(payload.as_bytes().to_vec())
    }

    #[tokio::test]
    async fn get_message_drains_the_queue_then_times_out() {
        let dispatcher: Dispatcher<FakeQueue> = Dispatcher::new(ServeMode::Primary, 1);
        let result = dispatcher.get_message("q", MessageId::UNSET, POP).await;
        assert!(result.unwrap_err().is_timeout());

        let engine = dispatcher.queue("q");
        let mut expected = Vec::new();
        for i in 0..10u64 {
            let mut m = msg(&i.to_string());
            m.id = MessageId::from_raw(i + 1);
            engine.free.lock().push_back(m.clone());
            expected.push(m);
        }

        for m in expected {
            let got = dispatcher
                .get_message("q", MessageId::UNSET, POP)
                .await
                .unwrap();
            assert_eq!(got, m);
        }
        let result = dispatcher.get_message("q", MessageId::UNSET, POP).await;
        assert!(result.unwrap_err().is_timeout());
    }

    #[tokio::test]
    async fn add_message_assigns_increasing_ids() {
        let dispatcher: Dispatcher<FakeQueue> = Dispatcher::new(ServeMode::Primary, 4);

        let dep1 = Dependency::new("dep1", 1);
        let dep2 = Dependency::new("dep2", 2);
        let first = dispatcher
            .add_message("q", msg("m1"), &[dep1.clone(), dep2.clone()])
            .unwrap();
        let second = dispatcher.add_message("q", msg("m2"), &[dep2.clone()]).unwrap();

        assert_eq!(first.id, MessageId::from_parts(4, 1));
        assert!(second.id > first.id);

        let engine = dispatcher.queue("q");
        let pushed = engine.pushed.lock();
        assert_eq!(pushed.len(), 2);
        assert_eq!(pushed[0].0, first);
        assert_eq!(pushed[0].1, vec![dep1, dep2.clone()]);
        assert_eq!(pushed[1].0, second);
        assert_eq!(pushed[1].1, vec![dep2]);
    }

    #[tokio::test]
    async fn group_shares_one_dependency_list() {
        let dispatcher: Dispatcher<FakeQueue> = Dispatcher::new(ServeMode::Primary, 1);
        let deps = vec![
            Dependency::new("dep1", 1),
            Dependency::new("dep2", 2),
            Dependency::new("dep3", 3),
        ];

        let pushed = dispatcher
            .add_message_group("q", vec![msg("m1"), msg("m2")], &deps)
            .unwrap();
        assert_eq!(pushed.len(), 2);
        assert!(pushed[1].id > pushed[0].id);

        let engine = dispatcher.queue("q");
        let recorded = engine.pushed.lock();
        assert_eq!(recorded[0].1, deps);
        assert_eq!(recorded[1].1, deps);
    }

    #[tokio::test]
    async fn ack_and_fail_delegate_to_the_engine() {
        let dispatcher: Dispatcher<FakeQueue> = Dispatcher::new(ServeMode::Primary, 1);
        dispatcher.ack("q", MessageId::from_raw(1)).unwrap();
        dispatcher.fail("q", MessageId::from_raw(2)).unwrap();

        let engine = dispatcher.queue("q");
        assert_eq!(*engine.acked.lock(), vec![MessageId::from_raw(1)]);
        assert_eq!(*engine.failed.lock(), vec![MessageId::from_raw(2)]);
    }

    #[tokio::test]
    async fn queue_lookup_is_find_or_create() {
        let dispatcher: Dispatcher<FakeQueue> = Dispatcher::new(ServeMode::Primary, 1);
        let first = dispatcher.queue("q");
        let second = dispatcher.queue("q");
        assert!(Arc::ptr_eq(&first, &second));
        let other = dispatcher.queue("other");
        assert!(!Arc::ptr_eq(&first, &other));
    }

    #[tokio::test]
    async fn replica_dispatcher_creates_passive_engines() {
        let dispatcher: Dispatcher<InMemoryQueue> = Dispatcher::new(ServeMode::Replica, 1);
        let engine = dispatcher.queue("q");
        assert!(!engine.is_serving());

        dispatcher.start_serving_all();
        assert!(engine.is_serving());
        assert!(dispatcher.queue("late").is_serving());
    }

    #[tokio::test]
    async fn snapshot_round_trips_through_install() {
        let primary: Dispatcher<InMemoryQueue> = Dispatcher::new(ServeMode::Primary, 1);
        primary.add_message("jobs", msg("a"), &[]).unwrap();
        primary
            .add_message("jobs", msg("b"), &[Dependency::new("k", 1)])
            .unwrap();
        primary.add_message("other", msg("c"), &[]).unwrap();

        let replica: Dispatcher<InMemoryQueue> = Dispatcher::new(ServeMode::Replica, 9);
        replica.install_snapshot(primary.snapshot()).unwrap();
        assert_eq!(replica.snapshot(), primary.snapshot());
        assert!(!replica.queue("jobs").is_serving());
    }
}
