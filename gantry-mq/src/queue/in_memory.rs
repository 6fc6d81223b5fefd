//! In-memory dependency-aware queue engine.
//!
//! One `InMemoryQueue` owns the messages of one named queue: an id-keyed
//! record map, the dependency graph, and the FIFO ready queue that blocking
//! consumers pop from.

// Layer 1: Standard library imports
use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, VecDeque};
use std::pin::pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

// Layer 2: Third-party crate imports
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use tokio::sync::Notify;
use tokio::time::{timeout_at, Instant};

// Layer 3: Internal module imports
use super::error::QueueError;
use super::graph::DependencyGraph;
use super::record::MessageRecord;
use super::traits::{MessageQueue, ServeMode};
use crate::message::{Dependency, Message, MessageId, MessageState};
use crate::snapshot::{DependencySdto, MessageSdto, QueueSdto};

/// Dependency-aware message queue for one named channel.
///
/// # Concurrency
///
/// Any number of producer and consumer tasks may call into the engine
/// concurrently. Shared state is split across three guards, always acquired
/// in the order `all_msgs` → `graph` → `free` and never in reverse:
///
/// - `all_msgs`: shared-exclusive map from id to record (readers dominate),
/// - `graph`: dependency counters and waiter lists; registration and
///   resolution serialize on its write lock, which is what makes the
///   "exactly one path frees a message" guarantee hold,
/// - `free`: the FIFO ready queue plus a [`Notify`] that consumers park on.
///
/// Per-record state and dependency counts are atomics, so they can be read
/// and advanced while only a shared lock is held on the parent map.
///
/// # Serving mode
///
/// Engines replicated on a follower are created in [`ServeMode::Replica`]:
/// they mirror every state change but keep the ready queue empty. Promotion
/// via [`MessageQueue::start_serving`] scans the record map and enqueues
/// everything that became deliverable while the engine was passive.
#[derive(Debug)]
pub struct InMemoryQueue {
    all_msgs: RwLock<BTreeMap<MessageId, Arc<MessageRecord>>>,
    graph: RwLock<DependencyGraph>,
    free: Mutex<VecDeque<Arc<MessageRecord>>>,
    not_empty: Notify,
    serving: AtomicBool,
}

impl InMemoryQueue {
    /// Create an empty engine that serves immediately.
    pub fn new() -> Self {
        Self::with_mode(ServeMode::Primary)
    }

    fn lookup(&self, id: MessageId) -> Result<Arc<MessageRecord>, QueueError> {
        self.all_msgs
            .read()
            .get(&id)
            .map(Arc::clone)
            .ok_or(QueueError::UnknownMessage(id))
    }

    /// Resolve `key` once and enqueue whatever became ready.
    fn cascade(&self, key: &str) {
        let ready = { self.graph.write().resolve(key) };
        if !ready.is_empty() {
            self.enqueue_free(ready);
        }
    }

    /// Append deliverable records to the ready queue and wake consumers.
    ///
    /// No-op while the engine is not serving: on a follower the records stay
    /// `Queuing` with a zero count until promotion picks them up.
    fn enqueue_free(&self, records: Vec<Arc<MessageRecord>>) {
        if !self.serving.load(Ordering::Acquire) {
            return;
        }
        let mut free = self.free.lock();
        let was_empty = free.is_empty();
        for record in records {
            if record.state().load() == MessageState::Queuing && !record.in_free() {
                record.set_in_free(true);
                free.push_back(record);
            }
        }
        if was_empty && !free.is_empty() {
            // Must wake all waiters: several producers can be scheduled
            // before any woken consumer runs, and a single wakeup would
            // strand the rest.
            self.not_empty.notify_waiters();
        }
    }

    /// Pop the head of the ready queue and hand it out, skipping records
    /// that left `Queuing` while parked (a queued message can still be
    /// failed).
    fn try_pop(&self) -> Result<Option<Message>, QueueError> {
        let mut free = self.free.lock();
        while let Some(record) = free.pop_front() {
            record.set_in_free(false);
            if !record
                .state()
                .transition(MessageState::Queuing, MessageState::InProgress)
            {
                continue;
            }
            let message = record
                .message()
                .ok_or(QueueError::MissingBody(record.id()))?;
            return Ok(Some(message));
        }
        Ok(None)
    }
}

impl Default for InMemoryQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessageQueue for InMemoryQueue {
    fn with_mode(mode: ServeMode) -> Self {
        Self {
            all_msgs: RwLock::new(BTreeMap::new()),
            graph: RwLock::new(DependencyGraph::default()),
            free: Mutex::new(VecDeque::new()),
            not_empty: Notify::new(),
            serving: AtomicBool::new(mode == ServeMode::Primary),
        }
    }

    fn from_snapshot(snapshot: QueueSdto) -> Result<Self, QueueError> {
        let queue = Self::with_mode(ServeMode::Replica);
        {
            let mut all = queue.all_msgs.write();
            for sdto in snapshot.messages {
                let record = MessageRecord::restore(sdto.message, sdto.state, sdto.n_deps);
                all.insert(record.id(), Arc::new(record));
            }

            let mut graph = queue.graph.write();
            for dep in snapshot.dependencies {
                let mut waiters = Vec::with_capacity(dep.dependants.len());
                for id in dep.dependants {
                    // Dependants must alias the records in the message map.
                    let record = all.get(&id).ok_or_else(|| {
                        QueueError::CorruptSnapshot(format!(
                            "dependant {id} of key {:?} is not in the message map",
                            dep.key
                        ))
                    })?;
                    waiters.push(Arc::clone(record));
                }
                graph.restore_entry(dep.key, dep.n_resolved, waiters);
            }
        }
        Ok(queue)
    }

    fn push(&self, message: Message, deps: &[Dependency]) -> Result<(), QueueError> {
        let id = message.id;
        enum Existing {
            Fresh,
            Placeholder,
            Duplicate,
        }
        let (record, existing) = {
            let mut all = self.all_msgs.write();
            match all.entry(id) {
                Entry::Occupied(entry) => {
                    let record = Arc::clone(entry.get());
                    let existing = if record.fill_body(message) {
                        Existing::Placeholder
                    } else {
                        // Duplicate push: last write wins on the body, the
                        // registered dependencies stay as they are.
                        Existing::Duplicate
                    };
                    (record, existing)
                }
                Entry::Vacant(vacant) => {
                    let record = Arc::new(MessageRecord::new(message));
                    vacant.insert(Arc::clone(&record));
                    (record, Existing::Fresh)
                }
            }
        };

        match existing {
            Existing::Fresh => {}
            Existing::Duplicate => return Ok(()),
            Existing::Placeholder => match record.state().load() {
                // A placeholder acked before its body arrived still owes
                // the resolution of its key.
                MessageState::Acked => {
                    if let Some(key) = record.resolve_dep() {
                        self.cascade(&key);
                    }
                    return Ok(());
                }
                // Dependencies are only registered for records still
                // queuing; a placeholder that already advanced was
                // delivered or finished on the primary before its body
                // arrived here.
                MessageState::InProgress | MessageState::Failed => return Ok(()),
                MessageState::Queuing => {}
            },
        }

        if deps.is_empty() {
            self.enqueue_free(vec![record]);
            return Ok(());
        }

        {
            // Hold the graph lock across registration and the zero check:
            // a concurrent resolve either finds the message in a waiter
            // list (and frees it there) or this path observes the final
            // count and frees it itself. Exactly one of the two enqueues.
            let mut graph = self.graph.write();
            graph.register(&record, deps);
            if record.n_deps() > 0 {
                return Ok(());
            }
        }
        self.enqueue_free(vec![record]);
        Ok(())
    }

    async fn pop_free(&self, timeout: Duration) -> Result<Message, QueueError> {
        let deadline = Instant::now() + timeout;
        let mut notified = pin!(self.not_empty.notified());
        loop {
            notified.as_mut().enable();
            if let Some(message) = self.try_pop()? {
                return Ok(message);
            }
            if timeout_at(deadline, notified.as_mut()).await.is_err() {
                return Err(QueueError::Timeout);
            }
            notified.set(self.not_empty.notified());
        }
    }

    fn ack(&self, id: MessageId) -> Result<(), QueueError> {
        let record = self.lookup(id)?;
        if !record
            .state()
            .transition(MessageState::InProgress, MessageState::Acked)
        {
            // Second ack, or ack of a queuing/failed record: no-op.
            return Ok(());
        }
        if let Some(key) = record.resolve_dep() {
            self.cascade(&key);
        }
        Ok(())
    }

    fn fail(&self, id: MessageId) -> Result<(), QueueError> {
        let record = self.lookup(id)?;
        record.state().advance_to(MessageState::Failed);
        Ok(())
    }

    fn set_state(&self, id: MessageId, state: MessageState) -> Result<(), QueueError> {
        let record = self.all_msgs.read().get(&id).map(Arc::clone);
        let record = match record {
            Some(record) => record,
            None => {
                // State updates may outrun the add-messages update they
                // refer to; park the state on a placeholder.
                let mut all = self.all_msgs.write();
                Arc::clone(
                    all.entry(id)
                        .or_insert_with(|| Arc::new(MessageRecord::placeholder(id))),
                )
            }
        };

        if !record.state().advance_to(state) {
            return Ok(()); // out-of-order or duplicate update
        }
        if state == MessageState::Acked {
            if let Some(key) = record.resolve_dep() {
                self.cascade(&key);
            }
        }
        Ok(())
    }

    fn start_serving(&self) {
        self.serving.store(true, Ordering::Release);
        let all = self.all_msgs.read();
        let mut free = self.free.lock();
        let was_empty = free.is_empty();
        for record in all.values() {
            if record.state().load() == MessageState::Queuing
                && record.n_deps() == 0
                && !record.in_free()
                && !record.is_placeholder()
            {
                record.set_in_free(true);
                free.push_back(Arc::clone(record));
            }
        }
        if was_empty && !free.is_empty() {
            self.not_empty.notify_waiters();
        }
    }

    fn is_serving(&self) -> bool {
        self.serving.load(Ordering::Acquire)
    }

    fn snapshot(&self) -> QueueSdto {
        let all = self.all_msgs.read();
        let graph = self.graph.read();

        let messages = all
            .values()
            .filter_map(|record| {
                record.message().map(|message| MessageSdto {
                    message,
                    state: record.state().load(),
                    n_deps: record.n_deps(),
                })
            })
            .collect();

        let dependencies = graph
            .entries()
            .map(|(key, entry)| DependencySdto {
                key: key.clone(),
                n_resolved: entry.n_resolved,
                dependants: entry
                    .waiters
                    .iter()
                    .filter(|waiter| waiter.n_deps() > 0)
                    .map(|waiter| waiter.id())
                    .collect(),
            })
            .collect();

        QueueSdto {
            messages,
            dependencies,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)] // Tests are allowed to use unwrap for simplicity
mod tests {
    use super::*;

    const POP: Duration = Duration::from_millis(50);

    fn msg(id: u64) -> Message {
        let mut m = Message::new(format!("msg{id}").into_bytes());
        m.id = MessageId::from_raw(id);
        m
    }

    fn resolving(id: u64, key: &str) -> Message {
        let mut m = msg(id);
        m.resolve_dep = Some(key.to_string());
        m
    }

    fn dep(key: &str, n: u32) -> Dependency {
        Dependency::new(key, n)
    }

    #[tokio::test]
    async fn pop_times_out_on_empty_queue() {
        let mq = Arc::new(InMemoryQueue::new());
        let mut handles = Vec::new();
        for _ in 0..20 {
            let mq = Arc::clone(&mq);
            handles.push(tokio::spawn(async move {
                matches!(mq.pop_free(POP).await, Err(QueueError::Timeout))
            }));
        }
        for handle in handles {
            assert!(handle.await.unwrap());
        }
    }

    #[tokio::test]
    async fn free_message_is_delivered_once() {
        let mq = InMemoryQueue::new();
        mq.push(msg(1), &[]).unwrap();

        let got = mq.pop_free(POP).await.unwrap();
        assert_eq!(got.id, MessageId::from_raw(1));
        assert!(matches!(mq.pop_free(POP).await, Err(QueueError::Timeout)));
    }

    #[tokio::test]
    async fn messages_with_deps_wait_for_resolutions() {
        let mq = InMemoryQueue::new();

        for m in [
            resolving(11, "dep1"),
            resolving(12, "dep2"),
            resolving(21, "dep2"),
            resolving(31, "dep3"),
        ] {
            mq.push(m, &[]).unwrap();
            mq.pop_free(POP).await.unwrap();
        }

        mq.push(msg(1), &[dep("dep1", 1), dep("dep2", 2)]).unwrap();
        assert!(matches!(mq.pop_free(POP).await, Err(QueueError::Timeout)));

        mq.ack(MessageId::from_raw(11)).unwrap();

        mq.push(msg(2), &[dep("dep1", 1), dep("dep2", 1)]).unwrap();
        assert!(matches!(mq.pop_free(POP).await, Err(QueueError::Timeout)));

        mq.ack(MessageId::from_raw(31)).unwrap();

        mq.push(msg(3), &[dep("dep1", 1), dep("dep3", 1)]).unwrap();
        let got = mq.pop_free(POP).await.unwrap();
        assert_eq!(got.id, MessageId::from_raw(3));
        assert!(matches!(mq.pop_free(POP).await, Err(QueueError::Timeout)));

        mq.ack(MessageId::from_raw(12)).unwrap();

        let got = mq.pop_free(POP).await.unwrap();
        assert_eq!(got.id, MessageId::from_raw(2));
        assert!(matches!(mq.pop_free(POP).await, Err(QueueError::Timeout)));

        mq.ack(MessageId::from_raw(21)).unwrap();

        let got = mq.pop_free(POP).await.unwrap();
        assert_eq!(got.id, MessageId::from_raw(1));
        assert!(matches!(mq.pop_free(POP).await, Err(QueueError::Timeout)));
    }

    #[tokio::test]
    async fn ack_of_non_in_progress_messages_is_a_noop() {
        let mq = InMemoryQueue::new();

        mq.push(resolving(1, "dep"), &[dep("impossible", 1)]).unwrap();

        mq.push(resolving(2, "dep"), &[]).unwrap();
        mq.pop_free(POP).await.unwrap();
        mq.fail(MessageId::from_raw(2)).unwrap();

        mq.push(resolving(3, "dep"), &[]).unwrap();
        mq.pop_free(POP).await.unwrap();
        mq.ack(MessageId::from_raw(3)).unwrap();

        mq.push(resolving(4, "dep"), &[]).unwrap();
        mq.pop_free(POP).await.unwrap();

        mq.push(msg(5), &[dep("dep", 2)]).unwrap();

        // Queuing, failed, and already-acked messages resolve nothing.
        mq.ack(MessageId::from_raw(1)).unwrap();
        mq.ack(MessageId::from_raw(2)).unwrap();
        mq.ack(MessageId::from_raw(3)).unwrap();
        assert!(matches!(mq.pop_free(POP).await, Err(QueueError::Timeout)));

        mq.ack(MessageId::from_raw(4)).unwrap();

        let got = mq.pop_free(POP).await.unwrap();
        assert_eq!(got.id, MessageId::from_raw(5));
    }

    #[tokio::test]
    async fn fail_does_not_resolve() {
        let mq = InMemoryQueue::new();
        mq.push(resolving(1, "k"), &[]).unwrap();
        mq.pop_free(POP).await.unwrap();
        mq.fail(MessageId::from_raw(1)).unwrap();

        mq.push(msg(2), &[dep("k", 1)]).unwrap();
        assert!(matches!(mq.pop_free(POP).await, Err(QueueError::Timeout)));
    }

    #[tokio::test]
    async fn failed_while_queued_is_not_delivered() {
        let mq = InMemoryQueue::new();
        mq.push(msg(1), &[]).unwrap();
        mq.fail(MessageId::from_raw(1)).unwrap();
        assert!(matches!(mq.pop_free(POP).await, Err(QueueError::Timeout)));
    }

    #[tokio::test]
    async fn ack_unknown_id_is_an_error() {
        let mq = InMemoryQueue::new();
        assert!(matches!(
            mq.ack(MessageId::from_raw(99)),
            Err(QueueError::UnknownMessage(_))
        ));
    }

    #[tokio::test]
    async fn double_ack_resolves_once() {
        let mq = InMemoryQueue::new();
        mq.push(resolving(1, "k"), &[]).unwrap();
        mq.pop_free(POP).await.unwrap();
        mq.ack(MessageId::from_raw(1)).unwrap();
        mq.ack(MessageId::from_raw(1)).unwrap();

        // Resolved exactly once: a dependent needing two is still gated.
        mq.push(msg(2), &[dep("k", 2)]).unwrap();
        assert!(matches!(mq.pop_free(POP).await, Err(QueueError::Timeout)));
    }

    #[tokio::test]
    async fn replica_keeps_ready_queue_empty() {
        let mq = InMemoryQueue::with_mode(ServeMode::Replica);
        mq.push(msg(1), &[]).unwrap();
        assert!(!mq.is_serving());
        assert!(matches!(mq.pop_free(POP).await, Err(QueueError::Timeout)));

        mq.start_serving();
        assert!(mq.is_serving());
        let got = mq.pop_free(POP).await.unwrap();
        assert_eq!(got.id, MessageId::from_raw(1));
    }

    #[tokio::test]
    async fn set_state_tolerates_out_of_order_updates() {
        let mq = InMemoryQueue::with_mode(ServeMode::Replica);
        let id = MessageId::from_raw(7);

        // State outruns the add-messages update.
        mq.set_state(id, MessageState::InProgress).unwrap();
        mq.set_state(id, MessageState::Queuing).unwrap(); // stale, ignored
        mq.push(msg(7), &[]).unwrap();
        mq.set_state(id, MessageState::Acked).unwrap();

        mq.start_serving();
        assert!(matches!(mq.pop_free(POP).await, Err(QueueError::Timeout)));
    }

    #[tokio::test]
    async fn acked_placeholder_resolves_when_body_arrives() {
        let mq = InMemoryQueue::with_mode(ServeMode::Replica);

        // The downstream message registers first.
        mq.push(msg(2), &[dep("k", 1)]).unwrap();
        // The upstream ack arrives before the upstream message itself.
        mq.set_state(MessageId::from_raw(1), MessageState::Acked).unwrap();
        mq.push(resolving(1, "k"), &[]).unwrap();

        mq.start_serving();
        let got = mq.pop_free(POP).await.unwrap();
        assert_eq!(got.id, MessageId::from_raw(2));
    }

    #[tokio::test]
    async fn set_state_ack_cascades_without_enqueueing() {
        let mq = InMemoryQueue::with_mode(ServeMode::Replica);
        mq.push(resolving(1, "k"), &[]).unwrap();
        mq.push(msg(2), &[dep("k", 1)]).unwrap();

        mq.set_state(MessageId::from_raw(1), MessageState::InProgress)
            .unwrap();
        mq.set_state(MessageId::from_raw(1), MessageState::Acked)
            .unwrap();

        // The cascade ran (n_deps is zero) but nothing was enqueued.
        assert!(matches!(mq.pop_free(POP).await, Err(QueueError::Timeout)));

        // Promotion picks the freed message up.
        mq.start_serving();
        let got = mq.pop_free(POP).await.unwrap();
        assert_eq!(got.id, MessageId::from_raw(2));
    }

    #[tokio::test]
    async fn snapshot_round_trip_preserves_state() {
        let mq = InMemoryQueue::new();
        mq.push(resolving(1, "A"), &[]).unwrap();
        mq.pop_free(POP).await.unwrap();
        mq.ack(MessageId::from_raw(1)).unwrap();
        mq.push(msg(5), &[]).unwrap();
        mq.push(msg(9), &[dep("A", 3)]).unwrap();

        let restored = InMemoryQueue::from_snapshot(mq.snapshot()).unwrap();
        assert!(!restored.is_serving());
        assert_eq!(restored.snapshot(), mq.snapshot());

        restored.start_serving();
        let got = restored.pop_free(POP).await.unwrap();
        assert_eq!(got.id, MessageId::from_raw(5));
        assert!(matches!(restored.pop_free(POP).await, Err(QueueError::Timeout)));
    }

    #[tokio::test]
    async fn pop_wakes_on_late_push() {
        let mq = Arc::new(InMemoryQueue::new());
        let popper = {
            let mq = Arc::clone(&mq);
            tokio::spawn(async move { mq.pop_free(Duration::from_secs(5)).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        mq.push(msg(1), &[]).unwrap();

        let got = popper.await.unwrap().unwrap();
        assert_eq!(got.id, MessageId::from_raw(1));
    }
}
