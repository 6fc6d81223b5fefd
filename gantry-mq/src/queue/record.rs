// Layer 1: Standard library imports
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

// Layer 2: Third-party crate imports
use parking_lot::RwLock;

// Layer 3: Internal module imports
use crate::message::{AtomicState, Message, MessageId, MessageState};

/// Internal per-message record owned by a queue engine.
///
/// The record is shared between the id-keyed message map and the dependency
/// graph's waiter lists; both views alias the same `Arc<MessageRecord>` so
/// state and the remaining-dependency count stay consistent across them.
///
/// State and `n_deps` are atomics so they can be updated while only a shared
/// lock is held on the owning map. The body is `None` only for placeholder
/// records created by the follower synchronization path when a state update
/// arrives before the add-messages update it refers to.
#[derive(Debug)]
pub(crate) struct MessageRecord {
    id: MessageId,
    body: RwLock<Option<Message>>,
    state: AtomicState,
    n_deps: AtomicU32,
    in_free: AtomicBool,
}

impl MessageRecord {
    /// Create a record for a freshly pushed message.
    pub(crate) fn new(message: Message) -> Self {
        Self {
            id: message.id,
            body: RwLock::new(Some(message)),
            state: AtomicState::new(MessageState::Queuing),
            n_deps: AtomicU32::new(0),
            in_free: AtomicBool::new(false),
        }
    }

    /// Create a bodyless placeholder for an id only known from a state update.
    pub(crate) fn placeholder(id: MessageId) -> Self {
        Self {
            id,
            body: RwLock::new(None),
            state: AtomicState::new(MessageState::Queuing),
            n_deps: AtomicU32::new(0),
            in_free: AtomicBool::new(false),
        }
    }

    /// Rebuild a record from snapshot fields.
    pub(crate) fn restore(message: Message, state: MessageState, n_deps: u32) -> Self {
        Self {
            id: message.id,
            body: RwLock::new(Some(message)),
            state: AtomicState::new(state),
            n_deps: AtomicU32::new(n_deps),
            in_free: AtomicBool::new(false),
        }
    }

    pub(crate) fn id(&self) -> MessageId {
        self.id
    }

    pub(crate) fn state(&self) -> &AtomicState {
        &self.state
    }

    /// Clone of the message body, if present.
    pub(crate) fn message(&self) -> Option<Message> {
        self.body.read().clone()
    }

    /// Whether this record still lacks a body.
    pub(crate) fn is_placeholder(&self) -> bool {
        self.body.read().is_none()
    }

    /// Install the body. Returns `true` when the record was a placeholder;
    /// on a duplicate push the body is overwritten and `false` is returned.
    pub(crate) fn fill_body(&self, message: Message) -> bool {
        let mut body = self.body.write();
        let was_placeholder = body.is_none();
        *body = Some(message);
        was_placeholder
    }

    /// The dependency key this message resolves on ack, if any.
    pub(crate) fn resolve_dep(&self) -> Option<String> {
        self.body.read().as_ref().and_then(|m| m.resolve_dep.clone())
    }

    /// Remaining unresolved dependency contributions.
    pub(crate) fn n_deps(&self) -> u32 {
        self.n_deps.load(Ordering::Acquire)
    }

    /// Add freshly registered dependency contributions.
    ///
    /// Only called while the dependency graph is write-locked.
    pub(crate) fn add_deps(&self, needed: u32) {
        self.n_deps.fetch_add(needed, Ordering::AcqRel);
    }

    /// Consume one dependency contribution; returns the remaining count.
    ///
    /// Only called while the dependency graph is write-locked, and only on
    /// records whose count is still positive.
    pub(crate) fn consume_dep(&self) -> u32 {
        self.n_deps.fetch_sub(1, Ordering::AcqRel) - 1
    }

    /// Whether the record currently sits in the ready queue.
    pub(crate) fn in_free(&self) -> bool {
        self.in_free.load(Ordering::Acquire)
    }

    /// Mark the record as queued (or dequeued) in the ready queue.
    pub(crate) fn set_in_free(&self, queued: bool) {
        self.in_free.store(queued, Ordering::Release);
    }
}
