//! Queue engine trait: the seam between the dispatcher and an engine.

// Layer 1: Standard library imports
use std::time::Duration;

// Layer 2: Third-party crate imports
use async_trait::async_trait;

// Layer 3: Internal module imports
use super::error::QueueError;
use crate::message::{Dependency, Message, MessageId, MessageState};
use crate::snapshot::QueueSdto;

/// Default wait budget for a blocking pop, mirrored by the dispatcher.
pub const DEFAULT_POP_TIMEOUT: Duration = Duration::from_millis(5000);

/// Serving mode a queue engine is created in.
///
/// Only the primary broker delivers messages; engines created on a follower
/// keep their ready queue empty until the broker wins an election and calls
/// [`MessageQueue::start_serving`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServeMode {
    /// Created on the primary: ready messages are deliverable immediately.
    Primary,
    /// Created on a follower: state is mirrored but nothing is delivered.
    Replica,
}

/// A dependency-aware message queue for one named channel.
///
/// This is the surface the broker dispatcher routes to, kept abstract so
/// tests can substitute a recording fake for the real engine.
///
/// # Contract
///
/// - A message with no unmet dependencies is deliverable exactly once.
/// - State only advances (`Queuing < InProgress < Failed < Acked`).
/// - `ack` resolves the message's `resolve_dep` key and frees dependents
///   whose remaining count drops to zero; `fail` never cascades.
/// - The follower path (`set_state`) tolerates updates arriving before the
///   message they refer to by creating placeholder records.
#[async_trait]
pub trait MessageQueue: Send + Sync + 'static {
    /// Create an empty engine in the given serving mode.
    fn with_mode(mode: ServeMode) -> Self
    where
        Self: Sized;

    /// Rebuild an engine from a snapshot. The engine starts as a replica.
    fn from_snapshot(snapshot: QueueSdto) -> Result<Self, QueueError>
    where
        Self: Sized;

    /// Insert a message, gating delivery on `deps`.
    ///
    /// The message must carry its broker-assigned id. With an empty (or
    /// already satisfied) dependency list the message becomes deliverable
    /// immediately.
    fn push(&self, message: Message, deps: &[Dependency]) -> Result<(), QueueError>;

    /// Wait up to `timeout` for a deliverable message.
    ///
    /// On success the returned message has been transitioned to
    /// `InProgress` and will not be handed to another worker.
    ///
    /// # Errors
    ///
    /// `QueueError::Timeout` when nothing became deliverable in time.
    async fn pop_free(&self, timeout: Duration) -> Result<Message, QueueError>;

    /// Acknowledge a delivered message.
    ///
    /// Idempotent: only an `InProgress` record transitions (to `Acked`) and
    /// resolves its dependency key; any other state is a no-op.
    fn ack(&self, id: MessageId) -> Result<(), QueueError>;

    /// Mark a delivered message as failed. Failed messages never resolve
    /// dependencies and are retained for inspection.
    fn fail(&self, id: MessageId) -> Result<(), QueueError>;

    /// Follower path: advance a record's state, creating a placeholder when
    /// the id is not known yet. An advance to `Acked` runs the resolve
    /// cascade but enqueues nothing while the engine is not serving.
    fn set_state(&self, id: MessageId, state: MessageState) -> Result<(), QueueError>;

    /// Promote the engine to serving: every `Queuing` record with no unmet
    /// dependencies is enqueued for delivery and waiters are woken.
    fn start_serving(&self);

    /// Whether the engine currently delivers messages.
    fn is_serving(&self) -> bool;

    /// Serializable capture of the engine's entire state.
    fn snapshot(&self) -> QueueSdto;
}
