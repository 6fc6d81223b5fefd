//! Queue engine error types.

// Layer 1: Standard library imports
// (none)

// Layer 2: Third-party crate imports
use thiserror::Error;

// Layer 3: Internal module imports
use crate::message::MessageId;

/// Errors produced by a message queue engine.
///
/// `Timeout` is the one expected error: workers long-poll and retry on it.
/// `UnknownMessage` signals a client mistake on the primary request path.
/// The remaining variants are invariant violations and must be treated as
/// fatal for the affected queue.
#[derive(Debug, Error)]
pub enum QueueError {
    /// No message became deliverable within the wait budget.
    #[error("no free message within the wait budget")]
    Timeout,

    /// The id is not known to this queue.
    ///
    /// Raised on the primary request path; the follower synchronization path
    /// creates placeholder records instead.
    #[error("unknown message id {0}")]
    UnknownMessage(MessageId),

    /// A record scheduled for delivery has no message body.
    ///
    /// Bodies are absent only on follower placeholder records, which must
    /// never reach the ready queue.
    #[error("message {0} has no body")]
    MissingBody(MessageId),

    /// A snapshot references an id it does not define.
    #[error("snapshot is corrupt: {0}")]
    CorruptSnapshot(String),
}
