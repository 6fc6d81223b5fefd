//! Broker service error types.

// Layer 1: Standard library imports
// (none)

// Layer 2: Third-party crate imports
use thiserror::Error;

// Layer 3: Internal module imports
use gantry_mq::dispatch::DispatchError;
use gantry_mq::message::MessageId;
use gantry_mq::queue::QueueError;

/// Errors returned to broker clients.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// No message became deliverable within the wait budget.
    ///
    /// Expected during long-polling; workers retry on it.
    #[error("no message available within the wait budget")]
    Timeout,

    /// The id is not known to the addressed queue.
    #[error("unknown message id {0}")]
    UnknownMessage(MessageId),

    /// This broker is not the primary; only the primary serves clients.
    #[error("this broker is not the current primary")]
    NotLeader,

    /// Internal failure; fatal for the request.
    #[error("internal broker error: {0}")]
    Internal(DispatchError),
}

impl From<DispatchError> for ServiceError {
    fn from(error: DispatchError) -> Self {
        match error {
            DispatchError::Queue(QueueError::Timeout) => Self::Timeout,
            DispatchError::Queue(QueueError::UnknownMessage(id)) => Self::UnknownMessage(id),
            other => Self::Internal(other),
        }
    }
}
