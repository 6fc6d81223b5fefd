//! Dispatcher error types.

// Layer 1: Standard library imports
// (none)

// Layer 2: Third-party crate imports
use thiserror::Error;

// Layer 3: Internal module imports
use crate::queue::QueueError;

/// Errors produced by the broker dispatcher.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// Error surfaced by the targeted queue engine.
    #[error(transparent)]
    Queue(#[from] QueueError),

    /// The current id block is exhausted.
    ///
    /// A block yields close to 2^32 ids; the owning broker is expected to
    /// allocate a fresh block from the coordination service well before the
    /// counter gets here.
    #[error("message id block exhausted")]
    IdBlockExhausted,
}

impl DispatchError {
    /// Whether this is the expected long-poll timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Queue(QueueError::Timeout))
    }
}
