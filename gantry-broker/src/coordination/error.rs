//! Coordination service error types.

// Layer 1: Standard library imports
// (none)

// Layer 2: Third-party crate imports
use thiserror::Error;

// Layer 3: Internal module imports
// (none)

/// Errors surfaced by a coordination service session.
///
/// `NodeExists` is benign for container creation and for a stale leader
/// advertisement racing a session expiry; everything else is fatal during
/// startup and retried during steady-state watch handling.
#[derive(Debug, Error)]
pub enum CoordinationError {
    /// The node already exists.
    #[error("node already exists: {0}")]
    NodeExists(String),

    /// The node (or its parent) does not exist.
    #[error("no such node: {0}")]
    NoNode(String),

    /// The session was closed and can no longer mutate the namespace.
    #[error("coordination session is closed")]
    SessionClosed,

    /// Any other backend failure.
    #[error("coordination backend error: {0}")]
    Backend(String),
}
