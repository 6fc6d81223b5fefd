//! Replication error types.

// Layer 1: Standard library imports
// (none)

// Layer 2: Third-party crate imports
use thiserror::Error;

// Layer 3: Internal module imports
use gantry_mq::dispatch::DispatchError;

/// Errors at the primary-to-follower replication edge.
///
/// Transport failures are reported per follower and never fail the client
/// operation that produced the mirrored update.
#[derive(Debug, Error)]
pub enum ReplicationError {
    /// The follower could not be reached or the update could not be moved.
    #[error("transport failure: {0}")]
    Transport(String),

    /// No follower is registered under the given address.
    #[error("unknown follower address: {0}")]
    UnknownFollower(String),

    /// The follower rejected the update while applying it.
    #[error("follower rejected update: {0}")]
    Apply(#[from] DispatchError),
}
