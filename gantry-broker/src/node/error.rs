//! Node lifecycle error types.

// Layer 1: Standard library imports
// (none)

// Layer 2: Third-party crate imports
use thiserror::Error;

// Layer 3: Internal module imports
use crate::config::ConfigError;
use crate::coordination::CoordinationError;

/// Fatal errors during broker node startup.
///
/// Anything going wrong after startup (watch callbacks, replication
/// transport) is logged and retried instead of surfacing here.
#[derive(Debug, Error)]
pub enum NodeError {
    /// The coordination service refused a startup operation.
    #[error(transparent)]
    Coordination(#[from] CoordinationError),

    /// The node configuration is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),
}
