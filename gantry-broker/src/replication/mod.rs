//! Primary-to-follower replication.
//!
//! # Components
//!
//! - [`ReplicaSync`] - The three-update sync surface a follower exposes
//! - [`SyncService`] - Follower-side application onto the local dispatcher
//! - [`ReplicationPipeline`] / [`SyncOp`] - Primary-side ordered fan-out
//! - [`SyncConnector`] / [`InProcessConnector`] - Address → client resolution
//! - [`ReplicationError`] - Replication edge error types
//!
//! A new follower's stream starts with a full snapshot, so everything it
//! applies afterwards builds on a consistent base.

pub mod error;
pub mod in_process;
pub mod pipeline;
pub mod service;
pub mod traits;

pub use error::ReplicationError;
pub use in_process::InProcessConnector;
pub use pipeline::{ReplicationPipeline, SyncOp};
pub use service::SyncService;
pub use traits::{ReplicaSync, SyncConnector};
