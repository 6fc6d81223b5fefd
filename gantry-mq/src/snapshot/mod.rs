//! Snapshot data transfer objects for follower catch-up.
//!
//! A snapshot captures a queue's entire state (`all_msgs`, `all_deps`) in a
//! serializable shape. The primary ships one to every newly joining follower
//! before any live update.

pub mod types;

pub use types::{DependencySdto, MessageSdto, QueueSdto, SnapshotSdto};
