//! Dependency-aware queue engine for one named channel.
//!
//! # Components
//!
//! - [`MessageQueue`] - Engine trait, the dispatcher's routing seam
//! - [`InMemoryQueue`] - The production engine implementation
//! - [`ServeMode`] - Primary (delivering) vs replica (mirroring) creation
//! - [`QueueError`] - Engine error types
//!
//! The dependency graph and the internal record type are implementation
//! details of [`InMemoryQueue`] and stay private to this module.

pub mod error;
pub(crate) mod graph;
pub mod in_memory;
pub(crate) mod record;
pub mod traits;

pub use error::QueueError;
pub use in_memory::InMemoryQueue;
pub use traits::{MessageQueue, ServeMode, DEFAULT_POP_TIMEOUT};
