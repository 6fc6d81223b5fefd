//! Message model: ids, payloads, dependencies, and lifecycle state.
//!
//! # Components
//!
//! - [`Message`] - Immutable unit of work with an optional resolve key
//! - [`MessageId`] - Block-prefixed 64-bit globally unique identifier
//! - [`Dependency`] - A `(key, n)` delivery gate declared at push time
//! - [`MessageState`] / [`AtomicState`] - Forward-only lifecycle state

pub mod id;
pub mod state;
pub mod types;

pub use id::MessageId;
pub use state::{AtomicState, MessageState};
pub use types::{Dependency, Message, MessageKind};
