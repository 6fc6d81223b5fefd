//! # gantry-mq - Dependency-Aware Message Queue Engine
//!
//! Core engine of the Gantry task broker: named queues whose messages can be
//! gated on *dependency keys* with required counts. A message becomes
//! deliverable only once enough acknowledged upstream messages have resolved
//! its keys, which lets staged pipelines block downstream work on the
//! aggregation of multiple upstream results.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use std::time::Duration;
//! use gantry_mq::message::{Dependency, Message};
//! use gantry_mq::queue::{InMemoryQueue, MessageQueue};
//!
//! # async fn example() -> Result<(), gantry_mq::queue::QueueError> {
//! let queue = InMemoryQueue::new();
//!
//! // Two upstream tiles resolve the same key on ack...
//! queue.push(tile_a.resolving("row-0"), &[])?;
//! queue.push(tile_b.resolving("row-0"), &[])?;
//!
//! // ...and the merge step waits for both of them.
//! queue.push(merge, &[Dependency::new("row-0", 2)])?;
//!
//! let next = queue.pop_free(Duration::from_secs(5)).await?;
//! queue.ack(next.id)?;
//! # Ok(())
//! # }
//! ```
//!
//! # Module Organization
//!
//! - [`message`] - Message model: ids, payloads, dependencies, state
//! - [`queue`] - The per-queue engine and its trait seam
//! - [`dispatch`] - Queue-name routing and block-prefixed id assignment
//! - [`flowctl`] - Water-marked buffering between fetch and process loops
//! - [`snapshot`] - Serializable engine captures for follower catch-up
//!
//! # Concurrency Model
//!
//! Producers and consumers call into an engine from any number of tasks.
//! Consumers park on an async notification with a bounded wait and re-check
//! the ready queue on every wakeup; producers and acknowledgments wake them
//! on the empty-to-non-empty transition. Per-message state advances through
//! a forward-only compare-exchange, so replicated updates may arrive out of
//! order without corrupting a record's lifecycle.

pub mod dispatch;
pub mod flowctl;
pub mod message;
pub mod queue;
pub mod snapshot;

// Re-export commonly used types
pub use dispatch::{DispatchError, Dispatcher, IdAllocator};
pub use flowctl::{FlowControlQueue, FlowError};
pub use message::{Dependency, Message, MessageId, MessageKind, MessageState};
pub use queue::{InMemoryQueue, MessageQueue, QueueError, ServeMode, DEFAULT_POP_TIMEOUT};
pub use snapshot::{DependencySdto, MessageSdto, QueueSdto, SnapshotSdto};
