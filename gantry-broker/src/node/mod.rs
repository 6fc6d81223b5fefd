//! Broker node: membership state machine and process assembly.
//!
//! # Components
//!
//! - [`BrokerNode`] - Wires coordination, dispatcher, pipeline, and service
//! - [`NodeStatus`] / [`NodeState`] - Shared role and identity
//! - [`NodeError`] - Startup error types

pub mod broker;
pub mod error;
pub mod status;

pub use broker::BrokerNode;
pub use error::NodeError;
pub use status::{NodeState, NodeStatus};
