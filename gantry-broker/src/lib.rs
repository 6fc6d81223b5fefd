//! # gantry-broker - Replicated Broker Node for Gantry
//!
//! Builds the distributed half of the Gantry task broker on top of the
//! [`gantry_mq`] engine: cluster membership through a coordination service,
//! leader election by lowest live member id, and a primary that mirrors
//! every state-changing operation to its followers.
//!
//! # Roles
//!
//! Exactly one broker (the member with the lowest live sequence number) is
//! the *primary*: it serves the client API and streams updates to everyone
//! else. *Followers* apply those updates against passive engines and stand
//! ready to win the next election when the primary's session dies.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use gantry_broker::config::BrokerConfig;
//! use gantry_broker::coordination::InMemoryCoordination;
//! use gantry_broker::node::BrokerNode;
//! use gantry_broker::replication::InProcessConnector;
//!
//! # async fn example() -> Result<(), gantry_broker::node::NodeError> {
//! let coordination = InMemoryCoordination::new();
//! let connector = std::sync::Arc::new(InProcessConnector::new());
//!
//! let config = BrokerConfig::new("127.0.0.1:6783")?;
//! let node = BrokerNode::new(config, coordination.session(), connector.clone());
//! connector.register("127.0.0.1:6783", node.sync_service());
//!
//! node.start().await?;           // single member: elected immediately
//! let handler = node.handler();  // serve this through your transport
//! # Ok(())
//! # }
//! ```
//!
//! # Module Organization
//!
//! - [`coordination`] - ZooKeeper-shaped session trait + in-process backend
//! - [`replication`] - Follower sync surface and the primary's pipeline
//! - [`service`] - Client-facing API and its primary-side handler
//! - [`node`] - Membership state machine and process assembly
//! - [`config`] - Node settings
//!
//! The RPC transport in front of [`service::BrokerApi`] and the production
//! coordination backend are external collaborators; both are reached only
//! through the traits defined here.

pub mod config;
pub mod coordination;
pub mod node;
pub mod replication;
pub mod service;

// Re-export commonly used types
pub use config::{BrokerConfig, ConfigError};
pub use coordination::{Coordination, CoordinationError, CoordinationSession, InMemoryCoordination};
pub use node::{BrokerNode, NodeError, NodeState, NodeStatus};
pub use replication::{
    InProcessConnector, ReplicaSync, ReplicationError, ReplicationPipeline, SyncConnector,
    SyncOp, SyncService,
};
pub use service::{BrokerApi, BrokerHandler, ServiceError};
