//! Coordination service abstraction and the bundled in-process backend.
//!
//! # Components
//!
//! - [`Coordination`] - Session trait: containers, ephemerals, watches
//! - [`InMemoryCoordination`] / [`CoordinationSession`] - In-process backend
//! - [`CoordinationError`] - Session error types
//! - Well-known paths under `/gantry` used by membership, leader
//!   advertisement, and id block allocation

pub mod error;
pub mod in_memory;
pub mod traits;

pub use error::CoordinationError;
pub use in_memory::{CoordinationSession, InMemoryCoordination};
pub use traits::{
    parse_sequence, Coordination, BROKER_PATH, CONTAINER_PATHS, ID_BLOCK_PREFIX, ID_PATH,
    LEADER_PATH, NODES_PATH, NODE_PREFIX, ROOT_PATH,
};
