//! Broker dispatch surface: queue-name routing and global id assignment.
//!
//! # Components
//!
//! - [`Dispatcher`] - Name → engine routing with lazy creation
//! - [`IdAllocator`] - Block-prefixed monotonic message ids
//! - [`DispatchError`] - Dispatcher error types

pub mod allocator;
pub mod dispatcher;
pub mod error;

pub use allocator::IdAllocator;
pub use dispatcher::Dispatcher;
pub use error::DispatchError;
