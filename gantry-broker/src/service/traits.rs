//! Client-facing broker API.

// Layer 1: Standard library imports
// (none)

// Layer 2: Third-party crate imports
use async_trait::async_trait;

// Layer 3: Internal module imports
use super::error::ServiceError;
use gantry_mq::message::{Dependency, Message, MessageId};

/// The synchronous request/response surface a broker offers its clients.
///
/// Every operation is served by the primary only; the RPC transport in
/// front of this trait is an external collaborator.
#[async_trait]
pub trait BrokerApi: Send + Sync {
    /// Long-poll for the next deliverable message in `queue`.
    ///
    /// `last_id` reports the caller's previously received id; it is advisory
    /// and does not filter delivery.
    ///
    /// # Errors
    ///
    /// `ServiceError::Timeout` when nothing became deliverable within the
    /// broker's wait budget; workers retry on it.
    async fn get_message(&self, queue: &str, last_id: MessageId)
        -> Result<Message, ServiceError>;

    /// Submit a message, gated on `deps`. Returns the assigned id.
    async fn add_message(
        &self,
        queue: &str,
        message: Message,
        deps: Vec<Dependency>,
    ) -> Result<MessageId, ServiceError>;

    /// Submit a group of messages sharing one dependency list. Returns the
    /// assigned ids in input order.
    async fn add_message_group(
        &self,
        queue: &str,
        messages: Vec<Message>,
        deps: Vec<Dependency>,
    ) -> Result<Vec<MessageId>, ServiceError>;

    /// Acknowledge a delivered message.
    async fn ack(&self, queue: &str, id: MessageId) -> Result<(), ServiceError>;

    /// Report a delivered message as failed.
    async fn fail(&self, queue: &str, id: MessageId) -> Result<(), ServiceError>;
}
