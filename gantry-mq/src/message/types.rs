// Layer 1: Standard library imports
// (none)

// Layer 2: Third-party crate imports
use bytes::Bytes;
use serde::{Deserialize, Serialize};

// Layer 3: Internal module imports
use super::id::MessageId;

/// Type tag carried by every message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum MessageKind {
    /// Ordinary payload-carrying work item.
    #[default]
    Normal,
    /// Pipeline control signal routed like any other message.
    Control,
}

/// A unit of work flowing through a queue.
///
/// Messages are immutable once a broker has assigned their id. The payload is
/// opaque to the broker; `resolve_dep` names the dependency key this message
/// resolves when a worker acknowledges it.
///
/// # Example
/// ```rust
/// use gantry_mq::message::Message;
///
/// let msg = Message::new(b"tile-3".as_ref()).resolving("tiles-row-0");
/// assert!(msg.id.is_unset());
/// assert_eq!(msg.resolve_dep.as_deref(), Some("tiles-row-0"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Globally unique id, assigned by the broker on submission.
    pub id: MessageId,
    /// Type tag.
    pub kind: MessageKind,
    /// Opaque payload bytes.
    pub payload: Bytes,
    /// Dependency key resolved by acknowledging this message.
    pub resolve_dep: Option<String>,
}

impl Message {
    /// Create an unassigned normal message with the given payload.
    pub fn new(payload: impl Into<Bytes>) -> Self {
        Self {
            id: MessageId::UNSET,
            kind: MessageKind::Normal,
            payload: payload.into(),
            resolve_dep: None,
        }
    }

    /// Set the dependency key this message resolves on ack.
    #[must_use]
    pub fn resolving(mut self, key: impl Into<String>) -> Self {
        self.resolve_dep = Some(key.into());
        self
    }

    /// Set the message kind.
    #[must_use]
    pub fn with_kind(mut self, kind: MessageKind) -> Self {
        self.kind = kind;
        self
    }
}

/// A dependency declared at push time: the message becomes deliverable once
/// the named key has been resolved at least `n` times.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    /// Dependency key, scoped to the queue the message is pushed into.
    pub key: String,
    /// Required resolution count; must be positive.
    pub n: u32,
}

impl Dependency {
    /// Create a dependency on `key` with required count `n`.
    pub fn new(key: impl Into<String>, n: u32) -> Self {
        Self { key: key.into(), n }
    }
}
