// Layer 1: Standard library imports
use std::collections::BTreeMap;

// Layer 2: Third-party crate imports
use serde::{Deserialize, Serialize};

// Layer 3: Internal module imports
use crate::message::{Message, MessageId, MessageState};

/// Serialized form of one internal message record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageSdto {
    /// The message, id included.
    pub message: Message,
    /// Lifecycle state at capture time.
    pub state: MessageState,
    /// Remaining unresolved dependency contributions.
    pub n_deps: u32,
}

/// Serialized form of one dependency key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencySdto {
    /// The dependency key.
    pub key: String,
    /// How many times the key has been resolved.
    pub n_resolved: u64,
    /// Ids of messages still waiting on this key, in registration order.
    pub dependants: Vec<MessageId>,
}

/// Serializable capture of a whole queue engine.
///
/// `dependants` entries refer into `messages` by id; reconstruction aliases
/// the same record from both views.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueSdto {
    /// Every record the engine owns, in id order.
    pub messages: Vec<MessageSdto>,
    /// Every dependency key, in key order.
    pub dependencies: Vec<DependencySdto>,
}

/// Full-broker snapshot shipped to a catching-up follower.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotSdto {
    /// Per-queue captures, keyed by queue name.
    pub queues: BTreeMap<String, QueueSdto>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)] // Tests are allowed to use unwrap for simplicity
mod tests {
    use super::*;
    use bytes::Bytes;
    use crate::message::MessageKind;

    fn sample() -> SnapshotSdto {
        let mut queues = BTreeMap::new();
        queues.insert(
            "tiles".to_string(),
            QueueSdto {
                messages: vec![MessageSdto {
                    message: Message {
                        id: MessageId::from_parts(1, 1),
                        kind: MessageKind::Normal,
                        payload: Bytes::from_static(b"m1"),
                        resolve_dep: Some("row-0".to_string()),
                    },
                    state: MessageState::Acked,
                    n_deps: 0,
                }],
                dependencies: vec![DependencySdto {
                    key: "row-0".to_string(),
                    n_resolved: 1,
                    dependants: vec![],
                }],
            },
        );
        SnapshotSdto { queues }
    }

    #[test]
    fn serde_round_trip() {
        let snapshot = sample();
        let json = serde_json::to_string(&snapshot).unwrap();
        let back: SnapshotSdto = serde_json::from_str(&json).unwrap();
        assert_eq!(back, snapshot);
    }
}
