// Layer 1: Standard library imports
use std::sync::atomic::{AtomicU32, AtomicU8, Ordering};

// Layer 2: Third-party crate imports
// (none for this module)

// Layer 3: Internal module imports
// (none)

const NODE_ID_UNSET: u32 = u32::MAX;

/// Replication role of a broker node.
///
/// Transitions are driven solely by membership-change events from the
/// coordination service:
///
/// ```text
/// Boot -> Follower -> (lowest live id) Leader
/// ```
///
/// There is no demotion path: member ids only grow, so the lowest live id
/// can change only when the current leader's session dies, and a dead
/// session does not come back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum NodeState {
    /// Not yet part of the membership.
    Boot = 0,
    /// Mirroring the primary, not serving clients.
    Follower = 1,
    /// Serving clients and streaming updates to followers.
    Leader = 2,
}

/// Shared, atomically readable node identity and role.
///
/// Written by the membership controller, read by the request handler on
/// every client operation.
#[derive(Debug)]
pub struct NodeStatus {
    state: AtomicU8,
    node_id: AtomicU32,
}

impl NodeStatus {
    /// A node that has not joined the membership yet.
    pub fn new() -> Self {
        Self {
            state: AtomicU8::new(NodeState::Boot as u8),
            node_id: AtomicU32::new(NODE_ID_UNSET),
        }
    }

    /// Current replication role.
    pub fn node_state(&self) -> NodeState {
        match self.state.load(Ordering::Acquire) {
            1 => NodeState::Follower,
            2 => NodeState::Leader,
            _ => NodeState::Boot,
        }
    }

    /// Record a role transition.
    pub fn set_state(&self, state: NodeState) {
        self.state.store(state as u8, Ordering::Release);
    }

    /// Whether this broker currently serves client traffic.
    pub fn is_leader(&self) -> bool {
        self.node_state() == NodeState::Leader
    }

    /// The membership sequence number, once joined.
    pub fn node_id(&self) -> Option<u32> {
        match self.node_id.load(Ordering::Acquire) {
            NODE_ID_UNSET => None,
            id => Some(id),
        }
    }

    /// Record the membership sequence number assigned at join time.
    pub fn set_node_id(&self, id: u32) {
        self.node_id.store(id, Ordering::Release);
    }
}

impl Default for NodeStatus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_in_boot_without_an_id() {
        let status = NodeStatus::new();
        assert_eq!(status.node_state(), NodeState::Boot);
        assert_eq!(status.node_id(), None);
        assert!(!status.is_leader());
    }

    #[test]
    fn promotion_is_visible() {
        let status = NodeStatus::new();
        status.set_node_id(3);
        status.set_state(NodeState::Follower);
        assert_eq!(status.node_id(), Some(3));
        assert!(!status.is_leader());

        status.set_state(NodeState::Leader);
        assert!(status.is_leader());
    }
}
