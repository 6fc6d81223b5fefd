// Layer 1: Standard library imports
use std::sync::atomic::{AtomicU8, Ordering};

// Layer 2: Third-party crate imports
use serde::{Deserialize, Serialize};

// Layer 3: Internal module imports
// (none)

/// Lifecycle state of a message inside a queue engine.
///
/// States are ordered by progression and a message's state only ever moves
/// forward in that order:
///
/// ```text
/// Queuing < InProgress < Failed < Acked
/// ```
///
/// `Queuing` is the initial state; `Failed` and `Acked` are terminal. The
/// discriminants are the wire representation used by the follower
/// synchronization path, so their ordering is part of the contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum MessageState {
    /// Waiting for delivery, possibly gated on unresolved dependencies.
    Queuing = 0,
    /// Handed to a worker, awaiting ack or fail.
    InProgress = 1,
    /// Reported failed by a worker. Does not resolve dependencies.
    Failed = 2,
    /// Acknowledged by a worker. May resolve a dependency key.
    Acked = 3,
}

impl MessageState {
    /// Decode a state from its wire discriminant.
    pub fn from_discriminant(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Queuing),
            1 => Some(Self::InProgress),
            2 => Some(Self::Failed),
            3 => Some(Self::Acked),
            _ => None,
        }
    }

    /// Whether the state is terminal (no further transitions).
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Failed | Self::Acked)
    }
}

/// Atomically updatable message state that only advances.
///
/// The holder wraps the state in an `AtomicU8` so it can be mutated while
/// only a shared lock is held on the owning map. `advance_to` is a
/// compare-exchange loop that retries on contention and gives up as soon as
/// the observed state is no longer strictly behind the requested one. This
/// makes out-of-order arrival of follower sync updates harmless.
#[derive(Debug)]
pub struct AtomicState(AtomicU8);

impl AtomicState {
    /// Create a holder starting at the given state.
    pub fn new(state: MessageState) -> Self {
        Self(AtomicU8::new(state as u8))
    }

    /// The current state.
    pub fn load(&self) -> MessageState {
        // The atomic is only ever written with valid discriminants.
        MessageState::from_discriminant(self.0.load(Ordering::Acquire))
            .unwrap_or(MessageState::Queuing)
    }

    /// Advance to `new` if it is strictly ahead of the current state.
    ///
    /// Returns `true` when this call performed the transition, `false` when
    /// the current state was already at or past `new`.
    pub fn advance_to(&self, new: MessageState) -> bool {
        let mut current = self.0.load(Ordering::Acquire);
        loop {
            if current >= new as u8 {
                return false;
            }
            match self.0.compare_exchange_weak(
                current,
                new as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return true,
                Err(observed) => current = observed,
            }
        }
    }

    /// Transition from exactly `from` to `to`.
    ///
    /// Returns `true` only when the state was `from` at the moment of the
    /// exchange. Used by delivery (`Queuing -> InProgress`) and by ack
    /// (`InProgress -> Acked`), both of which must fire at most once.
    pub fn transition(&self, from: MessageState, to: MessageState) -> bool {
        self.0
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}
