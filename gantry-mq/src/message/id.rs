// Layer 1: Standard library imports
use std::fmt::{self, Display};

// Layer 2: Third-party crate imports
use serde::{Deserialize, Serialize};

// Layer 3: Internal module imports
// (none)

/// Number of bits reserved for the per-block sequence counter.
const SEQUENCE_BITS: u32 = 32;

/// Mask selecting the sequence half of an id.
const SEQUENCE_MASK: u64 = (1 << SEQUENCE_BITS) - 1;

/// Globally unique message identifier.
///
/// Ids are 64-bit values composed of two halves: the upper 32 bits hold the
/// *block index* a broker incarnation obtained from the coordination service,
/// the lower 32 bits hold a per-block counter starting at 1. The zero value
/// is reserved as "unset" and marks a message whose id has not been assigned
/// by a broker yet.
///
/// # Example
/// ```rust
/// use gantry_mq::message::MessageId;
///
/// let id = MessageId::from_parts(7, 42);
/// assert_eq!(id.block(), 7);
/// assert_eq!(id.sequence(), 42);
/// assert!(!id.is_unset());
/// assert!(MessageId::UNSET.is_unset());
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct MessageId(u64);

impl MessageId {
    /// The reserved "no id assigned" value.
    pub const UNSET: MessageId = MessageId(0);

    /// Build an id from a raw 64-bit value.
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Build an id from a block index and a per-block sequence number.
    pub const fn from_parts(block: u32, sequence: u32) -> Self {
        Self(((block as u64) << SEQUENCE_BITS) | sequence as u64)
    }

    /// The raw 64-bit value.
    pub const fn as_raw(&self) -> u64 {
        self.0
    }

    /// The block index assigned by the coordination service.
    pub const fn block(&self) -> u32 {
        (self.0 >> SEQUENCE_BITS) as u32
    }

    /// The per-block sequence number.
    pub const fn sequence(&self) -> u32 {
        (self.0 & SEQUENCE_MASK) as u32
    }

    /// Whether this id is the reserved "unset" value.
    pub const fn is_unset(&self) -> bool {
        self.0 == 0
    }
}

impl Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for MessageId {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}
