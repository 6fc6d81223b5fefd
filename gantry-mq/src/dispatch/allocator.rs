// Layer 1: Standard library imports
use std::sync::atomic::{AtomicU64, Ordering};

// Layer 2: Third-party crate imports
// (none for this module)

// Layer 3: Internal module imports
use super::error::DispatchError;
use crate::message::MessageId;

const SEQUENCE_MASK: u64 = u32::MAX as u64;

/// Monotonic message-id allocator over a coordination-assigned block.
///
/// Ids are handed out as `(block << 32) | counter` with the counter starting
/// at 1, so a broker incarnation mints up to ~2^32 ids without any
/// cluster-wide coordination. The first and last sequence values of a block
/// are never handed out: 0 is the reserved "unset" id and the final value is
/// withheld so a racing allocation can never silently carry into the next
/// block index.
///
/// # Example
/// ```rust
/// use gantry_mq::dispatch::IdAllocator;
///
/// let ids = IdAllocator::new(3);
/// let first = ids.allocate().unwrap();
/// assert_eq!(first.block(), 3);
/// assert_eq!(first.sequence(), 1);
/// assert!(ids.allocate().unwrap() > first);
/// ```
#[derive(Debug)]
pub struct IdAllocator {
    next: AtomicU64,
}

impl IdAllocator {
    /// Create an allocator over the given block index.
    pub fn new(block: u32) -> Self {
        Self {
            next: AtomicU64::new(MessageId::from_parts(block, 1).as_raw()),
        }
    }

    /// Allocate the next id.
    ///
    /// # Errors
    ///
    /// `DispatchError::IdBlockExhausted` once the block's counter runs out;
    /// the caller must install a fresh block before retrying.
    pub fn allocate(&self) -> Result<MessageId, DispatchError> {
        let mut raw = self.next.load(Ordering::Relaxed);
        loop {
            let sequence = raw & SEQUENCE_MASK;
            if sequence == 0 || sequence == SEQUENCE_MASK {
                // Stay parked on the boundary instead of carrying into the
                // next block index.
                return Err(DispatchError::IdBlockExhausted);
            }
            match self
                .next
                .compare_exchange_weak(raw, raw + 1, Ordering::Relaxed, Ordering::Relaxed)
            {
                Ok(_) => return Ok(MessageId::from_raw(raw)),
                Err(observed) => raw = observed,
            }
        }
    }

    /// Ids left in the current block.
    pub fn remaining(&self) -> u64 {
        let sequence = self.next.load(Ordering::Relaxed) & SEQUENCE_MASK;
        SEQUENCE_MASK.saturating_sub(sequence)
    }

    /// Switch to a freshly allocated block, resetting the counter to 1.
    pub fn install_block(&self, block: u32) {
        self.next
            .store(MessageId::from_parts(block, 1).as_raw(), Ordering::Release);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)] // Tests are allowed to use unwrap for simplicity
mod tests {
    use super::*;

    #[test]
    fn ids_carry_the_block_and_start_at_one() {
        let ids = IdAllocator::new(7);
        let first = ids.allocate().unwrap();
        assert_eq!(first, MessageId::from_parts(7, 1));
        assert_eq!(ids.allocate().unwrap(), MessageId::from_parts(7, 2));
    }

    #[test]
    fn ids_are_strictly_increasing() {
        let ids = IdAllocator::new(1);
        let mut last = MessageId::UNSET;
        for _ in 0..1000 {
            let id = ids.allocate().unwrap();
            assert!(id > last);
            last = id;
        }
    }

    #[test]
    fn exhausted_block_is_rejected() {
        let ids = IdAllocator::new(0);
        ids.next
            .store(MessageId::from_parts(0, u32::MAX).as_raw(), Ordering::Relaxed);
        assert!(matches!(
            ids.allocate(),
            Err(DispatchError::IdBlockExhausted)
        ));
        assert!(matches!(
            ids.allocate(),
            Err(DispatchError::IdBlockExhausted)
        ));
    }

    #[test]
    fn installing_a_block_resets_the_counter() {
        let ids = IdAllocator::new(1);
        ids.allocate().unwrap();
        ids.install_block(2);
        assert_eq!(ids.allocate().unwrap(), MessageId::from_parts(2, 1));
    }

    #[test]
    fn remaining_counts_down() {
        let ids = IdAllocator::new(1);
        let before = ids.remaining();
        ids.allocate().unwrap();
        assert_eq!(ids.remaining(), before - 1);
    }
}
