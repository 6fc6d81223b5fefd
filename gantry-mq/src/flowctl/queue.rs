// Layer 1: Standard library imports
use std::collections::VecDeque;
use std::pin::pin;
use std::time::Duration;

// Layer 2: Third-party crate imports
use parking_lot::{Mutex, MutexGuard};
use thiserror::Error;
use tokio::sync::Notify;
use tokio::time::{timeout_at, Instant};

// Layer 3: Internal module imports
// (none)

/// Flow-control queue errors.
#[derive(Debug, Error)]
pub enum FlowError {
    /// The low water mark must be strictly below the high water mark.
    #[error("low water mark {low} must be below high water mark {high}")]
    InvalidWaterMarks {
        /// Requested low water mark.
        low: usize,
        /// Requested high water mark.
        high: usize,
    },

    /// `pop` found nothing within its wait budget.
    #[error("queue stayed empty for the whole wait budget")]
    Timeout,
}

/// Unbounded FIFO with low/high water marks for producer/consumer pacing.
///
/// `put` never blocks; consumers pace producers by waiting on the water
/// marks instead. A fetch loop typically waits for the queue to drain to the
/// low mark before requesting more work, while a processing loop pops and
/// thereby drives the level back down.
///
/// The queue is *high* while `size >= high` and *low* while `size <= low`.
///
/// # Example
/// ```rust,ignore
/// use gantry_mq::flowctl::FlowControlQueue;
///
/// let buffer = FlowControlQueue::new(3, 5)?;
/// buffer.put(fetch_next());
/// let item = buffer.pop(None).await?; // wait indefinitely
/// buffer.wait_till_low().await;       // room for more fetching
/// ```
#[derive(Debug)]
pub struct FlowControlQueue<T> {
    inner: Mutex<VecDeque<T>>,
    low: usize,
    high: usize,
    not_empty: Notify,
    at_high: Notify,
    at_low: Notify,
}

/// Exclusive view of a flow-control queue, held to observe a water-mark
/// condition atomically before releasing it.
#[derive(Debug)]
pub struct FlowGuard<'a, T> {
    guard: MutexGuard<'a, VecDeque<T>>,
    low: usize,
    high: usize,
}

impl<T> FlowGuard<'_, T> {
    /// Number of buffered items.
    pub fn size(&self) -> usize {
        self.guard.len()
    }

    /// Whether the queue is at or above its high water mark.
    pub fn is_high(&self) -> bool {
        self.guard.len() >= self.high
    }

    /// Whether the queue is at or below its low water mark.
    pub fn is_low(&self) -> bool {
        self.guard.len() <= self.low
    }
}

impl<T> FlowControlQueue<T> {
    /// Create a queue with the given water marks (`low < high`).
    pub fn new(low: usize, high: usize) -> Result<Self, FlowError> {
        if low >= high {
            return Err(FlowError::InvalidWaterMarks { low, high });
        }
        Ok(Self {
            inner: Mutex::new(VecDeque::new()),
            low,
            high,
            not_empty: Notify::new(),
            at_high: Notify::new(),
            at_low: Notify::new(),
        })
    }

    /// Append an item. Never blocks.
    pub fn put(&self, item: T) {
        let mut queue = self.inner.lock();
        queue.push_back(item);
        self.not_empty.notify_waiters();
        if queue.len() >= self.high {
            self.at_high.notify_waiters();
        }
    }

    /// Remove the oldest item, waiting while the queue is empty.
    ///
    /// `timeout` of `None` waits indefinitely.
    ///
    /// # Errors
    ///
    /// `FlowError::Timeout` when nothing arrived within the budget.
    pub async fn pop(&self, timeout: Option<Duration>) -> Result<T, FlowError> {
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut notified = pin!(self.not_empty.notified());
        loop {
            notified.as_mut().enable();
            {
                let mut queue = self.inner.lock();
                if let Some(item) = queue.pop_front() {
                    if queue.len() <= self.low {
                        self.at_low.notify_waiters();
                    }
                    return Ok(item);
                }
            }
            match deadline {
                Some(deadline) => {
                    if timeout_at(deadline, notified.as_mut()).await.is_err() {
                        return Err(FlowError::Timeout);
                    }
                }
                None => notified.as_mut().await,
            }
            notified.set(self.not_empty.notified());
        }
    }

    /// Wait until the queue reaches its high water mark.
    pub async fn wait_till_high(&self) {
        drop(self.wait_till_high_hold().await);
    }

    /// Wait until the queue reaches its high water mark, keeping the queue
    /// locked so the caller observes the condition before releasing it.
    pub async fn wait_till_high_hold(&self) -> FlowGuard<'_, T> {
        let mut notified = pin!(self.at_high.notified());
        loop {
            notified.as_mut().enable();
            {
                let guard = self.inner.lock();
                if guard.len() >= self.high {
                    return FlowGuard {
                        guard,
                        low: self.low,
                        high: self.high,
                    };
                }
            }
            notified.as_mut().await;
            notified.set(self.at_high.notified());
        }
    }

    /// Wait until the queue drains to its low water mark.
    pub async fn wait_till_low(&self) {
        drop(self.wait_till_low_hold().await);
    }

    /// Wait until the queue drains to its low water mark, keeping the queue
    /// locked so the caller observes the condition before releasing it.
    pub async fn wait_till_low_hold(&self) -> FlowGuard<'_, T> {
        let mut notified = pin!(self.at_low.notified());
        loop {
            notified.as_mut().enable();
            {
                let guard = self.inner.lock();
                if guard.len() <= self.low {
                    return FlowGuard {
                        guard,
                        low: self.low,
                        high: self.high,
                    };
                }
            }
            notified.as_mut().await;
            notified.set(self.at_low.notified());
        }
    }

    /// Number of buffered items.
    pub fn size(&self) -> usize {
        self.inner.lock().len()
    }

    /// Whether the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    /// Whether the queue is at or above its high water mark.
    pub fn is_high(&self) -> bool {
        self.size() >= self.high
    }

    /// Whether the queue is at or below its low water mark.
    pub fn is_low(&self) -> bool {
        self.size() <= self.low
    }
}
