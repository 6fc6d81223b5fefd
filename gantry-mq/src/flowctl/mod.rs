//! Generic flow-control buffering between producing and consuming loops.
//!
//! [`FlowControlQueue`] is the bounded-by-convention FIFO that worker-side
//! clients place between their fetch and process loops: fetching waits for
//! the buffer to drain to the low water mark, processing wakes anyone gated
//! on the high mark.

pub mod queue;

pub use queue::{FlowControlQueue, FlowError, FlowGuard};
