//! Bulk fan-out under a fixed concurrency ceiling.
//!
//! Keeps up to `concurrency` operations running at once; when one finishes,
//! the next queued operation starts until the queue is empty. Every item's
//! outcome is captured; one failure never cancels its siblings.

mod outcome;
mod run;

pub use outcome::{BatchError, BatchSummary};
pub use run::{run_batch, run_batch_with_retry};
