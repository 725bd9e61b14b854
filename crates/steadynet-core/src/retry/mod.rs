//! Retry and backoff policy.
//!
//! This module encapsulates error classification (client errors, auth
//! failures, transient failures), connectivity-aware exponential backoff and
//! the retry loop itself, so higher layers (dedup cache, batch runner, UI
//! data fetches) share a consistent policy.

mod classify;
mod error;
mod options;
mod policy;
mod run;

pub use classify::{classify, ApiError, Classify, FailureClass};
pub use error::RetryError;
pub use options::{RetryEvent, RetryOptions};
pub use policy::{BackoffPolicy, RetryDecision};
pub use run::RetryExecutor;
