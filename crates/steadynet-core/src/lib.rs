//! Client-resident network resilience layer.
//!
//! Wraps caller-supplied async operations so unreliable links behave
//! predictably: bounded retries with connectivity-aware backoff, collapsing
//! of concurrent identical requests, and bulk fan-out under a concurrency
//! ceiling. The transport itself is always supplied by the caller.

pub mod config;
pub mod logging;

pub mod batch;
pub mod connectivity;
pub mod dedup;
pub mod rate_limit;
pub mod resilience;
pub mod retry;

pub use batch::{run_batch, run_batch_with_retry, BatchError, BatchSummary};
pub use connectivity::{
    estimate, ConnectivityQuality, ConnectivitySignal, EffectiveType, LinkSnapshot, Subscription,
};
pub use dedup::{DedupCache, DedupError};
pub use rate_limit::RateLimiter;
pub use resilience::NetworkResilience;
pub use retry::{
    classify, ApiError, BackoffPolicy, Classify, FailureClass, RetryDecision, RetryError,
    RetryEvent, RetryExecutor, RetryOptions,
};
