//! Retry loop: drive an operation until success or the policy says stop.

use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;

use super::classify::{classify, Classify};
use super::error::RetryError;
use super::options::{RetryEvent, RetryOptions};
use super::policy::{BackoffPolicy, RetryDecision};
use crate::connectivity::{ConnectivityQuality, ConnectivitySignal};

/// Drives caller operations through bounded, connectivity-aware retries.
///
/// Holds no per-invocation state; every [`run`](RetryExecutor::run) call is
/// independent and may proceed concurrently with others.
#[derive(Debug, Clone, Default)]
pub struct RetryExecutor {
    signal: Option<Arc<ConnectivitySignal>>,
}

impl RetryExecutor {
    pub fn new(signal: Arc<ConnectivitySignal>) -> Self {
        Self {
            signal: Some(signal),
        }
    }

    /// Executor with no connectivity signal: never short-circuits offline and
    /// treats link quality as unknown.
    pub fn detached() -> Self {
        Self { signal: None }
    }

    pub fn signal(&self) -> Option<&Arc<ConnectivitySignal>> {
        self.signal.as_ref()
    }

    /// Run `operation` until it succeeds, fails with a non-retryable error,
    /// the host goes offline, or the attempt budget is spent.
    ///
    /// Link quality is sampled once, before the first attempt. The last
    /// failure propagates without a trailing wait. Dropping the returned
    /// future cancels any pending backoff.
    pub async fn run<T, E, F, Fut>(
        &self,
        mut operation: F,
        options: &RetryOptions,
    ) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Classify + Display,
    {
        let signal = self
            .signal
            .as_deref()
            .filter(|_| options.respect_connectivity);
        let quality = match (options.respect_connectivity, signal) {
            (true, Some(s)) => s.quality(),
            (true, None) => ConnectivityQuality::Unknown,
            // Multiplier 1, no slow-link adjustment.
            (false, _) => ConnectivityQuality::Fast,
        };
        let policy = BackoffPolicy::from_options(options);
        let attempts = policy.adjusted_attempts(options.max_retries, quality);

        let mut attempt = 0u32;
        loop {
            tracing::trace!(attempt = attempt + 1, attempts, "attempt");
            let e = match operation().await {
                Ok(value) => return Ok(value),
                Err(e) => e,
            };

            let class = classify(&e);
            if !class.is_retryable() {
                tracing::warn!(?class, error = %e, "non-retryable failure");
                return Err(RetryError::Operation(e));
            }
            if signal.is_some_and(|s| !s.is_online()) {
                tracing::info!(error = %e, "failure while offline; not retrying");
                return Err(RetryError::Offline);
            }

            match policy.decide(attempt, attempts, class, quality) {
                RetryDecision::NoRetry => {
                    tracing::warn!(attempts, error = %e, "retries exhausted");
                    return Err(RetryError::Operation(e));
                }
                RetryDecision::RetryAfter(delay) => {
                    tracing::debug!(
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        %quality,
                        error = %e,
                        "retrying after backoff"
                    );
                    if let Some(tx) = &options.events {
                        let _ = tx.send(RetryEvent {
                            attempt: attempt + 1,
                            delay,
                            quality,
                            error: e.to_string(),
                        });
                    }
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}
