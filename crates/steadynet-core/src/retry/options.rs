//! Per-invocation retry options and emitted retry events.

use std::time::Duration;

use tokio::sync::mpsc;

use crate::connectivity::ConnectivityQuality;

/// One scheduled retry, reported to the optional observer channel.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryEvent {
    /// 1-based number of the attempt that just failed.
    pub attempt: u32,
    /// Wait before the next attempt.
    pub delay: Duration,
    /// Link quality sampled at the start of the invocation.
    pub quality: ConnectivityQuality,
    /// Display form of the failure.
    pub error: String,
}

/// Options for one `with_retry` invocation. Nothing here is shared across calls.
#[derive(Debug, Clone)]
pub struct RetryOptions {
    /// Attempt budget (including the first). 0 is treated as 1.
    pub max_retries: u32,
    /// Base delay for the exponential formula.
    pub base_delay: Duration,
    /// Overrides the exponential formula entirely when set.
    pub fixed_delay: Option<Duration>,
    /// Exponent base per attempt (2.0 = doubling).
    pub backoff_factor: f64,
    /// Observer for scheduled retries. Send failures are ignored.
    pub events: Option<mpsc::UnboundedSender<RetryEvent>>,
    /// Consult the connectivity signal (offline short-circuit, link quality).
    pub respect_connectivity: bool,
}

impl Default for RetryOptions {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(1000),
            fixed_delay: None,
            backoff_factor: 2.0,
            events: None,
            respect_connectivity: true,
        }
    }
}

impl RetryOptions {
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_fixed_delay(mut self, delay: Duration) -> Self {
        self.fixed_delay = Some(delay);
        self
    }

    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    pub fn with_events(mut self, tx: mpsc::UnboundedSender<RetryEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    pub fn ignore_connectivity(mut self) -> Self {
        self.respect_connectivity = false;
        self
    }
}
