use std::time::Duration;

use super::classify::FailureClass;
use super::options::RetryOptions;
use crate::connectivity::ConnectivityQuality;

/// Decision returned by the backoff policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Do not retry this error.
    NoRetry,
    /// Retry after the given delay.
    RetryAfter(Duration),
}

/// Connectivity-aware exponential backoff.
///
/// `delay = base_delay * factor^attempt * quality multiplier`, unless a fixed
/// delay is configured, in which case the fixed delay is used as-is.
#[derive(Debug, Clone, Copy)]
pub struct BackoffPolicy {
    pub base_delay: Duration,
    pub factor: f64,
    pub fixed_delay: Option<Duration>,
    /// Upper bound on any computed delay.
    pub max_delay: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(1000),
            factor: 2.0,
            fixed_delay: None,
            max_delay: Duration::from_secs(300),
        }
    }
}

impl BackoffPolicy {
    pub fn from_options(options: &RetryOptions) -> Self {
        Self {
            base_delay: options.base_delay,
            factor: options.backoff_factor,
            fixed_delay: options.fixed_delay,
            ..Self::default()
        }
    }

    /// Wait after the failed attempt `attempt` (0-based).
    pub fn delay_for(&self, attempt: u32, quality: ConnectivityQuality) -> Duration {
        if let Some(fixed) = self.fixed_delay {
            return fixed;
        }
        let exp = self.factor.powi(attempt.min(i32::MAX as u32) as i32);
        let secs = self.base_delay.as_secs_f64() * exp * quality.backoff_multiplier();
        if !secs.is_finite() || secs >= self.max_delay.as_secs_f64() {
            return self.max_delay;
        }
        Duration::from_secs_f64(secs.max(0.0))
    }

    /// Attempt budget for one invocation: at least one attempt, one fewer on slow links.
    pub fn adjusted_attempts(&self, max_retries: u32, quality: ConnectivityQuality) -> u32 {
        let attempts = max_retries.max(1);
        match quality {
            ConnectivityQuality::Slow => attempts.saturating_sub(1).max(1),
            _ => attempts,
        }
    }

    /// Decide what to do after attempt `attempt` (0-based) failed with `class`.
    pub fn decide(
        &self,
        attempt: u32,
        attempts_allowed: u32,
        class: FailureClass,
        quality: ConnectivityQuality,
    ) -> RetryDecision {
        if !class.is_retryable() {
            return RetryDecision::NoRetry;
        }
        if attempt.saturating_add(1) >= attempts_allowed {
            return RetryDecision::NoRetry;
        }
        RetryDecision::RetryAfter(self.delay_for(attempt, quality))
    }
}
