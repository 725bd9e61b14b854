//! `steadynet backoff` – print the retry schedule.

use std::time::Duration;

use steadynet_core::config::SteadyConfig;
use steadynet_core::{BackoffPolicy, ConnectivityQuality};

/// Attempt budget and the wait after each failed attempt but the last.
pub(crate) fn schedule(
    policy: &BackoffPolicy,
    max_retries: u32,
    quality: ConnectivityQuality,
) -> (u32, Vec<Duration>) {
    let attempts = policy.adjusted_attempts(max_retries, quality);
    let delays = (0..attempts.saturating_sub(1))
        .map(|attempt| policy.delay_for(attempt, quality))
        .collect();
    (attempts, delays)
}

pub fn run_backoff(
    cfg: &SteadyConfig,
    quality: ConnectivityQuality,
    attempts: Option<u32>,
    fixed_delay_ms: Option<u64>,
) {
    let mut options = cfg.retry_or_default().to_options();
    if let Some(ms) = fixed_delay_ms {
        options.fixed_delay = Some(Duration::from_millis(ms));
    }
    let max_retries = attempts.unwrap_or(options.max_retries);
    let policy = BackoffPolicy::from_options(&options);
    let (allowed, delays) = schedule(&policy, max_retries, quality);

    println!(
        "quality: {}  attempts: {} (requested {})",
        quality, allowed, max_retries
    );
    for (i, d) in delays.iter().enumerate() {
        println!("  after attempt {:>2}: wait {:>8} ms", i + 1, d.as_millis());
    }
    println!("  after attempt {:>2}: give up", allowed);
}
