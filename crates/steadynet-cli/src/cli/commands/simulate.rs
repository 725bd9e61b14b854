//! `steadynet simulate` – drive simulated flaky requests through batch + retry.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Serialize;
use steadynet_core::config::SteadyConfig;
use steadynet_core::{
    run_batch_with_retry, ApiError, BatchSummary, ConnectivitySignal, RetryExecutor, RetryOptions,
};
use tokio::sync::mpsc;

#[derive(Debug, Serialize)]
pub(crate) struct ItemReport {
    pub index: usize,
    pub ok: bool,
    pub attempts: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct SimulationReport {
    pub summary: BatchSummary,
    pub retries: usize,
    pub items: Vec<ItemReport>,
}

/// Run `requests` simulated operations; request i fails its first
/// `i % (fail_first + 1)` attempts with a 503.
pub(crate) async fn simulate(
    requests: usize,
    concurrency: usize,
    fail_first: u32,
    options: RetryOptions,
) -> SimulationReport {
    let executor = RetryExecutor::new(Arc::new(ConnectivitySignal::new(true)));
    let counters: Vec<Arc<AtomicU32>> = (0..requests).map(|_| Arc::new(AtomicU32::new(0))).collect();
    let failures_for = |i: usize| (i as u32) % fail_first.saturating_add(1);

    let ops: Vec<_> = counters
        .iter()
        .enumerate()
        .map(|(i, counter)| {
            let counter = Arc::clone(counter);
            let fail_until = failures_for(i);
            move || {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < fail_until {
                        Err(ApiError::with_status(503, format!("request {} unavailable", i)))
                    } else {
                        Ok(i)
                    }
                }
            }
        })
        .collect();

    let (tx, mut rx) = mpsc::unbounded_channel();
    let options = options.with_events(tx);
    let results = run_batch_with_retry(&executor, ops, concurrency, &options).await;
    drop(options);

    let mut retries = 0;
    while rx.try_recv().is_ok() {
        retries += 1;
    }

    let items = results
        .iter()
        .zip(&counters)
        .enumerate()
        .map(|(index, (result, counter))| ItemReport {
            index,
            ok: result.is_ok(),
            attempts: counter.load(Ordering::SeqCst),
            error: result.as_ref().err().map(|e| e.to_string()),
        })
        .collect();

    SimulationReport {
        summary: BatchSummary::from_results(&results),
        retries,
        items,
    }
}

/// Configured retry shape with real waits collapsed: a 1 ms base and no
/// fixed delay, so a configured `fixed_delay_ms` cannot stall the run.
pub(crate) fn simulation_options(cfg: &SteadyConfig) -> RetryOptions {
    let mut options = cfg.retry_or_default().to_options();
    options.fixed_delay = None;
    options.with_base_delay(Duration::from_millis(1))
}

pub async fn run_simulate(
    cfg: &SteadyConfig,
    requests: usize,
    concurrency: Option<usize>,
    fail_first: u32,
    json: bool,
) -> Result<()> {
    let options = simulation_options(cfg);
    let concurrency = concurrency.unwrap_or(cfg.batch_concurrency);
    let report = simulate(requests, concurrency, fail_first, options).await;

    if json {
        let out = serde_json::to_string_pretty(&report).context("serialize report")?;
        println!("{}", out);
        return Ok(());
    }

    println!("{:<6} {:<6} {:<9} {}", "ITEM", "OK", "ATTEMPTS", "ERROR");
    for item in &report.items {
        println!(
            "{:<6} {:<6} {:<9} {}",
            item.index,
            item.ok,
            item.attempts,
            item.error.as_deref().unwrap_or("-")
        );
    }
    let s = report.summary;
    println!(
        "{} requests: {} succeeded, {} failed, {} retries",
        s.total, s.succeeded, s.failed, report.retries
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn instant_retries(max: u32) -> RetryOptions {
        RetryOptions::default()
            .with_max_retries(max)
            .with_fixed_delay(Duration::ZERO)
    }

    #[tokio::test]
    async fn all_requests_recover_within_budget() {
        let report = simulate(6, 2, 2, instant_retries(3)).await;
        assert_eq!(report.summary.total, 6);
        assert!(report.summary.all_succeeded());
        let attempts: Vec<u32> = report.items.iter().map(|i| i.attempts).collect();
        assert_eq!(attempts, vec![1, 2, 3, 1, 2, 3]);
        assert_eq!(report.retries, 6);
    }

    #[tokio::test]
    async fn exhausted_requests_are_reported() {
        let report = simulate(3, 3, 2, instant_retries(2)).await;
        assert_eq!(report.summary.failed, 1);
        let failed = &report.items[2];
        assert!(!failed.ok);
        assert_eq!(failed.attempts, 2);
        assert_eq!(failed.error.as_deref(), Some("request 2 unavailable"));
    }

    #[test]
    fn configured_fixed_delay_does_not_slow_simulation() {
        use steadynet_core::config::RetryConfig;

        let cfg = SteadyConfig {
            retry: Some(RetryConfig {
                max_retries: 4,
                fixed_delay_ms: Some(30_000),
                ..RetryConfig::default()
            }),
            ..SteadyConfig::default()
        };
        let options = simulation_options(&cfg);
        assert_eq!(options.fixed_delay, None);
        assert_eq!(options.base_delay, Duration::from_millis(1));
        assert_eq!(options.max_retries, 4);
    }

    #[tokio::test(start_paused = true)]
    async fn simulation_with_configured_fixed_delay_finishes_quickly() {
        let cfg = SteadyConfig {
            retry: Some(steadynet_core::config::RetryConfig {
                fixed_delay_ms: Some(30_000),
                ..Default::default()
            }),
            ..SteadyConfig::default()
        };
        let started = tokio::time::Instant::now();
        let report = simulate(4, 2, 1, simulation_options(&cfg)).await;
        assert!(report.summary.all_succeeded());
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn report_serializes_to_json() {
        let report = simulate(1, 1, 0, instant_retries(1)).await;
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["summary"]["succeeded"], 1);
        assert!(json["items"][0].get("error").is_none());
    }
}
