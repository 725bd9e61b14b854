//! End-to-end behaviour of the resilience layer through its public API.

use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use steadynet_core::config::{RateLimitConfig, SteadyConfig};
use steadynet_core::{
    ApiError, BatchSummary, ConnectivityQuality, ConnectivitySignal, DedupCache,
    NetworkResilience, RetryError, RetryExecutor, RetryOptions,
};
use tokio::sync::Barrier;

fn resilience(online: bool) -> NetworkResilience {
    NetworkResilience::new(Arc::new(ConnectivitySignal::new(online)), SteadyConfig::default())
}

fn no_wait(max: u32) -> RetryOptions {
    RetryOptions::default()
        .with_max_retries(max)
        .with_fixed_delay(Duration::ZERO)
}

#[tokio::test]
async fn not_found_is_attempted_once() {
    let calls = AtomicU32::new(0);
    let res = resilience(true)
        .with_retry(
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>(ApiError::with_status(404, "no such profile")) }
            },
            &no_wait(5),
        )
        .await;
    assert!(matches!(res, Err(RetryError::Operation(ref e)) if e.status == Some(404)));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn too_many_requests_is_retried() {
    let calls = AtomicU32::new(0);
    let value = resilience(true)
        .with_retry(
            || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n == 0 {
                        Err(ApiError::with_status(429, "rate limited"))
                    } else {
                        Ok("profile")
                    }
                }
            },
            &no_wait(3),
        )
        .await
        .unwrap();
    assert_eq!(value, "profile");
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn offline_host_short_circuits() {
    let calls = AtomicU32::new(0);
    let res = resilience(false)
        .with_retry(
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>(ApiError::new("network request failed")) }
            },
            &no_wait(5),
        )
        .await;
    assert!(matches!(res, Err(RetryError::Offline)));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn two_failures_then_success_takes_three_calls() {
    let calls = AtomicU32::new(0);
    let value = resilience(true)
        .with_retry(
            || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(ApiError::new("connection reset"))
                    } else {
                        Ok(42)
                    }
                }
            },
            &no_wait(3),
        )
        .await
        .unwrap();
    assert_eq!(value, 42);
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn ten_concurrent_callers_share_one_call() {
    let cache: DedupCache<String, ApiError> = DedupCache::new();
    let calls = Arc::new(AtomicU32::new(0));

    let mut handles = Vec::new();
    for _ in 0..10 {
        let cache = cache.clone();
        let calls = Arc::clone(&calls);
        handles.push(tokio::spawn(async move {
            cache
                .dedupe(
                    "profile:7",
                    move || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(30)).await;
                        Ok("ada".to_string())
                    },
                    Duration::from_secs(5),
                )
                .await
        }));
    }

    let mut results = Vec::new();
    for h in handles {
        results.push(h.await.unwrap().unwrap());
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(results.len(), 10);
    assert!(results.iter().all(|r| r == "ada"));
}

#[tokio::test(start_paused = true)]
async fn expired_entry_triggers_fresh_call() {
    let cache: DedupCache<u32, ApiError> = DedupCache::new();
    let ttl = Duration::from_millis(100);

    let first = cache.dedupe("k", || async { Ok(1) }, ttl).await.unwrap();
    assert_eq!(first, 1);

    let cached = cache.dedupe("k", || async { Ok(2) }, ttl).await.unwrap();
    assert_eq!(cached, 1);

    tokio::time::advance(ttl + Duration::from_millis(1)).await;
    let fresh = cache.dedupe("k", || async { Ok(2) }, ttl).await.unwrap();
    assert_eq!(fresh, 2);
}

#[tokio::test(start_paused = true)]
async fn stale_entry_refreshed_by_exactly_one_call() {
    let cache: DedupCache<u32, ApiError> = DedupCache::new();
    let ttl = Duration::from_millis(100);
    cache.dedupe("k", || async { Ok(1) }, ttl).await.unwrap();
    tokio::time::advance(ttl + Duration::from_millis(1)).await;

    let calls = Arc::new(AtomicU32::new(0));
    let op = {
        let calls = Arc::clone(&calls);
        move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(10)).await;
            Ok(2)
        }
    };
    let (a, b) = tokio::join!(cache.dedupe("k", op.clone(), ttl), cache.dedupe("k", op, ttl));
    assert_eq!(a.unwrap(), 2);
    assert_eq!(b.unwrap(), 2);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

/// Release `callers` tasks at once against `key` and collect their results.
async fn release_together(
    cache: &DedupCache<u32, ApiError>,
    key: &'static str,
    ttl: Duration,
    callers: usize,
    calls: &Arc<AtomicU32>,
) -> Vec<u32> {
    let barrier = Arc::new(Barrier::new(callers));
    let mut handles = Vec::new();
    for _ in 0..callers {
        let cache = cache.clone();
        let barrier = Arc::clone(&barrier);
        let calls = Arc::clone(calls);
        handles.push(tokio::spawn(async move {
            barrier.wait().await;
            cache
                .dedupe(
                    key,
                    move || async move {
                        let n = calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        Ok(100 + n)
                    },
                    ttl,
                )
                .await
        }));
    }
    let mut results = Vec::new();
    for h in handles {
        results.push(h.await.unwrap().unwrap());
    }
    results
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn simultaneous_callers_on_fresh_key_across_threads_share_one_call() {
    let cache: DedupCache<u32, ApiError> = DedupCache::new();
    let calls = Arc::new(AtomicU32::new(0));

    let results = release_together(&cache, "feed", Duration::from_secs(5), 16, &calls).await;

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(results.len(), 16);
    assert!(results.iter().all(|&r| r == 100));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn simultaneous_callers_on_expired_key_across_threads_share_one_call() {
    let cache: DedupCache<u32, ApiError> = DedupCache::new();
    let ttl = Duration::from_millis(20);
    cache.dedupe("feed", || async { Ok(1) }, ttl).await.unwrap();
    tokio::time::sleep(Duration::from_millis(40)).await;
    assert_eq!(cache.get_fresh("feed", ttl), None);

    let calls = Arc::new(AtomicU32::new(0));
    let results = release_together(&cache, "feed", ttl, 16, &calls).await;

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(results.iter().all(|&r| r == 100));
}

#[tokio::test]
async fn failure_is_not_cached() {
    let cache: DedupCache<u32, ApiError> = DedupCache::new();
    let ttl = Duration::from_secs(60);

    let err = cache
        .dedupe("k", || async { Err(ApiError::with_status(500, "boom")) }, ttl)
        .await
        .unwrap_err();
    assert_eq!(err.operation().and_then(|e| e.status), Some(500));

    let calls = AtomicU32::new(0);
    let value = cache
        .dedupe(
            "k",
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok(3) }
            },
            ttl,
        )
        .await
        .unwrap();
    assert_eq!(value, 3);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn batch_never_exceeds_concurrency_ceiling() {
    let running = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));
    let ops: Vec<_> = (0..20)
        .map(|i| {
            let running = Arc::clone(&running);
            let peak = Arc::clone(&peak);
            move || async move {
                let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(2)).await;
                running.fetch_sub(1, Ordering::SeqCst);
                Ok::<_, ApiError>(i)
            }
        })
        .collect();

    let results = resilience(true).batch_requests(ops, Some(3)).await;
    assert_eq!(results.len(), 20);
    assert!(peak.load(Ordering::SeqCst) <= 3);
    assert!(peak.load(Ordering::SeqCst) >= 1);
    assert!(BatchSummary::from_results(&results).all_succeeded());
}

#[tokio::test]
async fn batch_partial_failure_keeps_siblings() {
    let ops: Vec<_> = (1..=5)
        .map(|i| {
            move || async move {
                if i == 3 {
                    Err(ApiError::with_status(500, "item 3 failed"))
                } else {
                    Ok(i)
                }
            }
        })
        .collect();

    let results = resilience(true).batch_requests(ops, None).await;
    assert_eq!(results.len(), 5);
    assert!(results[2].is_err());
    for (idx, r) in results.iter().enumerate() {
        if idx != 2 {
            assert_eq!(r.as_ref().unwrap(), &(idx + 1));
        }
    }
    let summary = BatchSummary::from_results(&results);
    assert_eq!((summary.succeeded, summary.failed), (4, 1));
}

#[tokio::test]
async fn dedup_wraps_retry() {
    let signal = Arc::new(ConnectivitySignal::new(true));
    let executor = RetryExecutor::new(Arc::clone(&signal));
    let cache: DedupCache<u32, RetryError<ApiError>> = DedupCache::new();
    let calls = Arc::new(AtomicU32::new(0));

    let fetch = {
        let calls = Arc::clone(&calls);
        move || async move {
            executor
                .run(
                    || {
                        let n = calls.fetch_add(1, Ordering::SeqCst);
                        async move {
                            if n == 0 {
                                Err(ApiError::with_status(503, "warming up"))
                            } else {
                                Ok(11)
                            }
                        }
                    },
                    &RetryOptions::default().with_fixed_delay(Duration::ZERO),
                )
                .await
        }
    };
    let value = cache.dedupe("k", fetch, Duration::from_secs(1)).await.unwrap();
    assert_eq!(value, 11);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn network_change_reaches_subscribers() {
    let guard = resilience(true);
    let seen = Arc::new(Mutex::new(Vec::new()));
    let s = Arc::clone(&seen);
    let sub = guard.on_network_change(move |online| s.lock().unwrap().push(online));

    guard.signal().set_online(false);
    assert!(!guard.network_status());
    sub.unsubscribe();
    guard.signal().set_online(true);

    assert_eq!(*seen.lock().unwrap(), vec![false]);
    assert!(guard.network_status());
    assert_eq!(guard.connectivity_quality(), ConnectivityQuality::Unknown);
}

#[tokio::test(start_paused = true)]
async fn facade_throttles_actions_from_configured_window() {
    let config = SteadyConfig {
        rate_limit: Some(RateLimitConfig {
            max_events: 2,
            window_ms: 1_000,
        }),
        ..SteadyConfig::default()
    };
    let net = NetworkResilience::new(Arc::new(ConnectivitySignal::new(true)), config);

    assert!(net.allow_action("like:42"));
    assert!(net.allow_action("like:42"));
    assert!(!net.allow_action("like:42"));
    assert!(net.allow_action("follow:7"));
    assert_eq!(net.rate_limiter().remaining("like:42"), 0);

    tokio::time::advance(Duration::from_millis(1_001)).await;
    assert!(net.allow_action("like:42"));
    assert_eq!(net.rate_limiter().tracked_keys(), 1);
}
