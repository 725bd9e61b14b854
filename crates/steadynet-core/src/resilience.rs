//! Facade handed to application code: the function surface collaborators call.

use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::batch::{run_batch, BatchError};
use crate::config::SteadyConfig;
use crate::connectivity::{ConnectivityQuality, ConnectivitySignal, Subscription};
use crate::dedup::{DedupCache, DedupError};
use crate::rate_limit::RateLimiter;
use crate::retry::{Classify, RetryError, RetryExecutor, RetryOptions};

/// Bundles the connectivity signal, a retry executor bound to it, the local
/// action limiter and the configured defaults.
#[derive(Debug, Clone)]
pub struct NetworkResilience {
    signal: Arc<ConnectivitySignal>,
    executor: RetryExecutor,
    rate_limiter: Arc<RateLimiter>,
    config: SteadyConfig,
}

impl NetworkResilience {
    pub fn new(signal: Arc<ConnectivitySignal>, config: SteadyConfig) -> Self {
        let executor = RetryExecutor::new(Arc::clone(&signal));
        let rate_limiter = Arc::new(RateLimiter::from_config(&config.rate_limit_or_default()));
        Self {
            signal,
            executor,
            rate_limiter,
            config,
        }
    }

    pub fn signal(&self) -> &Arc<ConnectivitySignal> {
        &self.signal
    }

    pub fn executor(&self) -> &RetryExecutor {
        &self.executor
    }

    pub fn rate_limiter(&self) -> &Arc<RateLimiter> {
        &self.rate_limiter
    }

    pub fn config(&self) -> &SteadyConfig {
        &self.config
    }

    /// Retry options seeded from configuration.
    pub fn default_retry_options(&self) -> RetryOptions {
        self.config.retry_or_default().to_options()
    }

    pub fn default_dedup_ttl(&self) -> Duration {
        self.config.dedup_ttl()
    }

    pub async fn with_retry<T, E, F, Fut>(
        &self,
        operation: F,
        options: &RetryOptions,
    ) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Classify + Display,
    {
        self.executor.run(operation, options).await
    }

    /// Collapse concurrent calls for `key` through `cache`.
    pub async fn with_deduplication<T, E, F, Fut>(
        &self,
        cache: &DedupCache<T, E>,
        key: &str,
        operation: F,
        ttl: Duration,
    ) -> Result<T, DedupError<E>>
    where
        T: Clone + Send + Sync + 'static,
        E: Send + Sync + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        cache.dedupe(key, operation, ttl).await
    }

    /// Run `operations` under `concurrency`, or the configured default when `None`.
    pub async fn batch_requests<T, E, F, Fut>(
        &self,
        operations: Vec<F>,
        concurrency: Option<usize>,
    ) -> Vec<Result<T, BatchError<E>>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: Send + 'static,
    {
        let concurrency = concurrency.unwrap_or(self.config.batch_concurrency);
        run_batch(operations, concurrency).await
    }

    /// Record a user action under `key`; `false` when the local window is full.
    pub fn allow_action(&self, key: &str) -> bool {
        self.rate_limiter.check(key)
    }

    pub fn network_status(&self) -> bool {
        self.signal.is_online()
    }

    pub fn connectivity_quality(&self) -> ConnectivityQuality {
        self.signal.quality()
    }

    pub fn on_network_change<F>(&self, callback: F) -> Subscription
    where
        F: Fn(bool) + Send + Sync + 'static,
    {
        self.signal.subscribe(callback)
    }
}
