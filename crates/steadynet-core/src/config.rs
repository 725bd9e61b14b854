use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::retry::RetryOptions;

/// Retry defaults (optional section in config.toml).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Attempt budget per invocation (including the first).
    pub max_retries: u32,
    /// Base delay in milliseconds for exponential backoff.
    pub base_delay_ms: u64,
    /// Exponent base applied per attempt (2.0 = doubling).
    pub backoff_factor: f64,
    /// Fixed delay in milliseconds; overrides the backoff formula when set.
    #[serde(default)]
    pub fixed_delay_ms: Option<u64>,
    /// Consult the connectivity signal (offline short-circuit, slow-link adjustments).
    pub respect_connectivity: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 1000,
            backoff_factor: 2.0,
            fixed_delay_ms: None,
            respect_connectivity: true,
        }
    }
}

impl RetryConfig {
    /// Per-invocation options seeded from these defaults (no observer attached).
    pub fn to_options(&self) -> RetryOptions {
        RetryOptions {
            max_retries: self.max_retries,
            base_delay: Duration::from_millis(self.base_delay_ms),
            fixed_delay: self.fixed_delay_ms.map(Duration::from_millis),
            backoff_factor: self.backoff_factor,
            events: None,
            respect_connectivity: self.respect_connectivity,
        }
    }
}

/// Local UI rate-limit counter parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Events allowed per key inside one window.
    pub max_events: u32,
    /// Sliding window length in milliseconds.
    pub window_ms: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_events: 10,
            window_ms: 60_000,
        }
    }
}

/// Global configuration loaded from `~/.config/steadynet/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SteadyConfig {
    /// Default freshness window for deduplicated results, in milliseconds.
    pub dedup_ttl_ms: u64,
    /// Default concurrency ceiling for batches.
    pub batch_concurrency: usize,
    /// Optional retry defaults; if missing, built-in defaults are used.
    #[serde(default)]
    pub retry: Option<RetryConfig>,
    /// Optional local rate limiter settings.
    #[serde(default)]
    pub rate_limit: Option<RateLimitConfig>,
}

impl Default for SteadyConfig {
    fn default() -> Self {
        Self {
            dedup_ttl_ms: 5_000,
            batch_concurrency: 5,
            retry: None,
            rate_limit: None,
        }
    }
}

impl SteadyConfig {
    /// Retry section, falling back to built-in defaults.
    pub fn retry_or_default(&self) -> RetryConfig {
        self.retry.clone().unwrap_or_default()
    }

    pub fn rate_limit_or_default(&self) -> RateLimitConfig {
        self.rate_limit.clone().unwrap_or_default()
    }

    pub fn dedup_ttl(&self) -> Duration {
        Duration::from_millis(self.dedup_ttl_ms)
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("steadynet")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<SteadyConfig> {
    let path = config_path()?;
    load_or_init_at(&path)
}

/// Same as [`load_or_init`] but for an explicit path.
pub fn load_or_init_at(path: &Path) -> Result<SteadyConfig> {
    if !path.exists() {
        let default_cfg = SteadyConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }
    load_from_path(path)
}

/// Parse an existing config file.
pub fn load_from_path(path: &Path) -> Result<SteadyConfig> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    let cfg: SteadyConfig =
        toml::from_str(&data).with_context(|| format!("parsing config {}", path.display()))?;
    Ok(cfg)
}
