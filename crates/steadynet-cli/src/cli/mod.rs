//! CLI for the steadynet resilience layer.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use clap_complete::Shell;
use steadynet_core::config;
use steadynet_core::{ConnectivityQuality, EffectiveType};

use commands::{run_backoff, run_completions, run_estimate, run_simulate};

/// Top-level CLI for steadynet.
#[derive(Debug, Parser)]
#[command(name = "steadynet")]
#[command(about = "steadynet: retry, dedup and batch diagnostics for flaky links", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Classify link quality from host-reported characteristics.
    Estimate {
        /// Round-trip time estimate in milliseconds.
        #[arg(long, value_name = "MS")]
        rtt_ms: Option<u32>,
        /// Downlink bandwidth estimate (Mbit/s).
        #[arg(long, value_name = "MBPS")]
        downlink: Option<f64>,
        /// Effective generation label: slow-2g, 2g, 3g or 4g.
        #[arg(long, value_name = "LABEL")]
        effective_type: Option<EffectiveType>,
        /// The host's data-saver flag is set.
        #[arg(long)]
        save_data: bool,
    },

    /// Print the retry schedule for a link quality.
    Backoff {
        /// Link quality: fast, moderate, slow or unknown.
        #[arg(long, default_value = "unknown")]
        quality: ConnectivityQuality,
        /// Attempt budget (defaults to the configured max_retries).
        #[arg(long, value_name = "N")]
        attempts: Option<u32>,
        /// Use a fixed delay instead of exponential backoff.
        #[arg(long, value_name = "MS")]
        fixed_delay_ms: Option<u64>,
    },

    /// Run simulated flaky requests through the batch runner with retry.
    Simulate {
        /// Number of simulated requests.
        #[arg(long, default_value = "10", value_name = "N")]
        requests: usize,
        /// Concurrency ceiling (defaults to the configured batch_concurrency).
        #[arg(long, value_name = "N")]
        concurrency: Option<usize>,
        /// Request i fails its first `i % (K+1)` attempts with a 503.
        #[arg(long, default_value = "2", value_name = "K")]
        fail_first: u32,
        /// Print the report as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Print shell completions.
    Completions {
        /// Target shell.
        shell: Shell,
    },
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();

        match cli.command {
            CliCommand::Estimate {
                rtt_ms,
                downlink,
                effective_type,
                save_data,
            } => run_estimate(rtt_ms, downlink, effective_type, save_data),
            CliCommand::Backoff {
                quality,
                attempts,
                fixed_delay_ms,
            } => {
                let cfg = config::load_or_init()?;
                tracing::debug!("loaded config: {:?}", cfg);
                run_backoff(&cfg, quality, attempts, fixed_delay_ms);
            }
            CliCommand::Simulate {
                requests,
                concurrency,
                fail_first,
                json,
            } => {
                let cfg = config::load_or_init()?;
                tracing::debug!("loaded config: {:?}", cfg);
                run_simulate(&cfg, requests, concurrency, fail_first, json).await?;
            }
            CliCommand::Completions { shell } => run_completions(shell),
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
