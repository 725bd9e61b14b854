//! CLI command handlers, one file per command.

mod backoff;
mod completions;
mod estimate;
mod simulate;

pub use backoff::run_backoff;
pub use completions::run_completions;
pub use estimate::run_estimate;
pub use simulate::run_simulate;
