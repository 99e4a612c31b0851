//! Logging setup using `tracing` + `tracing-subscriber`
//!
//! Priority for determining the filter:
//! 1. `--verbose` selects `debug`
//! 2. `NIGHTWATCH_LOG` environment variable (EnvFilter syntax, e.g. "nightwatch=debug")
//! 3. default to `info`
//!
//! Logs go to stderr; stdout is left to command output.

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter
pub const LOG_ENV: &str = "NIGHTWATCH_LOG";

/// Initialise the global logging subscriber. Call once at startup.
pub fn init_logging(verbose: bool) -> Result<()> {
    let filter = build_filter(verbose, std::env::var(LOG_ENV).ok().as_deref())?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!(e))
        .context("Failed to set logging subscriber")
}

fn build_filter(verbose: bool, env: Option<&str>) -> Result<EnvFilter> {
    if verbose {
        return Ok(EnvFilter::new("debug"));
    }
    match env.map(str::trim).filter(|s| !s.is_empty()) {
        Some(directives) => EnvFilter::try_new(directives)
            .with_context(|| format!("Invalid {} filter '{}'", LOG_ENV, directives)),
        None => Ok(EnvFilter::new("info")),
    }
}
