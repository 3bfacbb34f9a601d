//! # Logging
//!
//! `tracing-subscriber` setup. `RUST_LOG` takes precedence; otherwise the
//! configured log level applies to this crate.

use crate::config::SyncConfig;
use anyhow::{anyhow, Result};
use tracing_subscriber::EnvFilter;

fn default_filter(log_level: &str) -> String {
    format!("secret_sync={}", log_level.to_lowercase())
}

/// Install the global subscriber
///
/// # Errors
///
/// Returns an error if a global subscriber is already installed.
pub fn init_logging(config: &SyncConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(&config.log_level)));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    if config.log_format.eq_ignore_ascii_case("json") {
        builder
            .json()
            .with_current_span(true)
            .try_init()
            .map_err(|e| anyhow!("Failed to initialize logging: {e}"))
    } else {
        builder
            .with_ansi(config.log_enable_color)
            .try_init()
            .map_err(|e| anyhow!("Failed to initialize logging: {e}"))
    }
}
