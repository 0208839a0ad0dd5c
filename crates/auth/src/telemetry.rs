//! Tracing subscriber setup
//!
//! Installs a global subscriber driven by the configured log level and
//! format. Human-readable output for interactive use, newline-delimited
//! JSON for log shipping.

use tracing_subscriber::EnvFilter;

use crate::config::{Config, LogFormat};

/// Install the global tracing subscriber from configuration.
///
/// Calling this more than once is a no-op; the first subscriber wins. An
/// unparsable filter directive falls back to `info`.
pub fn init(config: &Config) {
    let filter = EnvFilter::try_new(&config.log_level)
        .unwrap_or_else(|_| EnvFilter::new("info"));

    match config.log_format {
        LogFormat::Human => {
            tracing_subscriber::fmt().with_env_filter(filter).try_init().ok();
        }
        LogFormat::Json => {
            tracing_subscriber::fmt().with_env_filter(filter).json().try_init().ok();
        }
    }
}
