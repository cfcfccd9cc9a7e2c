//! Tracing subscriber initialisation.
//!
//! The filter comes from `RUST_LOG` when set, then from
//! [`LoggingConfig::filter`], then defaults to `info`. Safe to call more than
//! once: later calls leave the first subscriber in place.

use rebound_domain::{LogFormat, LoggingConfig};
use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "info";

/// Resolve the filter directive for `config`
pub fn build_filter(config: &LoggingConfig) -> EnvFilter {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return filter;
    }
    config
        .filter
        .as_deref()
        .and_then(|directive| EnvFilter::try_new(directive).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_FILTER))
}

/// Install the global subscriber; false if one was already installed
pub fn init_tracing(config: &LoggingConfig) -> bool {
    let builder = tracing_subscriber::fmt().with_env_filter(build_filter(config));

    let installed = match config.format {
        LogFormat::Pretty => builder.pretty().with_target(true).try_init(),
        LogFormat::Compact => builder.compact().with_target(true).try_init(),
        LogFormat::Json => builder
            .json()
            .with_timer(tracing_subscriber::fmt::time::SystemTime)
            .with_current_span(true)
            .try_init(),
    }
    .is_ok();

    if installed {
        tracing::debug!(format = %config.format, "Tracing initialised");
    }
    installed
}
