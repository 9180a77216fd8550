//! Tracing subscriber setup for the `sensim` binary.

use crate::config::LoggingConfig;
use tracing_subscriber::EnvFilter;

/// Install the global subscriber. `RUST_LOG` overrides the configured level;
/// an unparsable level falls back to `info`.
pub fn init(
    config: &LoggingConfig,
    force_json: bool,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if config.json || force_json {
        builder.json().try_init()
    } else {
        builder.try_init()
    }
}
