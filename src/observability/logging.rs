//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the global tracing subscriber
//! - Select JSON or console output from config
//! - Resolve the level filter from config or `RUST_LOG`

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{LogConfig, LogFormat};

/// Build the level filter for a config.
///
/// An empty level defers to `RUST_LOG`, then to `info`.
pub fn env_filter(config: &LogConfig) -> Result<EnvFilter, crate::Error> {
    if config.level.is_empty() {
        return Ok(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")));
    }
    EnvFilter::try_new(&config.level)
        .map_err(|e| crate::Error::Logging(format!("invalid level {:?}: {e}", config.level)))
}

/// Install the global subscriber. Fails if one is already installed.
pub fn init_logging(config: &LogConfig) -> Result<(), crate::Error> {
    let filter = env_filter(config)?;
    let registry = tracing_subscriber::registry().with(filter);

    let result = match config.format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().flatten_event(true))
            .try_init(),
        LogFormat::Console => registry
            .with(tracing_subscriber::fmt::layer().with_ansi(false))
            .try_init(),
    };
    result.map_err(|e| crate::Error::Logging(e.to_string()))
}
