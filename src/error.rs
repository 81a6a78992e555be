//! Crate-wide error type.
//!
//! # Design Decisions
//! - Startup failures (bind, TLS, config) are distinct from shutdown failures
//! - "Server closed by request" is never an error value; see `lifecycle::shutdown`
//! - Library code returns these; the binary logs and exits non-zero

use std::fmt;
use std::time::Duration;

use crate::config::loader::ConfigError;

/// Which protocol stack an error or event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    Http,
    Rpc,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Http => f.write_str("http"),
            Protocol::Rpc => f.write_str("rpc"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A listener could not be bound. Fatal at startup.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid listen address {addr:?}: {reason}")]
    InvalidAddress { addr: String, reason: String },

    /// TLS material missing or unreadable. Fatal before any listener opens.
    #[error("tls: {0}")]
    Tls(#[source] std::io::Error),

    #[error("{protocol} server failed: {source}")]
    Serve {
        protocol: Protocol,
        #[source]
        source: std::io::Error,
    },

    #[error("{protocol} drain did not finish within {timeout:?}")]
    DrainTimeout { protocol: Protocol, timeout: Duration },

    /// A repeated termination signal cut the graceful drain short.
    #[error("shutdown forced before in-flight work drained")]
    ShutdownForced,

    /// `run` was called on a service that is already serving or has served.
    #[error("server already started")]
    AlreadyStarted,

    #[error("background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("metrics exporter: {0}")]
    Metrics(#[from] metrics_exporter_prometheus::BuildError),

    #[error("logging: {0}")]
    Logging(String),

    #[error("signal registration: {0}")]
    Signal(#[source] std::io::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
