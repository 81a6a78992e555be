//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the service.
//! All types derive Serde traits for deserialization from config files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for the service.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ServeConfig {
    /// Listen addresses and limits.
    pub listener: ListenerConfig,

    /// Optional TLS material, applied to every listener.
    pub tls: Option<TlsConfig>,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Log level and output format.
    pub log: LogConfig,

    /// CORS policy for the HTTP handler.
    pub cors: CorsConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// HTTP listen address (e.g., "0.0.0.0:8080" or ":8080").
    pub http_addr: String,

    /// RPC listen address. `None` serves RPC on the HTTP listener.
    pub rpc_addr: Option<String>,

    /// Upper bound on request header bytes.
    pub max_header_bytes: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            http_addr: "0.0.0.0:8080".to_string(),
            rpc_addr: None,
            max_header_bytes: 1 << 20,
        }
    }
}

/// How the two protocol stacks are exposed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServeMode {
    /// One listener; RPC is split out by content inspection.
    Shared { addr: String },
    /// Two independent listeners.
    Split { http_addr: String, rpc_addr: String },
}

impl ServeMode {
    pub fn http_addr(&self) -> &str {
        match self {
            ServeMode::Shared { addr } => addr,
            ServeMode::Split { http_addr, .. } => http_addr,
        }
    }

    pub fn is_shared(&self) -> bool {
        matches!(self, ServeMode::Shared { .. })
    }
}

impl ListenerConfig {
    /// The serve mode this listener section selects.
    pub fn mode(&self) -> ServeMode {
        match &self.rpc_addr {
            None => ServeMode::Shared {
                addr: self.http_addr.clone(),
            },
            Some(rpc) => ServeMode::Split {
                http_addr: self.http_addr.clone(),
                rpc_addr: rpc.clone(),
            },
        }
    }
}

/// TLS configuration for the listeners.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TlsConfig {
    /// Path to certificate file (PEM).
    pub cert_path: String,

    /// Path to private key file (PEM).
    pub key_path: String,
}

/// Timeout configuration for various operations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Time allowed to receive request headers, in seconds.
    pub read_header_secs: u64,

    /// HTTP handler timeout in seconds.
    pub request_secs: u64,

    /// Grace period for draining in-flight work on shutdown, in seconds.
    pub shutdown_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            read_header_secs: 10,
            request_secs: 30,
            shutdown_secs: 30,
        }
    }
}

impl TimeoutConfig {
    pub fn read_header(&self) -> Duration {
        Duration::from_secs(self.read_header_secs)
    }

    pub fn request(&self) -> Duration {
        Duration::from_secs(self.request_secs)
    }

    pub fn shutdown(&self) -> Duration {
        Duration::from_secs(self.shutdown_secs)
    }
}

/// Log output encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Json,
    Console,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(LogFormat::Json),
            "console" | "logfmt" => Ok(LogFormat::Console),
            other => Err(format!("unknown log format {other:?} (expected json or console)")),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LogConfig {
    /// Log level (trace, debug, info, warn, error). Empty defers to `RUST_LOG`.
    pub level: String,

    /// Output encoding.
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Json,
        }
    }
}

/// CORS configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct CorsConfig {
    /// Methods answered on preflight and forwarded to the handler.
    pub allowed_methods: Vec<String>,

    /// Origin hostname suffixes; `["*"]` allows any origin.
    pub allowed_origins: Vec<String>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_methods: vec!["GET".to_string(), "POST".to_string()],
            allowed_origins: vec!["*".to_string()],
        }
    }
}
