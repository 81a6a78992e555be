//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check listen addresses parse and that split mode really is split
//! - Validate value ranges (timeouts > 0, header limit large enough)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ServeConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::fmt;

use crate::config::schema::ServeConfig;
use crate::net::listener::parse_listen_addr;

/// Smallest header buffer the HTTP/1 parser accepts.
pub const MIN_HEADER_BYTES: usize = 8192;

/// A single semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

pub fn validate_config(config: &ServeConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let http = match parse_listen_addr(&config.listener.http_addr) {
        Ok(addr) => Some(addr),
        Err(e) => {
            errors.push(ValidationError::new("listener.http_addr", e.to_string()));
            None
        }
    };

    if let Some(rpc_addr) = &config.listener.rpc_addr {
        match parse_listen_addr(rpc_addr) {
            Ok(rpc) if Some(rpc) == http && rpc.port() != 0 => {
                errors.push(ValidationError::new(
                    "listener.rpc_addr",
                    "equals listener.http_addr; omit rpc_addr to share one listener",
                ));
            }
            Ok(_) => {}
            Err(e) => errors.push(ValidationError::new("listener.rpc_addr", e.to_string())),
        }
    }

    if config.listener.max_header_bytes < MIN_HEADER_BYTES {
        errors.push(ValidationError::new(
            "listener.max_header_bytes",
            format!("must be at least {MIN_HEADER_BYTES}"),
        ));
    }

    if let Some(tls) = &config.tls {
        if tls.cert_path.is_empty() || tls.key_path.is_empty() {
            errors.push(ValidationError::new(
                "tls",
                "cert_path and key_path must both be set",
            ));
        }
    }

    if config.timeouts.shutdown_secs == 0 {
        errors.push(ValidationError::new("timeouts.shutdown_secs", "must be > 0"));
    }
    if config.timeouts.read_header_secs == 0 {
        errors.push(ValidationError::new("timeouts.read_header_secs", "must be > 0"));
    }

    if config.cors.allowed_methods.is_empty() {
        errors.push(ValidationError::new("cors.allowed_methods", "must not be empty"));
    }
    for method in &config.cors.allowed_methods {
        if axum::http::Method::from_bytes(method.as_bytes()).is_err() {
            errors.push(ValidationError::new(
                "cors.allowed_methods",
                format!("invalid method {method:?}"),
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
