//! Configuration loading from disk and the environment.

use std::fs;
use std::path::Path;

use crate::config::schema::ServeConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Env { var: &'static str, message: String },
    Validation(Vec<ValidationError>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Parse(e) => write!(f, "Parse error: {}", e),
            ConfigError::Env { var, message } => write!(f, "Invalid {}: {}", var, message),
            ConfigError::Validation(errors) => {
                write!(f, "Validation failed: ")?;
                for (i, err) in errors.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", err)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Parse a TOML file without validating it.
pub fn read_config(path: &Path) -> Result<ServeConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
    toml::from_str(&content).map_err(ConfigError::Parse)
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<ServeConfig, ConfigError> {
    let config = read_config(path)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Override values from the process environment.
///
/// - `LOG_LEVEL` → `log.level`
/// - `LOG_FORMAT` → `log.format`
/// - `PORT` → port of `listener.http_addr`
pub fn apply_env(config: &mut ServeConfig) -> Result<(), ConfigError> {
    apply_env_from(config, |key| std::env::var(key).ok())
}

fn apply_env_from<F>(config: &mut ServeConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let set = |key: &str| lookup(key).filter(|v| !v.is_empty());

    if let Some(level) = set("LOG_LEVEL") {
        config.log.level = level;
    }
    if let Some(format) = set("LOG_FORMAT") {
        config.log.format = format.parse().map_err(|message| ConfigError::Env {
            var: "LOG_FORMAT",
            message,
        })?;
    }
    if let Some(port) = set("PORT") {
        let port: u16 = port.parse().map_err(|_| ConfigError::Env {
            var: "PORT",
            message: format!("{port:?} is not a port number"),
        })?;
        config.listener.http_addr = with_port(&config.listener.http_addr, port);
    }
    Ok(())
}

/// Replace the port of a `host:port` string, keeping the host part.
fn with_port(addr: &str, port: u16) -> String {
    match addr.rsplit_once(':') {
        Some((host, _)) => format!("{host}:{port}"),
        None => format!("{addr}:{port}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::LogFormat;
    use std::collections::HashMap;
    use std::io::Write;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn env_overrides_log_and_port() {
        let mut config = ServeConfig::default();
        apply_env_from(
            &mut config,
            env(&[("LOG_LEVEL", "debug"), ("LOG_FORMAT", "console"), ("PORT", "9191")]),
        )
        .unwrap();
        assert_eq!(config.log.level, "debug");
        assert_eq!(config.log.format, LogFormat::Console);
        assert_eq!(config.listener.http_addr, "0.0.0.0:9191");
    }

    #[test]
    fn empty_env_values_are_ignored() {
        let mut config = ServeConfig::default();
        apply_env_from(&mut config, env(&[("LOG_LEVEL", "")])).unwrap();
        assert_eq!(config.log.level, "info");
    }

    #[test]
    fn bad_port_is_reported() {
        let mut config = ServeConfig::default();
        let err = apply_env_from(&mut config, env(&[("PORT", "http")])).unwrap_err();
        assert!(matches!(err, ConfigError::Env { var: "PORT", .. }));
    }

    #[test]
    fn port_override_keeps_shorthand_host() {
        assert_eq!(with_port(":8080", 9000), ":9000");
    }

    #[test]
    fn load_rejects_invalid_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[timeouts]\nshutdown_secs = 0").unwrap();
        let err = load_config(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
        assert!(err.to_string().contains("timeouts.shutdown_secs"));
    }

    #[test]
    fn load_reads_valid_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[listener]\nhttp_addr = \"127.0.0.1:7000\"\nrpc_addr = \"127.0.0.1:7001\"").unwrap();
        let config = load_config(file.path()).unwrap();
        assert_eq!(config.listener.rpc_addr.as_deref(), Some("127.0.0.1:7001"));
    }
}
