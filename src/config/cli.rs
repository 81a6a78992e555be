//! Command-line flags.

use std::path::PathBuf;

use clap::Parser;

use crate::config::loader::{apply_env, read_config, ConfigError};
use crate::config::schema::{LogFormat, ServeConfig, TlsConfig};
use crate::config::validation::validate_config;

#[derive(Debug, Parser)]
#[command(name = "usvc")]
#[command(about = "HTTP and RPC service with shared-port dispatch", long_about = None)]
pub struct CliArgs {
    /// TOML configuration file.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Listen address for HTTP (and RPC, unless --rpc-addr is set).
    #[arg(long)]
    pub http_addr: Option<String>,

    /// Separate listen address for RPC.
    #[arg(long)]
    pub rpc_addr: Option<String>,

    /// TLS certificate file (PEM).
    #[arg(long, requires = "tls_key")]
    pub tls_cert: Option<String>,

    /// TLS private key file (PEM).
    #[arg(long, requires = "tls_cert")]
    pub tls_key: Option<String>,

    /// Logging level: trace, debug, info, warn, error.
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log format: json, console.
    #[arg(long)]
    pub log_format: Option<LogFormat>,

    /// Shutdown grace period in seconds.
    #[arg(long)]
    pub shutdown_timeout: Option<u64>,
}

impl CliArgs {
    /// Resolve the final configuration: file, then environment, then flags.
    pub fn into_config(self) -> Result<ServeConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => read_config(path)?,
            None => ServeConfig::default(),
        };
        apply_env(&mut config)?;
        self.apply(&mut config);
        validate_config(&config).map_err(ConfigError::Validation)?;
        Ok(config)
    }

    fn apply(self, config: &mut ServeConfig) {
        if let Some(addr) = self.http_addr {
            config.listener.http_addr = addr;
        }
        if let Some(addr) = self.rpc_addr {
            config.listener.rpc_addr = Some(addr);
        }
        if let (Some(cert_path), Some(key_path)) = (self.tls_cert, self.tls_key) {
            config.tls = Some(TlsConfig {
                cert_path,
                key_path,
            });
        }
        if let Some(level) = self.log_level {
            config.log.level = level;
        }
        if let Some(format) = self.log_format {
            config.log.format = format;
        }
        if let Some(secs) = self.shutdown_timeout {
            config.timeouts.shutdown_secs = secs;
        }
    }
}
