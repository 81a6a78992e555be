//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! defaults
//!     → loader.rs (TOML file, then LOG_LEVEL / LOG_FORMAT / PORT)
//!     → cli.rs (flags win)
//!     → validation.rs (semantic checks)
//!     → ServeConfig (validated, immutable)
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; nothing mutates it after startup
//! - All fields have defaults to allow minimal configs
//! - Serve mode is chosen explicitly by the presence of `rpc_addr`

pub mod cli;
pub mod loader;
pub mod schema;
pub mod validation;

pub use schema::CorsConfig;
pub use schema::ListenerConfig;
pub use schema::LogConfig;
pub use schema::LogFormat;
pub use schema::ServeConfig;
pub use schema::ServeMode;
pub use schema::TimeoutConfig;
pub use schema::TlsConfig;
