//! Service scaffolding: HTTP and gRPC on one or two listeners, with
//! signal-driven graceful shutdown.

pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod rpc;

pub use config::ServeConfig;
pub use error::{Error, Result};
pub use http::SimpleServer;
pub use lifecycle::{Coordinator, Runner, Service, SignalContext};
pub use rpc::RpcEngine;
