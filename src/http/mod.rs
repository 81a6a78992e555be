//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection
//!     → server.rs (axum-server, HTTP/1.1 + HTTP/2, connection limits)
//!     → middleware/cors.rs (preflight, method gate)
//!     → middleware/access_log.rs (latency, access line)
//!     → dispatch.rs (shared mode: RPC engine or app router)
//!     → app router + endpoints.rs (/health, /metrics)
//! ```

pub mod body;
pub mod dispatch;
pub mod endpoints;
pub mod middleware;
pub mod server;
pub mod simple;

pub use dispatch::{is_rpc_request, ProtocolDispatcher};
pub use server::HttpServer;
pub use simple::SimpleServer;
