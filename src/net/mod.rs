//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! configured address
//!     → listener.rs (normalise, bind; failure aborts startup)
//!     → tls.rs (optional certificate loading, before any bind)
//!     → Hand off to http::server
//! ```
//!
//! # Design Decisions
//! - Binding happens at build time so callers can read the bound address
//! - TLS is optional and handled transparently by the HTTP engine

pub mod listener;
pub mod tls;

pub use listener::{parse_listen_addr, BoundListener, ListenerError};
