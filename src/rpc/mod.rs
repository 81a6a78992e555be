//! RPC subsystem.
//!
//! # Data Flow
//! ```text
//! shared listener: http::dispatch (HTTP/2 + application/grpc*) → engine.rs
//! split listener:  rpc listener → access log → engine.rs
//! ```

pub mod engine;

pub use engine::{RpcEngine, RPC_CONTENT_TYPE};
