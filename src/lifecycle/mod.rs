//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Build (coordinator.rs):
//!     Validate config → Load TLS → Bind listeners → Install middleware
//!
//! Run (runner.rs):
//!     Serve until the SignalContext is cancelled
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → cancel (first) → force (second)
//!
//! Shutdown (shutdown.rs, drain.rs):
//!     Stop accepting → drain HTTP and RPC concurrently → join → report
//! ```
//!
//! # Design Decisions
//! - Shutdown is bounded by the configured grace period
//! - A second signal skips whatever drain is still in progress
//! - The first error wins; a clean stop is `Ok(())`

pub mod coordinator;
pub mod drain;
pub mod runner;
pub mod shutdown;
pub mod signals;

pub use coordinator::{Coordinator, CoordinatorBuilder};
pub use runner::{run, Runner, Service};
pub use signals::SignalContext;
