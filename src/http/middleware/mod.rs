//! Request middleware chain.
//!
//! # Order
//! ```text
//! cors (outermost: preflight, method gate)
//!     → access_log (latency + one log line, skips /health and /metrics)
//!     → terminal handler (dispatcher, HTTP router or RPC engine)
//! ```

pub mod access_log;
pub mod cors;

use std::sync::Arc;
use std::time::Duration;

use axum::{middleware, Router};
use tower_http::timeout::TimeoutLayer;

pub use access_log::{access_log_middleware, AccessLog, ExemptPaths};
pub use cors::{cors_middleware, CorsPolicy};

/// Wrap a terminal router with access logging and, when given, CORS.
pub fn instrument(terminal: Router, access: AccessLog, cors: Option<Arc<CorsPolicy>>) -> Router {
    let router = terminal.layer(middleware::from_fn_with_state(access, access_log_middleware));
    match cors {
        Some(policy) => router.layer(middleware::from_fn_with_state(policy, cors_middleware)),
        None => router,
    }
}

/// Bound application handlers with a request timeout (`408` on expiry).
#[allow(deprecated)]
pub fn request_timeout(router: Router, timeout: Duration) -> Router {
    router.layer(TimeoutLayer::new(timeout))
}
