//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! http::middleware::access_log (per request)
//!     → logging.rs (one structured access line)
//!     → metrics.rs (one latency sample)
//!
//! Consumers:
//!     → stdout (JSON or console)
//!     → GET /metrics (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - Metrics are cheap (atomic increments)
//! - `/health` and `/metrics` are never instrumented

pub mod logging;
pub mod metrics;

pub use metrics::{LatencyRecorder, Metrics, MetricsExporter};
