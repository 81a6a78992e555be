//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Own the request latency histogram
//! - Render Prometheus text for the `/metrics` endpoint
//!
//! # Metrics
//! - `request_latency_ms` (histogram): serve latency of every non-exempt
//!   HTTP request and RPC call
//!
//! # Design Decisions
//! - Each `Metrics` has its own recorder; nothing is looked up from a global
//!   registry, so tests can build independent instances
//! - The latency recorder is cloned into whatever writes to it

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use metrics::{Histogram, Key, KeyName, Level, Metadata, Recorder};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};

pub const REQUEST_LATENCY_METRIC: &str = "request_latency_ms";

/// Histogram bucket bounds, in milliseconds.
pub const LATENCY_BUCKETS_MS: [f64; 5] = [1.0, 5.0, 10.0, 50.0, 100.0];

static LATENCY_METADATA: Metadata<'static> =
    Metadata::new(module_path!(), Level::INFO, Some(module_path!()));

/// Anything that can render a metrics scrape.
pub trait MetricsExporter: Send + Sync {
    fn render(&self) -> String;
}

impl MetricsExporter for PrometheusHandle {
    fn render(&self) -> String {
        PrometheusHandle::render(self)
    }
}

/// Shared sink for request durations.
///
/// Clones write to the same histogram. Safe for concurrent writers.
#[derive(Clone)]
pub struct LatencyRecorder {
    histogram: Histogram,
    samples: Arc<AtomicU64>,
}

impl LatencyRecorder {
    pub fn new(histogram: Histogram) -> Self {
        Self {
            histogram,
            samples: Arc::new(AtomicU64::new(0)),
        }
    }

    /// A recorder that only counts samples.
    pub fn noop() -> Self {
        Self::new(Histogram::noop())
    }

    /// Record one request duration, truncated to whole milliseconds.
    pub fn record(&self, elapsed: Duration) {
        self.histogram.record(elapsed.as_millis() as f64);
        self.samples.fetch_add(1, Ordering::Relaxed);
    }

    /// Number of samples recorded so far.
    pub fn samples(&self) -> u64 {
        self.samples.load(Ordering::Relaxed)
    }
}

impl std::fmt::Debug for LatencyRecorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LatencyRecorder")
            .field("samples", &self.samples())
            .finish()
    }
}

/// Prometheus exporter plus the latency instrument it exposes.
#[derive(Clone)]
pub struct Metrics {
    handle: PrometheusHandle,
    latency: LatencyRecorder,
}

impl Metrics {
    pub fn new() -> Result<Self, crate::Error> {
        let recorder = PrometheusBuilder::new()
            .set_buckets_for_metric(
                Matcher::Full(REQUEST_LATENCY_METRIC.to_string()),
                &LATENCY_BUCKETS_MS,
            )?
            .build_recorder();

        recorder.describe_histogram(
            KeyName::from_const_str(REQUEST_LATENCY_METRIC),
            None,
            "request serve latency".into(),
        );
        let histogram = recorder.register_histogram(
            &Key::from_static_name(REQUEST_LATENCY_METRIC),
            &LATENCY_METADATA,
        );

        Ok(Self {
            handle: recorder.handle(),
            latency: LatencyRecorder::new(histogram),
        })
    }

    pub fn latency(&self) -> LatencyRecorder {
        self.latency.clone()
    }

    pub fn exporter(&self) -> Arc<dyn MetricsExporter> {
        Arc::new(self.handle.clone())
    }
}

impl MetricsExporter for Metrics {
    fn render(&self) -> String {
        self.handle.render()
    }
}
