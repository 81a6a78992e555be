//! Latency recording and access logging.
//!
//! Every request outside the exempt set produces exactly one latency sample
//! and one `served` log line, whatever its status. Both are taken when the
//! response body is done, so streamed bodies are timed in full. Exempt paths
//! pass through untouched.

use std::net::SocketAddr;
use std::time::Instant;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{header, Request},
    middleware::Next,
    response::Response,
};

use crate::http::body::hold_until_done;
use crate::observability::LatencyRecorder;

pub const X_FORWARDED_FOR: &str = "x-forwarded-for";

/// Paths that are never timed or logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExemptPaths(&'static [&'static str]);

impl ExemptPaths {
    pub const HEALTH_AND_METRICS: ExemptPaths = ExemptPaths(&["/health", "/metrics"]);

    pub fn contains(&self, path: &str) -> bool {
        self.0.iter().any(|exempt| *exempt == path)
    }
}

impl Default for ExemptPaths {
    fn default() -> Self {
        Self::HEALTH_AND_METRICS
    }
}

/// State for the access log middleware.
#[derive(Debug, Clone)]
pub struct AccessLog {
    pub latency: LatencyRecorder,
    pub exempt: ExemptPaths,
}

impl AccessLog {
    pub fn new(latency: LatencyRecorder) -> Self {
        Self {
            latency,
            exempt: ExemptPaths::default(),
        }
    }
}

/// Client address, preferring `X-Forwarded-For` over the peer address.
pub fn client_addr<B>(request: &Request<B>) -> String {
    if let Some(forwarded) = request
        .headers()
        .get(X_FORWARDED_FOR)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
    {
        return forwarded.to_string();
    }
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.to_string())
        .unwrap_or_else(|| "-".to_string())
}

/// One request in flight; records and logs when dropped with the body.
struct Served {
    latency: LatencyRecorder,
    start: Instant,
    src: String,
    path: String,
    user_agent: String,
    status: u16,
}

impl Drop for Served {
    fn drop(&mut self) {
        let elapsed = self.start.elapsed();
        self.latency.record(elapsed);
        tracing::info!(
            src = %self.src,
            path = %self.path,
            user_agent = %self.user_agent,
            status = self.status,
            dur = ?elapsed,
            "served"
        );
    }
}

pub async fn access_log_middleware(
    State(state): State<AccessLog>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if state.exempt.contains(request.uri().path()) {
        return next.run(request).await;
    }

    let start = Instant::now();
    let src = client_addr(&request);
    let path = request.uri().path().to_string();
    let user_agent = request
        .headers()
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();

    let response = next.run(request).await;

    let served = Served {
        latency: state.latency,
        start,
        src,
        path,
        user_agent,
        status: response.status().as_u16(),
    };
    response.map(|body| hold_until_done(body, served))
}
