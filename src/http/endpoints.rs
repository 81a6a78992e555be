//! Built-in operational endpoints.
//!
//! - `/health`: liveness, always `200` with an empty body
//! - `/metrics`: Prometheus text exposition from an injected exporter
//!
//! Both are mounted explicitly on a router; nothing registers itself
//! globally.

use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{any, get},
    Router,
};

use crate::observability::MetricsExporter;

pub const HEALTH_PATH: &str = "/health";
pub const METRICS_PATH: &str = "/metrics";

const PROMETHEUS_CONTENT_TYPE: &str = "text/plain; version=0.0.4";

/// Mount `/health` and, when an exporter is given, `/metrics`.
pub fn mount(router: Router, exporter: Option<Arc<dyn MetricsExporter>>) -> Router {
    let router = mount_liveness(router, HEALTH_PATH);
    match exporter {
        Some(exporter) => router.route(METRICS_PATH, get(scrape).with_state(exporter)),
        None => router,
    }
}

/// Mount a liveness probe at `path`.
pub fn mount_liveness(router: Router, path: &str) -> Router {
    router.route(path, any(|| async { StatusCode::OK }))
}

async fn scrape(State(exporter): State<Arc<dyn MetricsExporter>>) -> Response {
    (
        [(header::CONTENT_TYPE, HeaderValue::from_static(PROMETHEUS_CONTENT_TYPE))],
        exporter.render(),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::Request};
    use tower::ServiceExt;

    struct Fixed;

    impl MetricsExporter for Fixed {
        fn render(&self) -> String {
            "request_latency_ms_count 3\n".to_string()
        }
    }

    async fn call(router: Router, method: &str, path: &str) -> (StatusCode, Response) {
        let request = Request::builder()
            .method(method)
            .uri(path)
            .body(Body::empty())
            .unwrap();
        let response = router.oneshot(request).await.unwrap();
        (response.status(), response)
    }

    #[tokio::test]
    async fn health_is_empty_200_for_any_method() {
        for method in ["GET", "POST", "HEAD"] {
            let (status, response) = call(mount(Router::new(), None), method, "/health").await;
            assert_eq!(status, StatusCode::OK);
            let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
            assert!(body.is_empty());
        }
    }

    #[tokio::test]
    async fn metrics_renders_injected_exporter() {
        let router = mount(Router::new(), Some(Arc::new(Fixed)));
        let (status, response) = call(router, "GET", "/metrics").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], PROMETHEUS_CONTENT_TYPE);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"request_latency_ms_count 3\n");
    }

    #[tokio::test]
    async fn metrics_absent_without_exporter() {
        let (status, _) = call(mount(Router::new(), None), "GET", "/metrics").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn custom_liveness_path() {
        let router = mount_liveness(Router::new(), "/livez");
        let (status, _) = call(router, "GET", "/livez").await;
        assert_eq!(status, StatusCode::OK);
    }
}
