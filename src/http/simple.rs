//! Standalone HTTP-only service.
//!
//! A single listener serving one router with a liveness probe, access
//! logging and CORS, driven through the [`Service`] interface so it can be
//! handed straight to [`lifecycle::run`](crate::lifecycle::run).

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::Router;
use axum_server::Handle;
use tokio::sync::watch;

use crate::config::loader::ConfigError;
use crate::config::ServeConfig;
use crate::error::Protocol;
use crate::http::endpoints;
use crate::http::middleware::{self, AccessLog, CorsPolicy};
use crate::http::server::HttpServer;
use crate::lifecycle::Service;
use crate::net::tls::load_tls_config;
use crate::observability::LatencyRecorder;

const HARD_STOP_MARGIN: Duration = Duration::from_secs(1);

/// Configures a [`SimpleServer`].
pub struct SimpleServerBuilder {
    config: ServeConfig,
    router: Router,
    liveness_path: String,
    cors: Option<CorsPolicy>,
    latency: LatencyRecorder,
}

impl SimpleServerBuilder {
    /// Serve the liveness probe at `path` instead of `/health`.
    pub fn liveness_path(mut self, path: impl Into<String>) -> Self {
        self.liveness_path = path.into();
        self
    }

    /// Replace the allow-all CORS policy.
    pub fn cors(mut self, policy: CorsPolicy) -> Self {
        self.cors = Some(policy);
        self
    }

    /// Record request latency into `latency`.
    pub fn latency(mut self, latency: LatencyRecorder) -> Self {
        self.latency = latency;
        self
    }

    /// Load TLS material (if configured) and bind the listener.
    pub async fn build(self) -> crate::Result<SimpleServer> {
        let tls = match &self.config.tls {
            Some(tls) => Some(load_tls_config(tls).await.map_err(crate::Error::Tls)?),
            None => None,
        };
        let server = HttpServer::bind(&self.config.listener.http_addr, tls, &self.config).await?;

        let cors = match self.cors {
            Some(policy) => policy,
            None => CorsPolicy::from_config(&self.config.cors)
                .map_err(|e| ConfigError::Validation(vec![e]))?,
        };
        let app = middleware::request_timeout(self.router, self.config.timeouts.request());
        let app = endpoints::mount_liveness(app, &self.liveness_path);
        let router = middleware::instrument(app, AccessLog::new(self.latency), Some(Arc::new(cors)));

        let (finished, _) = watch::channel(false);
        Ok(SimpleServer {
            handle: server.handle(),
            local_addr: server.local_addr(),
            pending: Mutex::new(Some((server, router))),
            grace: self.config.timeouts.shutdown(),
            finished,
        })
    }
}

/// An HTTP-only server implementing [`Service`].
pub struct SimpleServer {
    pending: Mutex<Option<(HttpServer, Router)>>,
    handle: Handle,
    local_addr: std::net::SocketAddr,
    grace: Duration,
    finished: watch::Sender<bool>,
}

impl SimpleServer {
    pub fn builder(config: ServeConfig, router: Router) -> SimpleServerBuilder {
        SimpleServerBuilder {
            config,
            router,
            liveness_path: endpoints::HEALTH_PATH.to_string(),
            cors: None,
            latency: LatencyRecorder::noop(),
        }
    }

    pub fn local_addr(&self) -> std::net::SocketAddr {
        self.local_addr
    }

    fn started(&self) -> bool {
        self.pending
            .lock()
            .map(|pending| pending.is_none())
            .unwrap_or(true)
    }
}

impl Service for SimpleServer {
    async fn run(&self) -> crate::Result<()> {
        let taken = self.pending.lock().ok().and_then(|mut pending| pending.take());
        let Some((server, router)) = taken else {
            return Err(crate::Error::AlreadyStarted);
        };

        tracing::info!(address = %self.local_addr, tls = server.is_tls(), "HTTP server started");
        let result = server.serve(router).await;
        self.finished.send_replace(true);
        result
    }

    async fn shutdown(&self) -> crate::Result<()> {
        if !self.started() {
            return Ok(());
        }

        tracing::info!(grace_ms = self.grace.as_millis() as u64, "Stopping HTTP server");
        self.handle.graceful_shutdown(Some(self.grace));

        let mut finished = self.finished.subscribe();
        let stopped = tokio::time::timeout(self.grace + HARD_STOP_MARGIN, finished.wait_for(|done| *done))
            .await
            .is_ok();
        if !stopped {
            self.handle.shutdown();
            return Err(crate::Error::DrainTimeout {
                protocol: Protocol::Http,
                timeout: self.grace,
            });
        }

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

impl std::fmt::Debug for SimpleServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimpleServer")
            .field("local_addr", &self.local_addr)
            .field("grace", &self.grace)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::routing::get;

    fn local_config() -> ServeConfig {
        let mut config = ServeConfig::default();
        config.listener.http_addr = "127.0.0.1:0".into();
        config.timeouts.shutdown_secs = 2;
        config
    }

    fn app() -> Router {
        Router::new().route("/", get(|| async { "simple" }))
    }

    #[tokio::test]
    async fn shutdown_before_run_returns_immediately() {
        let server = SimpleServer::builder(local_config(), app()).build().await.unwrap();
        tokio::time::timeout(Duration::from_millis(100), server.shutdown())
            .await
            .expect("no drain to wait for")
            .unwrap();
    }

    #[tokio::test]
    async fn serves_liveness_and_routes_then_stops() {
        let server = Arc::new(
            SimpleServer::builder(local_config(), app())
                .liveness_path("/livez")
                .build()
                .await
                .unwrap(),
        );
        let addr = server.local_addr();
        let running = tokio::spawn({
            let server = server.clone();
            async move { server.run().await }
        });

        let client = reqwest::Client::new();
        let mut live = None;
        for _ in 0..50 {
            if let Ok(response) = client.get(format!("http://{addr}/livez")).send().await {
                live = Some(response.status());
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(live, Some(reqwest::StatusCode::OK));

        let body = client
            .get(format!("http://{addr}/"))
            .send()
            .await
            .unwrap()
            .text()
            .await
            .unwrap();
        assert_eq!(body, "simple");

        let delete = client.delete(format!("http://{addr}/")).send().await.unwrap();
        assert_eq!(delete.status(), reqwest::StatusCode::METHOD_NOT_ALLOWED);

        server.shutdown().await.unwrap();
        running.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn second_run_is_rejected() {
        let server = Arc::new(SimpleServer::builder(local_config(), app()).build().await.unwrap());
        let running = tokio::spawn({
            let server = server.clone();
            async move { server.run().await }
        });
        while !server.started() {
            tokio::task::yield_now().await;
        }

        assert!(matches!(server.run().await, Err(crate::Error::AlreadyStarted)));
        server.shutdown().await.unwrap();
        running.await.unwrap().unwrap();
    }
}
