//! Lifecycle coordinator: listeners, engines and their shutdown.
//!
//! # Responsibilities
//! - Validate config and load TLS material before any listener opens
//! - Bind one listener (shared mode) or two (split mode)
//! - Install the middleware chain and built-in endpoints
//! - Produce a [`Runner`] that serves until cancelled, then drains
//!
//! # Data Flow
//! ```text
//! Shared:  listener → cors → access_log → dispatcher → {app router | RPC engine}
//!
//! Split:   http listener → cors → access_log → app router
//!          rpc listener  → access_log → RPC engine
//! ```
//!
//! # Design Decisions
//! - The mode is explicit in config (`rpc_addr` set or not), never inferred
//!   from two equal address strings
//! - Bind errors are returned from `build`, so "started" is never logged for
//!   a listener that failed to open
//! - Both engines on a listener drain concurrently and both are awaited
//! - On a shared listener gRPC calls bypass the CORS method gate

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum_server::{tls_rustls::RustlsConfig, Handle};

use crate::config::loader::ConfigError;
use crate::config::validation::validate_config;
use crate::config::{ServeConfig, ServeMode};
use crate::http::dispatch::ProtocolDispatcher;
use crate::http::endpoints;
use crate::http::middleware::{self, AccessLog, CorsPolicy};
use crate::http::server::HttpServer;
use crate::lifecycle::runner::Runner;
use crate::lifecycle::shutdown;
use crate::lifecycle::signals::SignalContext;
use crate::net::tls::load_tls_config;
use crate::observability::{LatencyRecorder, Metrics, MetricsExporter};
use crate::rpc::RpcEngine;

/// A bound listener with the router it will serve and the RPC engine that
/// shares its lifetime, if any.
struct BoundEngine {
    server: HttpServer,
    router: Router,
    rpc: Option<RpcEngine>,
    label: &'static str,
}

/// Configures a [`Coordinator`].
pub struct CoordinatorBuilder {
    config: ServeConfig,
    app: Router,
    rpc: Option<RpcEngine>,
    metrics: Option<Metrics>,
    cors: Option<CorsPolicy>,
}

impl CoordinatorBuilder {
    /// Serve `engine` alongside the HTTP router.
    pub fn rpc(mut self, engine: RpcEngine) -> Self {
        self.rpc = Some(engine);
        self
    }

    /// Record latency into `metrics` and expose it on `/metrics`.
    pub fn metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Override the CORS policy derived from config.
    pub fn cors(mut self, policy: CorsPolicy) -> Self {
        self.cors = Some(policy);
        self
    }

    /// Validate, load TLS and bind. Nothing is served until the runner runs.
    pub async fn build(self) -> crate::Result<Coordinator> {
        let config = self.config;
        validate_config(&config).map_err(ConfigError::Validation)?;

        let tls = match &config.tls {
            Some(tls) => Some(load_tls_config(tls).await.map_err(crate::Error::Tls)?),
            None => None,
        };

        let cors = match self.cors {
            Some(policy) => policy,
            None => CorsPolicy::from_config(&config.cors)
                .map_err(|e| ConfigError::Validation(vec![e]))?,
        };

        let (latency, exporter) = match &self.metrics {
            Some(metrics) => (metrics.latency(), Some(metrics.exporter())),
            None => (LatencyRecorder::noop(), None::<Arc<dyn MetricsExporter>>),
        };
        let access = AccessLog::new(latency);

        let app = middleware::request_timeout(self.app, config.timeouts.request());
        let app = endpoints::mount(app, exporter);

        let mode = config.listener.mode();
        let (http, rpc) = match &mode {
            ServeMode::Shared { addr } => {
                let server = HttpServer::bind(addr, tls, &config).await?;
                let dispatcher = ProtocolDispatcher::new(app, self.rpc.clone()).into_router();
                let cors = if self.rpc.is_some() {
                    cors.with_rpc_passthrough()
                } else {
                    cors
                };
                let http = BoundEngine {
                    server,
                    router: middleware::instrument(dispatcher, access, Some(Arc::new(cors))),
                    rpc: self.rpc.clone(),
                    label: "shared",
                };
                (http, None)
            }
            ServeMode::Split { http_addr, rpc_addr } => {
                let server = HttpServer::bind(http_addr, tls.clone(), &config).await?;
                let http = BoundEngine {
                    server,
                    router: middleware::instrument(app, access.clone(), Some(Arc::new(cors))),
                    rpc: None,
                    label: "http",
                };
                let rpc = match &self.rpc {
                    Some(engine) => Some(bind_rpc(rpc_addr, tls, &config, engine, access).await?),
                    None => {
                        tracing::warn!(address = %rpc_addr, "No RPC engine configured, RPC listener not opened");
                        None
                    }
                };
                (http, rpc)
            }
        };

        Ok(Coordinator {
            mode,
            grace: config.timeouts.shutdown(),
            http,
            rpc,
            engine: self.rpc,
        })
    }
}

async fn bind_rpc(
    addr: &str,
    tls: Option<RustlsConfig>,
    config: &ServeConfig,
    engine: &RpcEngine,
    access: AccessLog,
) -> crate::Result<BoundEngine> {
    let server = HttpServer::bind(addr, tls, config).await?;
    Ok(BoundEngine {
        server,
        router: middleware::instrument(engine.clone().into_router(), access, None),
        rpc: Some(engine.clone()),
        label: "rpc",
    })
}

/// Bound listeners ready to serve.
pub struct Coordinator {
    mode: ServeMode,
    grace: Duration,
    http: BoundEngine,
    rpc: Option<BoundEngine>,
    engine: Option<RpcEngine>,
}

impl Coordinator {
    /// Start configuring a coordinator for `app` with `config`.
    pub fn builder(config: ServeConfig, app: Router) -> CoordinatorBuilder {
        CoordinatorBuilder {
            config,
            app,
            rpc: None,
            metrics: None,
            cors: None,
        }
    }

    /// One listener on `addr` serving both protocols, default settings.
    pub fn shared(addr: impl Into<String>, app: Router) -> CoordinatorBuilder {
        let mut config = ServeConfig::default();
        config.listener.http_addr = addr.into();
        config.listener.rpc_addr = None;
        Self::builder(config, app)
    }

    pub fn mode(&self) -> &ServeMode {
        &self.mode
    }

    /// Address the HTTP (or shared) listener is bound to.
    pub fn http_addr(&self) -> SocketAddr {
        self.http.server.local_addr()
    }

    /// Address RPC calls are accepted on, if any engine is configured.
    pub fn rpc_addr(&self) -> Option<SocketAddr> {
        match &self.rpc {
            Some(rpc) => Some(rpc.server.local_addr()),
            None => self.http.rpc.as_ref().map(|_| self.http_addr()),
        }
    }

    /// Handle of the HTTP (or shared) listener.
    pub fn http_handle(&self) -> Handle {
        self.http.server.handle()
    }

    /// Handle of the dedicated RPC listener (split mode only).
    pub fn rpc_handle(&self) -> Option<Handle> {
        self.rpc.as_ref().map(|rpc| rpc.server.handle())
    }

    pub fn rpc_engine(&self) -> Option<&RpcEngine> {
        self.engine.as_ref()
    }

    pub fn shutdown_timeout(&self) -> Duration {
        self.grace
    }

    /// Serve until `ctx` is cancelled, then drain every listener.
    pub async fn run(self, ctx: SignalContext) -> crate::Result<()> {
        self.into_runner().run(ctx).await
    }

    /// The serve-and-drain operation for all listeners.
    ///
    /// In split mode the two listeners run as one: the first error stops the
    /// other, and that error is returned.
    pub fn into_runner(self) -> Runner {
        let http = listener_runner(self.http, self.grace);
        match self.rpc {
            Some(rpc) => http.join(listener_runner(rpc, self.grace)),
            None => http,
        }
    }
}

impl std::fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Coordinator")
            .field("mode", &self.mode)
            .field("http_addr", &self.http_addr())
            .field("rpc_addr", &self.rpc_addr())
            .field("grace", &self.grace)
            .finish()
    }
}

fn listener_runner(bound: BoundEngine, grace: Duration) -> Runner {
    Runner::new(move |ctx: SignalContext| async move {
        let BoundEngine {
            server,
            router,
            rpc,
            label,
        } = bound;
        let addr = server.local_addr();
        let handle = server.handle();

        tracing::info!(
            address = %addr,
            tls = server.is_tls(),
            protocol = label,
            rpc = rpc.is_some(),
            "Listener started"
        );
        let mut serving = tokio::spawn(server.serve(router));

        tokio::select! {
            joined = &mut serving => {
                joined??;
                tracing::warn!(address = %addr, "Listener stopped before shutdown was requested");
                Ok(())
            }
            _ = ctx.cancelled() => {
                tracing::info!(address = %addr, protocol = label, "Shutdown requested");
                let serving = async move { serving.await? };
                let result = shutdown::drain(&ctx, grace, &handle, serving, rpc.as_ref()).await;
                match &result {
                    Ok(()) => tracing::info!(address = %addr, "Drain finished"),
                    Err(e) => tracing::warn!(address = %addr, error = %e, "Drain failed"),
                }
                result
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::routing::get;

    fn app() -> Router {
        Router::new().route("/", get(|| async { "hello" }))
    }

    fn local_config() -> ServeConfig {
        let mut config = ServeConfig::default();
        config.listener.http_addr = "127.0.0.1:0".into();
        config.timeouts.shutdown_secs = 2;
        config
    }

    #[tokio::test]
    async fn shared_mode_binds_one_listener() {
        let coordinator = Coordinator::builder(local_config(), app())
            .rpc(RpcEngine::from_routes(tonic::service::Routes::default()))
            .build()
            .await
            .unwrap();
        assert!(coordinator.mode().is_shared());
        assert_eq!(coordinator.rpc_addr(), Some(coordinator.http_addr()));
    }

    #[tokio::test]
    async fn split_mode_binds_two_listeners() {
        let mut config = local_config();
        config.listener.rpc_addr = Some("127.0.0.1:0".into());
        let coordinator = Coordinator::builder(config, app())
            .rpc(RpcEngine::from_routes(tonic::service::Routes::default()))
            .build()
            .await
            .unwrap();

        assert!(!coordinator.mode().is_shared());
        let rpc = coordinator.rpc_addr().unwrap();
        assert_ne!(rpc, coordinator.http_addr());
        assert!(coordinator.rpc_handle().is_some());
    }

    #[tokio::test]
    async fn no_engine_means_no_rpc_address() {
        let coordinator = Coordinator::builder(local_config(), app()).build().await.unwrap();
        assert_eq!(coordinator.rpc_addr(), None);
        assert!(coordinator.rpc_engine().is_none());
    }

    #[tokio::test]
    async fn missing_tls_material_fails_before_binding() {
        let mut config = local_config();
        config.tls = Some(crate::config::TlsConfig {
            cert_path: "/nonexistent/cert.pem".into(),
            key_path: "/nonexistent/key.pem".into(),
        });
        let err = Coordinator::builder(config, app()).build().await.unwrap_err();
        assert!(matches!(err, crate::Error::Tls(_)));
    }

    #[tokio::test]
    async fn invalid_config_is_rejected() {
        let mut config = local_config();
        config.timeouts.shutdown_secs = 0;
        let err = Coordinator::builder(config, app()).build().await.unwrap_err();
        assert!(matches!(err, crate::Error::Config(ConfigError::Validation(_))));
    }

    #[tokio::test]
    async fn runner_stops_cleanly_on_cancel() {
        let coordinator = Coordinator::shared("127.0.0.1:0", app()).build().await.unwrap();
        let addr = coordinator.http_addr();
        let handle = coordinator.http_handle();
        let ctx = SignalContext::manual();
        let task = tokio::spawn(coordinator.run(ctx.clone()));

        assert_eq!(handle.listening().await, Some(addr));
        let body = reqwest::get(format!("http://{addr}/")).await.unwrap().text().await.unwrap();
        assert_eq!(body, "hello");

        ctx.trigger();
        task.await.unwrap().unwrap();
    }
}
