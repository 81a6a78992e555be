//! HTTP server engine.
//!
//! # Responsibilities
//! - Own a bound listener and, optionally, its TLS configuration
//! - Serve HTTP/1.1 and HTTP/2 (h2c or ALPN `h2`) on it
//! - Apply connection limits: header read timeout, header size cap
//! - Expose a [`Handle`] for graceful and immediate stop
//!
//! # Design Decisions
//! - Binding happens before serving so the address is known (port 0) and
//!   bind errors surface at build time
//! - A stop requested through the handle ends `serve` with `Ok(())`; only
//!   genuine I/O failures are errors

use std::net::SocketAddr;
use std::time::Duration;

use axum::Router;
use axum_server::{tls_rustls::RustlsConfig, Handle};
use hyper_util::{
    rt::{TokioExecutor, TokioTimer},
    server::conn::auto,
};

use crate::config::validation::MIN_HEADER_BYTES;
use crate::config::ServeConfig;
use crate::error::Protocol;
use crate::net::BoundListener;

/// Connection-level limits applied to every accepted connection.
#[derive(Debug, Clone, Copy)]
pub struct ConnectionLimits {
    pub read_header_timeout: Duration,
    pub max_header_bytes: usize,
}

impl ConnectionLimits {
    pub fn from_config(config: &ServeConfig) -> Self {
        Self {
            read_header_timeout: config.timeouts.read_header(),
            max_header_bytes: config.listener.max_header_bytes,
        }
    }

    fn apply(&self, builder: &mut auto::Builder<TokioExecutor>) {
        builder
            .http1()
            .timer(TokioTimer::new())
            .header_read_timeout(self.read_header_timeout)
            .max_buf_size(self.max_header_bytes.max(MIN_HEADER_BYTES));
        builder
            .http2()
            .timer(TokioTimer::new())
            .max_header_list_size(u32::try_from(self.max_header_bytes).unwrap_or(u32::MAX));
    }
}

/// An HTTP server bound to a listener, not yet serving.
pub struct HttpServer {
    listener: BoundListener,
    tls: Option<RustlsConfig>,
    handle: Handle,
    limits: ConnectionLimits,
}

impl HttpServer {
    pub fn new(listener: BoundListener, tls: Option<RustlsConfig>, limits: ConnectionLimits) -> Self {
        Self {
            listener,
            tls,
            handle: Handle::new(),
            limits,
        }
    }

    /// Bind `addr` and prepare a server with the limits from `config`.
    pub async fn bind(
        addr: &str,
        tls: Option<RustlsConfig>,
        config: &ServeConfig,
    ) -> crate::Result<Self> {
        let listener = BoundListener::bind(addr).await?;
        Ok(Self::new(listener, tls, ConnectionLimits::from_config(config)))
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.listener.local_addr()
    }

    /// A handle for stopping the server once it is serving.
    pub fn handle(&self) -> Handle {
        self.handle.clone()
    }

    pub fn is_tls(&self) -> bool {
        self.tls.is_some()
    }

    /// Serve `router` until stopped through the handle or a fatal error.
    pub async fn serve(self, router: Router) -> crate::Result<()> {
        let addr = self.listener.local_addr();
        let make_service = router.into_make_service_with_connect_info::<SocketAddr>();
        let listener = self.listener.into_std();

        tracing::debug!(address = %addr, tls = self.tls.is_some(), "HTTP engine serving");

        let result = match self.tls {
            Some(tls) => {
                let mut server = axum_server::tls_rustls::from_tcp_rustls(listener, tls).handle(self.handle);
                self.limits.apply(server.http_builder());
                server.serve(make_service).await
            }
            None => {
                let mut server = axum_server::from_tcp(listener).handle(self.handle);
                self.limits.apply(server.http_builder());
                server.serve(make_service).await
            }
        };

        result.map_err(|source| crate::Error::Serve {
            protocol: Protocol::Http,
            source,
        })
    }
}

impl std::fmt::Debug for HttpServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpServer")
            .field("local_addr", &self.local_addr())
            .field("tls", &self.is_tls())
            .field("limits", &self.limits)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::routing::get;

    #[tokio::test]
    async fn serves_until_handle_stops_it() {
        let config = ServeConfig::default();
        let server = HttpServer::bind("127.0.0.1:0", None, &config).await.unwrap();
        let addr = server.local_addr();
        let handle = server.handle();
        assert!(!server.is_tls());

        let task = tokio::spawn(server.serve(Router::new().route("/", get(|| async { "hi" }))));
        assert_eq!(handle.listening().await, Some(addr));

        let body = reqwest::get(format!("http://{addr}/"))
            .await
            .unwrap()
            .text()
            .await
            .unwrap();
        assert_eq!(body, "hi");

        handle.graceful_shutdown(Some(Duration::from_secs(1)));
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn bind_failure_is_reported() {
        let config = ServeConfig::default();
        let first = HttpServer::bind("127.0.0.1:0", None, &config).await.unwrap();
        let taken = first.local_addr().to_string();
        let err = HttpServer::bind(&taken, None, &config).await.unwrap_err();
        assert!(matches!(err, crate::Error::Bind { .. }));
    }
}
