//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::io;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::{
    body::{Body, Bytes, HttpBody},
    http::{header, Request, Response},
};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use tokio::task::JoinHandle;
use tracing::subscriber::DefaultGuard;
use tracing_subscriber::fmt::MakeWriter;

use usvc::{Coordinator, ServeConfig, SignalContext};

/// In-memory log sink for asserting on emitted lines.
#[derive(Clone, Default)]
pub struct LogCapture {
    buf: Arc<Mutex<Vec<u8>>>,
}

impl LogCapture {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.buf.lock().unwrap()).into_owned()
    }
}

impl io::Write for LogCapture {
    fn write(&mut self, bytes: &[u8]) -> io::Result<usize> {
        self.buf.lock().unwrap().extend_from_slice(bytes);
        Ok(bytes.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for LogCapture {
    type Writer = LogCapture;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// Route this thread's log output into a buffer until the guard drops.
///
/// Only sees events from the current thread, so pair it with the default
/// single-threaded `#[tokio::test]` runtime.
pub fn capture_logs() -> (LogCapture, DefaultGuard) {
    let capture = LogCapture::default();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(capture.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::INFO)
        .finish();
    let guard = tracing::subscriber::set_default(subscriber);
    (capture, guard)
}

/// Config bound to an ephemeral local port with a short grace period.
pub fn local_config() -> ServeConfig {
    let mut config = ServeConfig::default();
    config.listener.http_addr = "127.0.0.1:0".into();
    config.timeouts.shutdown_secs = 5;
    config
}

/// A coordinator serving in the background.
pub struct Running {
    pub http_addr: SocketAddr,
    pub rpc_addr: Option<SocketAddr>,
    pub ctx: SignalContext,
    pub task: JoinHandle<usvc::Result<()>>,
}

impl Running {
    /// Request graceful shutdown and wait for the outcome.
    pub async fn stop(self) -> usvc::Result<()> {
        self.ctx.trigger();
        self.task.await.expect("coordinator task panicked")
    }
}

pub fn spawn(coordinator: Coordinator) -> Running {
    let http_addr = coordinator.http_addr();
    let rpc_addr = coordinator.rpc_addr();
    let ctx = SignalContext::manual();
    let task = tokio::spawn(coordinator.run(ctx.clone()));
    Running {
        http_addr,
        rpc_addr,
        ctx,
        task,
    }
}

/// HTTP/2 prior-knowledge (h2c) client.
pub fn h2_client() -> Client<HttpConnector, Body> {
    Client::builder(TokioExecutor::new())
        .http2_only(true)
        .build_http()
}

/// A gRPC-shaped request: POST with the `application/grpc` content type.
pub fn grpc_request(addr: SocketAddr, path: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(format!("http://{addr}{path}"))
        .header(header::CONTENT_TYPE, "application/grpc")
        .header("te", "trailers")
        .body(Body::empty())
        .unwrap()
}

/// Collect a client response body as text.
pub async fn text<B>(response: Response<B>) -> String
where
    B: HttpBody<Data = Bytes> + Send + 'static,
    B::Error: Into<axum::BoxError>,
{
    let bytes = axum::body::to_bytes(Body::new(response.into_body()), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}
