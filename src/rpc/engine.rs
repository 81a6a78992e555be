//! RPC engine handle.
//!
//! # Responsibilities
//! - Wrap any tower service speaking gRPC over `http::Request` (usually a
//!   `tonic` route set) behind a cloneable, type-erased handle
//! - Serve one call at a time on behalf of a listener or the dispatcher
//! - Graceful stop: refuse new calls, wait for in-flight ones
//!
//! # Design Decisions
//! - Calls arriving after stop get gRPC `UNAVAILABLE` so clients retry elsewhere
//! - A call stays in flight until its response body is done, so streaming
//!   responses hold off graceful stop
//! - The engine never owns a listener; the coordinator decides where it is served

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::{Body, Bytes, HttpBody},
    http::{header, HeaderValue, Request, Response, StatusCode},
    BoxError, Router,
};
use futures_util::future::BoxFuture;
use tower::{Service, ServiceExt};

use crate::error::Protocol;
use crate::http::body::hold_until_done;
use crate::lifecycle::drain::DrainTracker;

/// Media type prefix reserved by gRPC.
pub const RPC_CONTENT_TYPE: &str = "application/grpc";

const GRPC_STATUS: &str = "grpc-status";
const GRPC_MESSAGE: &str = "grpc-message";
const GRPC_INTERNAL: &str = "13";
const GRPC_UNAVAILABLE: &str = "14";

type ServeFn = dyn Fn(Request<Body>) -> BoxFuture<'static, Result<Response<Body>, BoxError>> + Send + Sync;

/// A running RPC server's request entry point and drain control.
#[derive(Clone)]
pub struct RpcEngine {
    serve: Arc<ServeFn>,
    tracker: DrainTracker,
}

impl RpcEngine {
    /// Wrap a tower service.
    pub fn new<S, B>(service: S) -> Self
    where
        S: Service<Request<Body>, Response = Response<B>> + Clone + Send + Sync + 'static,
        S::Error: Into<BoxError>,
        S::Future: Send + 'static,
        B: HttpBody<Data = Bytes> + Send + 'static,
        B::Error: Into<BoxError>,
    {
        let serve = move |request: Request<Body>| -> BoxFuture<'static, Result<Response<Body>, BoxError>> {
            let service = service.clone();
            Box::pin(async move {
                let response = service.oneshot(request).await.map_err(Into::into)?;
                Ok(response.map(Body::new))
            })
        };
        Self {
            serve: Arc::new(serve),
            tracker: DrainTracker::new(),
        }
    }

    /// Wrap a set of `tonic` services.
    pub fn from_routes(routes: tonic::service::Routes) -> Self {
        Self::new(routes)
    }

    /// Serve one call.
    pub async fn serve(&self, request: Request<Body>) -> Response<Body> {
        let Some(guard) = self.tracker.track() else {
            return grpc_error(GRPC_UNAVAILABLE, "server is shutting down");
        };

        match (self.serve)(request).await {
            Ok(response) => response.map(|body| hold_until_done(body, guard)),
            Err(e) => {
                tracing::error!(error = %e, "RPC service failed");
                grpc_error(GRPC_INTERNAL, "internal error")
            }
        }
    }

    /// Refuse new calls and wait up to `grace` for in-flight ones.
    pub async fn graceful_stop(&self, grace: Duration) -> crate::Result<()> {
        self.tracker.close();
        let in_flight = self.tracker.active();
        tracing::info!(in_flight, "Stopping RPC engine");

        tokio::time::timeout(grace, self.tracker.wait_idle())
            .await
            .map_err(|_| crate::Error::DrainTimeout {
                protocol: Protocol::Rpc,
                timeout: grace,
            })?;

        tracing::info!("RPC engine drained");
        Ok(())
    }

    /// A router sending every request to this engine, for a dedicated listener.
    pub fn into_router(self) -> Router {
        Router::new().fallback(move |request: Request<Body>| {
            let engine = self.clone();
            async move { engine.serve(request).await }
        })
    }

    /// Get current in-flight call count.
    pub fn in_flight(&self) -> usize {
        self.tracker.active()
    }

    pub fn is_stopping(&self) -> bool {
        self.tracker.is_closed()
    }
}

impl std::fmt::Debug for RpcEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcEngine")
            .field("in_flight", &self.in_flight())
            .field("stopping", &self.is_stopping())
            .finish()
    }
}

/// A trailers-only gRPC error response.
fn grpc_error(code: &'static str, message: &'static str) -> Response<Body> {
    let mut response = Response::new(Body::empty());
    *response.status_mut() = StatusCode::OK;
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(RPC_CONTENT_TYPE));
    headers.insert(GRPC_STATUS, HeaderValue::from_static(code));
    headers.insert(GRPC_MESSAGE, HeaderValue::from_static(message));
    response
}
