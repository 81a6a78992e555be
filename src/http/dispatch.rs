//! Per-request protocol dispatch on a shared listener.
//!
//! # Data Flow
//! ```text
//! request
//!     → HTTP/2 and content-type starts with "application/grpc"?
//!         yes → RpcEngine
//!         no  → HTTP router
//! ```
//!
//! The decision is made per request, not per connection. An HTTP/1.1
//! request carrying a gRPC content type goes to the HTTP router.

use axum::{
    extract::{Request, State},
    http::{header, Version},
    response::Response,
    Router,
};
use tower::ServiceExt;

use crate::rpc::{RpcEngine, RPC_CONTENT_TYPE};

/// Whether a request belongs to the RPC engine.
pub fn is_rpc_request<B>(request: &axum::http::Request<B>) -> bool {
    request.version() == Version::HTTP_2
        && request
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with(RPC_CONTENT_TYPE))
}

/// Routes each request to the RPC engine or the HTTP router.
#[derive(Clone)]
pub struct ProtocolDispatcher {
    http: Router,
    rpc: Option<RpcEngine>,
}

impl ProtocolDispatcher {
    pub fn new(http: Router, rpc: Option<RpcEngine>) -> Self {
        Self { http, rpc }
    }

    /// A router whose every request goes through [`dispatch`].
    pub fn into_router(self) -> Router {
        Router::new().fallback(dispatch).with_state(self)
    }
}

async fn dispatch(State(dispatcher): State<ProtocolDispatcher>, request: Request) -> Response {
    if let Some(engine) = &dispatcher.rpc {
        if is_rpc_request(&request) {
            return engine.serve(request).await;
        }
    }

    match dispatcher.http.oneshot(request).await {
        Ok(response) => response,
        Err(never) => match never {},
    }
}

impl std::fmt::Debug for ProtocolDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProtocolDispatcher")
            .field("rpc", &self.rpc)
            .finish_non_exhaustive()
    }
}
