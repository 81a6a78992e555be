//! CORS preflight handling.
//!
//! - `OPTIONS` is answered here and never reaches the inner handler
//! - Allowed methods are forwarded with the allow headers attached
//! - Anything else is `405 Method Not Allowed`
//! - gRPC calls pass through untouched when an RPC engine shares the
//!   listener; browsers never send them

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderValue, Method, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::config::validation::ValidationError;
use crate::config::CorsConfig;
use crate::http::dispatch::is_rpc_request;

/// Preflight cache lifetime: 24 hours.
pub const MAX_AGE_SECS: u32 = 86_400;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Origins {
    /// Any origin. `vary` adds `Vary: Origin` on preflight.
    Any { vary: bool },
    /// Origins whose hostname equals or ends with one of these domains.
    Suffixes(Vec<String>),
}

/// Which origins and methods are allowed cross-origin.
#[derive(Debug, Clone)]
pub struct CorsPolicy {
    methods: Vec<Method>,
    allow_methods: HeaderValue,
    origins: Origins,
    rpc_passthrough: bool,
}

impl CorsPolicy {
    /// Any origin, `GET` and `POST`.
    pub fn allow_all() -> Self {
        Self::new(vec![Method::GET, Method::POST], Origins::Any { vary: false })
    }

    /// Restrict origins to hostname suffixes; `["*"]` allows any origin.
    pub fn restricted(methods: Vec<Method>, origin_suffixes: &[String]) -> Self {
        let origins = if origin_suffixes.len() == 1 && origin_suffixes[0] == "*" {
            Origins::Any { vary: true }
        } else {
            Origins::Suffixes(
                origin_suffixes
                    .iter()
                    .map(|s| s.trim_start_matches('.').to_ascii_lowercase())
                    .collect(),
            )
        };
        Self::new(methods, origins)
    }

    /// The default configuration maps to [`allow_all`](Self::allow_all).
    pub fn from_config(config: &CorsConfig) -> Result<Self, ValidationError> {
        if *config == CorsConfig::default() {
            return Ok(Self::allow_all());
        }
        let methods = config
            .allowed_methods
            .iter()
            .map(|m| {
                Method::from_bytes(m.as_bytes()).map_err(|_| ValidationError {
                    field: "cors.allowed_methods",
                    message: format!("invalid method {m:?}"),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::restricted(methods, &config.allowed_origins))
    }

    fn new(methods: Vec<Method>, origins: Origins) -> Self {
        let joined = methods
            .iter()
            .map(Method::as_str)
            .collect::<Vec<_>>()
            .join(", ");
        let allow_methods =
            HeaderValue::from_str(&joined).unwrap_or_else(|_| HeaderValue::from_static("GET, POST"));
        Self {
            methods,
            allow_methods,
            origins,
            rpc_passthrough: false,
        }
    }

    /// Forward gRPC requests without CORS checks, for a listener shared
    /// with an RPC engine.
    pub fn with_rpc_passthrough(mut self) -> Self {
        self.rpc_passthrough = true;
        self
    }

    pub fn allows_method(&self, method: &Method) -> bool {
        self.methods.contains(method)
    }

    /// The `Access-Control-Allow-Origin` value for a request origin, if allowed.
    fn allow_origin(&self, origin: Option<&str>) -> Option<HeaderValue> {
        match &self.origins {
            Origins::Any { .. } => Some(HeaderValue::from_static("*")),
            Origins::Suffixes(suffixes) => {
                let origin = origin?;
                let host = origin_host(origin)?;
                let allowed = suffixes.iter().any(|suffix| {
                    host == suffix.as_str()
                        || (host.len() > suffix.len()
                            && host.ends_with(suffix.as_str())
                            && host.as_bytes()[host.len() - suffix.len() - 1] == b'.')
                });
                allowed.then(|| HeaderValue::from_str(origin).ok()).flatten()
            }
        }
    }

    fn apply(&self, response: &mut Response, allow_origin: HeaderValue) {
        let headers = response.headers_mut();
        headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, allow_origin);
        headers.insert(header::ACCESS_CONTROL_ALLOW_METHODS, self.allow_methods.clone());
        headers.insert(header::ACCESS_CONTROL_MAX_AGE, HeaderValue::from(MAX_AGE_SECS));
    }
}

/// Lowercased hostname of an `Origin` header value.
fn origin_host(origin: &str) -> Option<String> {
    let rest = origin.split_once("://").map_or(origin, |(_, rest)| rest);
    let host = rest.split('/').next()?;
    let host = match host.rsplit_once(':') {
        Some((h, port)) if port.bytes().all(|b| b.is_ascii_digit()) => h,
        _ => host,
    };
    (!host.is_empty()).then(|| host.to_ascii_lowercase())
}

pub async fn cors_middleware(
    State(policy): State<Arc<CorsPolicy>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if policy.rpc_passthrough && is_rpc_request(&request) {
        return next.run(request).await;
    }

    let origin = request
        .headers()
        .get(header::ORIGIN)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);
    let allow_origin = policy.allow_origin(origin.as_deref());

    if request.method() == Method::OPTIONS {
        let Some(allow_origin) = allow_origin else {
            return StatusCode::FORBIDDEN.into_response();
        };
        let vary = matches!(policy.origins, Origins::Any { vary: true });
        let mut response = StatusCode::NO_CONTENT.into_response();
        policy.apply(&mut response, allow_origin);
        if vary {
            response
                .headers_mut()
                .append(header::VARY, HeaderValue::from_static("Origin"));
        }
        return response;
    }

    if !policy.allows_method(request.method()) {
        return StatusCode::METHOD_NOT_ALLOWED.into_response();
    }

    let mut response = next.run(request).await;
    if let Some(allow_origin) = allow_origin {
        policy.apply(&mut response, allow_origin);
    }
    response
}
