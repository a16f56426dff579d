//! The hyper service behind every inbound request.
//!
//! Dispatch is a literal-path match. All responses, error responses
//! included, pass through the same envelope that applies CORS headers and
//! records the request log line and metrics.

use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;

use http::request::Parts;
use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use hyper::header::{
    ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN,
    HeaderValue,
};
use hyper::service::Service;
use hyper::{HeaderMap, Method, Request, Response, StatusCode};
use resolver::{IdentityClient, LookupKind};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use shared::{gauge, histogram};

use crate::api;
use crate::api::utils::{self, HandlerBody};
use crate::errors::{LookupRouterError, Result};
use crate::metrics_defs::{REQUEST_DURATION, REQUESTS_INFLIGHT};

/// State shared by every request: the upstream client and the token that
/// cancels in-flight lookups on shutdown.
pub struct LookupState {
    pub client: IdentityClient,
    pub shutdown: CancellationToken,
    pub started_at: Instant,
}

#[derive(Clone)]
pub struct LookupService {
    state: Arc<LookupState>,
}

impl LookupService {
    pub fn new(client: IdentityClient, shutdown: CancellationToken) -> Self {
        Self {
            state: Arc::new(LookupState {
                client,
                shutdown,
                started_at: Instant::now(),
            }),
        }
    }
}

/// Which handler a request head maps to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum RouteMatch {
    Lookup(LookupKind),
    Health,
    Descriptor,
    Preflight,
    NotFound,
}

impl RouteMatch {
    fn of(method: &Method, path: &str) -> Self {
        if method == Method::OPTIONS {
            return RouteMatch::Preflight;
        }
        if method != Method::GET {
            return RouteMatch::NotFound;
        }
        match path {
            "/phone" | "/identities/phone" => RouteMatch::Lookup(LookupKind::Phone),
            "/email" | "/identities/email" => RouteMatch::Lookup(LookupKind::Email),
            "/address" | "/identities/address" => RouteMatch::Lookup(LookupKind::Address),
            "/health" => RouteMatch::Health,
            "/" | "/info" => RouteMatch::Descriptor,
            _ => RouteMatch::NotFound,
        }
    }

    /// Value for the `handler` metric tag.
    fn handler_label(&self) -> &'static str {
        match self {
            RouteMatch::Lookup(kind) => kind.query_param(),
            RouteMatch::Health => "health",
            RouteMatch::Descriptor => "service_info",
            RouteMatch::Preflight => "preflight",
            RouteMatch::NotFound => "not_found",
        }
    }
}

async fn dispatch(
    state: &LookupState,
    route: RouteMatch,
    parts: &Parts,
) -> Result<Response<HandlerBody>> {
    match route {
        RouteMatch::Lookup(kind) => api::lookup::handle(state, kind, parts.uri.query()).await,
        RouteMatch::Health => api::service_info::health(state),
        RouteMatch::Descriptor => api::service_info::descriptor(),
        RouteMatch::Preflight => preflight(),
        RouteMatch::NotFound => utils::json_error(
            StatusCode::NOT_FOUND,
            "not_found",
            &format!("no route for {} {}", parts.method, parts.uri.path()),
        ),
    }
}

fn preflight() -> Result<Response<HandlerBody>> {
    Ok(Response::builder()
        .status(StatusCode::NO_CONTENT)
        .body(Full::new(Bytes::new()).map_err(|e| match e {}).boxed())?)
}

/// Browser callers are allowed from anywhere; every response carries the
/// same wildcard grant.
fn apply_cors(headers: &mut HeaderMap) {
    headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    headers.insert(
        ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET, OPTIONS"),
    );
    headers.insert(
        ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Content-Type"),
    );
}

impl<B> Service<Request<B>> for LookupService
where
    B: hyper::body::Body + Send + 'static,
{
    type Response = Response<HandlerBody>;
    type Error = LookupRouterError;
    type Future =
        Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send + 'static>>;

    fn call(&self, req: Request<B>) -> Self::Future {
        let state = self.state.clone();
        // Every endpoint reads only the request head.
        let (parts, _body) = req.into_parts();

        Box::pin(async move {
            let route = RouteMatch::of(&parts.method, parts.uri.path());
            let started = Instant::now();
            gauge!(REQUESTS_INFLIGHT).increment(1.0);
            let outcome = dispatch(&state, route, &parts).await;
            gauge!(REQUESTS_INFLIGHT).decrement(1.0);

            let mut response = match outcome {
                Ok(response) => response,
                Err(e) => {
                    error!(
                        method = %parts.method,
                        path = parts.uri.path(),
                        error = %e,
                        "handler failed"
                    );
                    utils::json_error(
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "internal_error",
                        "internal error",
                    )?
                }
            };
            apply_cors(response.headers_mut());

            let elapsed = started.elapsed();
            histogram!(
                REQUEST_DURATION,
                "handler" => route.handler_label(),
                "status" => response.status().as_u16().to_string(),
            )
            .record(elapsed.as_secs_f64());
            info!(
                method = %parts.method,
                path = parts.uri.path(),
                status = response.status().as_u16(),
                handler = route.handler_label(),
                elapsed_ms = elapsed.as_millis() as u64,
                "request handled"
            );
            Ok(response)
        })
    }
}
