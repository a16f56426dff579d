use http_body_util::{BodyExt, Full};
use hyper::header::CONTENT_TYPE;
use hyper::{Response, StatusCode};
use resolver::{LookupKind, ResolverError, UpstreamResponse};
use tracing::error;

use crate::api::utils::{self, HandlerBody};
use crate::errors::Result;
use crate::service::LookupState;

/// Answers one lookup request: validates the query, runs the upstream call
/// and forwards whatever came back.
pub async fn handle(
    state: &LookupState,
    kind: LookupKind,
    query: Option<&str>,
) -> Result<Response<HandlerBody>> {
    let params = utils::parse_query(query);
    let Some(value) = params.get(kind.query_param()).filter(|v| !v.is_empty()) else {
        return utils::json_error(
            StatusCode::BAD_REQUEST,
            "missing_parameter",
            &format!("missing required '{}' query parameter", kind.query_param()),
        );
    };
    let template = params.get("template").map(String::as_str);

    match state
        .client
        .lookup(kind, value, template, &state.shutdown)
        .await
    {
        Ok(upstream) => forward(upstream),
        Err(e @ ResolverError::Exhausted { .. }) => {
            error!(kind = %kind, error = %e, "lookup exhausted");
            utils::json_error(
                StatusCode::GATEWAY_TIMEOUT,
                "upstream_unavailable",
                "the identity service did not respond, retry later",
            )
        }
        Err(ResolverError::Cancelled) => utils::json_error(
            StatusCode::SERVICE_UNAVAILABLE,
            "shutting_down",
            "the service is shutting down",
        ),
        Err(e) => {
            error!(kind = %kind, error = %e, "lookup failed");
            utils::json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "internal error",
            )
        }
    }
}

/// The upstream's status, content type and body pass through verbatim.
fn forward(upstream: UpstreamResponse) -> Result<Response<HandlerBody>> {
    let mut builder = Response::builder().status(upstream.status);
    if let Some(content_type) = &upstream.content_type {
        builder = builder.header(CONTENT_TYPE, content_type);
    }
    Ok(builder.body(Full::new(upstream.body).map_err(|e| match e {}).boxed())?)
}
