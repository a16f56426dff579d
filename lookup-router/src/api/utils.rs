use std::collections::HashMap;

use http_body_util::combinators::BoxBody;
use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use hyper::header::CONTENT_TYPE;
use hyper::{Response, StatusCode};
use serde::Serialize;

use crate::errors::{LookupRouterError, Result};

pub type HandlerBody = BoxBody<Bytes, LookupRouterError>;

/// Serializes `value` into a JSON response with the given status.
pub fn json_response<T: Serialize>(
    status: StatusCode,
    value: &T,
) -> Result<Response<HandlerBody>> {
    let bytes = serde_json::to_vec(value).map(Bytes::from)?;
    Ok(Response::builder()
        .status(status)
        .header(CONTENT_TYPE, "application/json")
        .body(Full::new(bytes).map_err(|e| match e {}).boxed())?)
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    message: &'a str,
}

/// The error envelope every non-forwarded failure response uses.
pub fn json_error(status: StatusCode, error: &str, message: &str) -> Result<Response<HandlerBody>> {
    json_response(status, &ErrorBody { error, message })
}

/// Decodes a query string into its key/value pairs. Later duplicates win.
pub fn parse_query(query: Option<&str>) -> HashMap<String, String> {
    query
        .map(|q| url::form_urlencoded::parse(q.as_bytes()).into_owned().collect())
        .unwrap_or_default()
}
