use chrono::{SecondsFormat, Utc};
use hyper::{Response, StatusCode};
use serde_json::json;

use crate::api::utils::{self, HandlerBody};
use crate::errors::Result;
use crate::service::LookupState;

/// Liveness endpoint reporting wall-clock time and time since startup.
pub fn health(state: &LookupState) -> Result<Response<HandlerBody>> {
    let body = json!({
        "status": "healthy",
        "timestamp": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        "uptime_secs": state.started_at.elapsed().as_secs(),
    });
    utils::json_response(StatusCode::OK, &body)
}

/// Root descriptor listing the available endpoints.
pub fn descriptor() -> Result<Response<HandlerBody>> {
    let body = json!({
        "service": "switchboard",
        "endpoints": [
            "GET /phone?phone=15551234567&template=...",
            "GET /email?email=someone@example.com&template=...",
            "GET /address?address=123 Main St&template=...",
            "GET /health",
        ],
        "features": [
            "bounded retries with exponential backoff",
            "per-attempt upstream credentials",
        ],
    });
    utils::json_response(StatusCode::OK, &body)
}
