//! HTTP façade exposing the identity lookup endpoints.
//!
//! [`service`] owns dispatch and the per-request envelope (CORS, logging,
//! metrics), the [`api`] modules implement the individual endpoints, and
//! the resolver crate does the actual upstream work.

pub mod api;
pub mod errors;
pub mod metrics_defs;
pub mod service;

use resolver::IdentityClient;
use shared::http::run_http_service;
use tokio_util::sync::CancellationToken;

use crate::errors::LookupRouterError;
use crate::service::LookupService;

/// Serves the lookup API on `host:port` until `shutdown` is cancelled.
///
/// The same token is handed to every in-flight lookup, so cancelling it
/// stops the accept loop and aborts outstanding upstream calls together.
pub async fn run(
    host: &str,
    port: u16,
    client: IdentityClient,
    shutdown: CancellationToken,
) -> Result<(), LookupRouterError> {
    let service = LookupService::new(client, shutdown.clone());
    run_http_service(host, port, service, shutdown).await
}
