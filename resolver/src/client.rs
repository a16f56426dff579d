//! Client for the upstream identity-resolution API.
//!
//! A lookup is one logical call made of up to `retry.max_attempts`
//! sequential attempts. Each attempt gets its own freshly derived
//! credential and its own timeout; failed attempts are separated by an
//! exponential backoff. Receiving any HTTP response, success or error
//! status, settles the lookup. Only transport failures and timeouts are
//! retried.

use bytes::Bytes;
use reqwest::StatusCode;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use tokio::time::{Instant, sleep, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use url::Url;

use shared::{counter, histogram};

use crate::config::UpstreamConfig;
use crate::credentials::Credentials;
use crate::errors::{AttemptError, ResolverError, Result};
use crate::metrics_defs::{LOOKUPS_EXHAUSTED, UPSTREAM_ATTEMPTS, UPSTREAM_ATTEMPT_DURATION};

/// Which upstream identity endpoint a lookup targets.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LookupKind {
    Phone,
    Email,
    Address,
}

impl LookupKind {
    pub fn upstream_path(&self) -> &'static str {
        match self {
            LookupKind::Phone => "/v2/identities/byPhone",
            LookupKind::Email => "/v2/identities/byEmail",
            LookupKind::Address => "/v2/identities/byAddress",
        }
    }

    /// Query parameter carrying the lookup value, which doubles as the
    /// kind's display name.
    pub fn query_param(&self) -> &'static str {
        match self {
            LookupKind::Phone => "phone",
            LookupKind::Email => "email",
            LookupKind::Address => "address",
        }
    }
}

impl std::fmt::Display for LookupKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.query_param())
    }
}

/// Whatever the upstream answered, verbatim. Error statuses are included;
/// interpreting them is the caller's job.
#[derive(Clone, Debug)]
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub content_type: Option<String>,
    pub body: Bytes,
    /// How many attempts the lookup took, including the successful one.
    pub attempts: u32,
}

#[derive(Clone)]
pub struct IdentityClient {
    http: reqwest::Client,
    credentials: Credentials,
    config: UpstreamConfig,
}

impl IdentityClient {
    pub fn new(credentials: Credentials, config: UpstreamConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            credentials,
            config,
        }
    }

    /// Performs one logical lookup against the upstream.
    ///
    /// `template` falls back to the configured default when `None`.
    /// Cancelling `cancel` aborts the in-flight attempt and any pending
    /// backoff and returns [`ResolverError::Cancelled`].
    pub async fn lookup(
        &self,
        kind: LookupKind,
        value: &str,
        template: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<UpstreamResponse> {
        let mut url = Url::parse(&format!(
            "{}{}",
            self.config.origin.as_str().trim_end_matches('/'),
            kind.upstream_path()
        ))
        .map_err(|e| ResolverError::InvalidLookupUrl(e.to_string()))?;
        url.query_pairs_mut()
            .append_pair(kind.query_param(), value)
            .append_pair(
                "template",
                template.unwrap_or(&self.config.default_template),
            );

        let max_attempts = self.config.retry.max_attempts.max(1);
        let attempt_timeout = self.config.retry.attempt_timeout();
        let schedule = self.config.retry.schedule();

        let mut attempt = 1u32;
        loop {
            if cancel.is_cancelled() {
                return Err(ResolverError::Cancelled);
            }

            // The credential embeds a millisecond timestamp and is only
            // accepted within a short freshness window, so every attempt
            // derives a new one.
            let request = self
                .http
                .get(url.clone())
                .header(AUTHORIZATION, self.credentials.authorization());

            let started = Instant::now();
            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(ResolverError::Cancelled),
                outcome = timeout(attempt_timeout, Self::send_and_collect(request)) => outcome,
            };
            let elapsed = started.elapsed();

            let error = match outcome {
                Ok(Ok((status, content_type, body))) => {
                    // Any received response settles the lookup, error
                    // statuses included.
                    debug!(
                        kind = %kind,
                        attempt,
                        status = %status,
                        elapsed_ms = elapsed.as_millis() as u64,
                        "upstream responded"
                    );
                    counter!(UPSTREAM_ATTEMPTS, "outcome" => "response").increment(1);
                    histogram!(UPSTREAM_ATTEMPT_DURATION).record(elapsed.as_secs_f64());
                    return Ok(UpstreamResponse {
                        status,
                        content_type,
                        body,
                        attempts: attempt,
                    });
                }
                Ok(Err(e)) => AttemptError::Transport(e),
                Err(_) => AttemptError::TimedOut(attempt_timeout),
            };

            warn!(
                kind = %kind,
                attempt,
                max_attempts,
                error = %error,
                elapsed_ms = elapsed.as_millis() as u64,
                "upstream attempt failed"
            );
            counter!(UPSTREAM_ATTEMPTS, "outcome" => error.outcome_label()).increment(1);
            histogram!(UPSTREAM_ATTEMPT_DURATION).record(elapsed.as_secs_f64());

            if attempt >= max_attempts {
                counter!(LOOKUPS_EXHAUSTED).increment(1);
                return Err(ResolverError::Exhausted {
                    attempts: attempt,
                    last: error,
                });
            }

            let delay = schedule.delay_after(attempt);
            debug!(
                kind = %kind,
                attempt,
                delay_ms = delay.as_millis() as u64,
                "backing off before next attempt"
            );
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(ResolverError::Cancelled),
                _ = sleep(delay) => {}
            }
            attempt += 1;
        }
    }

    async fn send_and_collect(
        request: reqwest::RequestBuilder,
    ) -> Result<(StatusCode, Option<String>, Bytes), reqwest::Error> {
        let response = request.send().await?;
        let status = response.status();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        // Collecting the body inside the attempt window keeps the timeout
        // covering the whole exchange, not just the response head.
        let body = response.bytes().await?;
        Ok((status, content_type, body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RetryConfig;
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, Request, ResponseTemplate};

    fn fast_retry() -> RetryConfig {
        RetryConfig {
            max_attempts: 3,
            attempt_timeout_ms: 250,
            backoff_base_ms: 25,
            backoff_cap_ms: 100,
        }
    }

    fn test_config(origin: &str, retry: RetryConfig) -> UpstreamConfig {
        UpstreamConfig {
            origin: Url::parse(origin).expect("test origin should parse"),
            default_template: "standard".to_string(),
            retry,
        }
    }

    fn test_client(origin: &str, retry: RetryConfig) -> IdentityClient {
        IdentityClient::new(Credentials::new("testkey", "testsecret"), test_config(origin, retry))
    }

    /// An origin that refuses connections instantly.
    fn refused_origin() -> String {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
        let origin = format!("http://{}", listener.local_addr().expect("local addr"));
        drop(listener);
        origin
    }

    #[tokio::test]
    async fn returns_the_first_successful_response() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v2/identities/byPhone"))
            .and(query_param("phone", "+15551234567"))
            .and(query_param("template", "standard"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw(r#"{"identity":"found"}"#, "application/json"),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(&server.uri(), fast_retry());
        let response = client
            .lookup(LookupKind::Phone, "+15551234567", None, &CancellationToken::new())
            .await
            .expect("lookup should succeed");

        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.attempts, 1);
        assert_eq!(response.body.as_ref(), br#"{"identity":"found"}"#);
        assert_eq!(response.content_type.as_deref(), Some("application/json"));

        let requests = server.received_requests().await.expect("requests recorded");
        let auth = requests[0]
            .headers
            .get("authorization")
            .expect("authorization header")
            .to_str()
            .expect("ascii header");
        assert!(auth.starts_with("Bearer testkey"));
    }

    #[tokio::test]
    async fn explicit_template_overrides_the_default() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v2/identities/byEmail"))
            .and(query_param("email", "a@example.com"))
            .and(query_param("template", "compact"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(&server.uri(), fast_retry());
        let response = client
            .lookup(
                LookupKind::Email,
                "a@example.com",
                Some("compact"),
                &CancellationToken::new(),
            )
            .await
            .expect("lookup should succeed");
        assert_eq!(response.status, StatusCode::OK);
    }

    #[tokio::test]
    async fn error_statuses_are_returned_without_retrying() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v2/identities/byEmail"))
            .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(&server.uri(), fast_retry());
        let response = client
            .lookup(
                LookupKind::Email,
                "a@example.com",
                None,
                &CancellationToken::new(),
            )
            .await
            .expect("a 429 is still a response");

        assert_eq!(response.status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.attempts, 1);
        assert_eq!(server.received_requests().await.expect("requests").len(), 1);
    }

    #[tokio::test]
    async fn error_status_bodies_are_passed_through() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v2/identities/byPhone"))
            .respond_with(
                ResponseTemplate::new(500)
                    .set_body_raw(r#"{"error":"boom"}"#, "application/json"),
            )
            .mount(&server)
            .await;

        let client = test_client(&server.uri(), fast_retry());
        let response = client
            .lookup(LookupKind::Phone, "+15551234567", None, &CancellationToken::new())
            .await
            .expect("a 500 is still a response");

        assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(response.body.as_ref(), br#"{"error":"boom"}"#);
        assert_eq!(response.content_type.as_deref(), Some("application/json"));
    }

    #[tokio::test]
    async fn a_timed_out_attempt_is_retried() {
        let server = MockServer::start().await;
        let hits = Arc::new(AtomicUsize::new(0));
        let responder = {
            let hits = hits.clone();
            move |_: &Request| {
                if hits.fetch_add(1, Ordering::SeqCst) == 0 {
                    // Longer than the 250ms attempt timeout.
                    ResponseTemplate::new(200).set_delay(Duration::from_millis(600))
                } else {
                    ResponseTemplate::new(200).set_body_string("ok")
                }
            }
        };
        Mock::given(method("GET"))
            .and(path("/v2/identities/byPhone"))
            .respond_with(responder)
            .mount(&server)
            .await;

        let client = test_client(&server.uri(), fast_retry());
        let response = client
            .lookup(LookupKind::Phone, "+15551234567", None, &CancellationToken::new())
            .await
            .expect("second attempt should succeed");

        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.attempts, 2);
        assert_eq!(response.body.as_ref(), b"ok");
    }

    #[tokio::test]
    async fn exhaustion_reports_the_last_transport_error() {
        let client = test_client(&refused_origin(), fast_retry());

        let started = std::time::Instant::now();
        let error = client
            .lookup(LookupKind::Phone, "+15551234567", None, &CancellationToken::new())
            .await
            .expect_err("nothing is listening");
        let elapsed = started.elapsed();

        match error {
            ResolverError::Exhausted { attempts, last } => {
                assert_eq!(attempts, 3);
                assert!(matches!(last, AttemptError::Transport(_)));
            }
            other => panic!("unexpected error: {other}"),
        }
        // Two backoffs at 25ms and 50ms separate the three attempts.
        assert!(elapsed >= Duration::from_millis(75), "elapsed {elapsed:?}");
        assert!(elapsed < Duration::from_secs(2), "elapsed {elapsed:?}");
    }

    #[tokio::test]
    async fn exhaustion_after_timeouts_counts_every_attempt() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v2/identities/byAddress"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(600)))
            .mount(&server)
            .await;

        let retry = RetryConfig {
            max_attempts: 2,
            ..fast_retry()
        };
        let client = test_client(&server.uri(), retry);
        let error = client
            .lookup(LookupKind::Address, "123 Main St", None, &CancellationToken::new())
            .await
            .expect_err("every attempt times out");

        match error {
            ResolverError::Exhausted { attempts, last } => {
                assert_eq!(attempts, 2);
                assert!(matches!(last, AttemptError::TimedOut(_)));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(server.received_requests().await.expect("requests").len(), 2);
    }

    #[tokio::test]
    async fn every_attempt_carries_a_fresh_credential() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v2/identities/byPhone"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(600)))
            .mount(&server)
            .await;

        let client = test_client(&server.uri(), fast_retry());
        let _ = client
            .lookup(LookupKind::Phone, "+15551234567", None, &CancellationToken::new())
            .await
            .expect_err("every attempt times out");

        let requests = server.received_requests().await.expect("requests recorded");
        assert_eq!(requests.len(), 3);
        let credentials: HashSet<String> = requests
            .iter()
            .map(|r| {
                r.headers
                    .get("authorization")
                    .expect("authorization header")
                    .to_str()
                    .expect("ascii header")
                    .to_string()
            })
            .collect();
        // The millisecond timestamp makes consecutive attempts distinct.
        assert_eq!(credentials.len(), 3);
        assert!(credentials.iter().all(|c| c.starts_with("Bearer testkey")));
    }

    #[tokio::test]
    async fn cancellation_aborts_the_in_flight_attempt() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v2/identities/byPhone"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
            .mount(&server)
            .await;

        let retry = RetryConfig {
            attempt_timeout_ms: 10_000,
            ..fast_retry()
        };
        let client = test_client(&server.uri(), retry);
        let token = CancellationToken::new();
        let handle = {
            let client = client.clone();
            let token = token.clone();
            tokio::spawn(async move {
                client
                    .lookup(LookupKind::Phone, "+15551234567", None, &token)
                    .await
            })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        let cancelled_at = std::time::Instant::now();
        token.cancel();
        let result = handle.await.expect("task should not panic");

        assert!(matches!(result, Err(ResolverError::Cancelled)));
        assert!(cancelled_at.elapsed() < Duration::from_millis(500));
    }

    #[tokio::test]
    async fn cancellation_skips_the_backoff_sleep() {
        let retry = RetryConfig {
            max_attempts: 3,
            attempt_timeout_ms: 250,
            backoff_base_ms: 5000,
            backoff_cap_ms: 5000,
        };
        let client = test_client(&refused_origin(), retry);
        let token = CancellationToken::new();
        let handle = {
            let client = client.clone();
            let token = token.clone();
            tokio::spawn(async move {
                client
                    .lookup(LookupKind::Phone, "+15551234567", None, &token)
                    .await
            })
        };

        // The first attempt fails almost instantly, putting the lookup into
        // its 5s backoff sleep.
        tokio::time::sleep(Duration::from_millis(100)).await;
        let cancelled_at = std::time::Instant::now();
        token.cancel();
        let result = handle.await.expect("task should not panic");

        assert!(matches!(result, Err(ResolverError::Cancelled)));
        assert!(cancelled_at.elapsed() < Duration::from_millis(500));
    }

    #[tokio::test]
    async fn cancelled_before_start_sends_nothing() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let client = test_client(&server.uri(), fast_retry());
        let token = CancellationToken::new();
        token.cancel();

        let result = client
            .lookup(LookupKind::Phone, "+15551234567", None, &token)
            .await;

        assert!(matches!(result, Err(ResolverError::Cancelled)));
        assert!(server.received_requests().await.expect("requests").is_empty());
    }

    #[tokio::test]
    async fn each_kind_uses_its_own_path_and_parameter() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v2/identities/byPhone"))
            .and(query_param("phone", "+15551234567"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v2/identities/byEmail"))
            .and(query_param("email", "a@example.com"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v2/identities/byAddress"))
            .and(query_param("address", "123 Main St"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let client = test_client(&server.uri(), fast_retry());
        let token = CancellationToken::new();
        for (kind, value) in [
            (LookupKind::Phone, "+15551234567"),
            (LookupKind::Email, "a@example.com"),
            (LookupKind::Address, "123 Main St"),
        ] {
            let response = client
                .lookup(kind, value, None, &token)
                .await
                .expect("lookup should succeed");
            assert_eq!(response.status, StatusCode::OK, "kind {kind}");
        }
    }
}
