//! Client for the upstream identity-resolution API.
//!
//! The upstream authenticates every request with a short-lived bearer
//! credential derived from a shared secret ([`credentials`]) and is flaky
//! enough that each lookup runs through a bounded retry loop with
//! exponential backoff ([`client`]).

pub mod client;
pub mod config;
pub mod credentials;
pub mod errors;
pub mod metrics_defs;
pub mod retry;

pub use client::{IdentityClient, LookupKind, UpstreamResponse};
pub use config::{RetryConfig, UpstreamConfig};
pub use credentials::Credentials;
pub use errors::{AttemptError, ResolverError};
