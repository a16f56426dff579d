use std::time::Duration;
use thiserror::Error;

pub type Result<T, E = ResolverError> = std::result::Result<T, E>;

/// Why a single upstream attempt failed.
///
/// Only these two cases are retryable. A response that arrives with an HTTP
/// error status is still a response and ends the lookup successfully from
/// the transport's point of view.
#[derive(Error, Debug)]
pub enum AttemptError {
    #[error("attempt timed out after {0:?}")]
    TimedOut(Duration),
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

impl AttemptError {
    /// Stable label for the `outcome` metric tag.
    pub fn outcome_label(&self) -> &'static str {
        match self {
            AttemptError::TimedOut(_) => "timeout",
            AttemptError::Transport(_) => "transport_error",
        }
    }
}

#[derive(Error, Debug)]
pub enum ResolverError {
    /// Every configured attempt failed; `last` is the final attempt's error.
    #[error("upstream lookup exhausted after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: AttemptError },
    /// The caller cancelled the lookup before a response arrived.
    #[error("lookup cancelled")]
    Cancelled,
    #[error("invalid lookup URL: {0}")]
    InvalidLookupUrl(String),
}
