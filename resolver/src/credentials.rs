//! Derivation of the upstream API's bearer credential.
//!
//! The upstream authenticates requests with a composite credential:
//!
//! ```text
//! Bearer {key_id}{timestamp36}{hash}
//! ```
//!
//! where `timestamp36` is the current Unix time in milliseconds encoded in
//! lowercase base-36 and `hash` is the hex MD5 digest of the timestamp
//! string concatenated with the shared secret. There are no delimiters; the
//! upstream knows the key id's length. The credential is only accepted
//! within a short freshness window, so one is derived immediately before
//! every outbound attempt and never cached.
//!
//! MD5 is what the upstream's protocol prescribes; it plays no security
//! role here beyond proving possession of the secret.

use md5::{Digest, Md5};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

/// Environment variable holding the public key identifier.
pub const KEY_ID_ENV: &str = "SWITCHBOARD_KEY_ID";
/// Environment variable holding the shared secret.
pub const SECRET_ENV: &str = "SWITCHBOARD_SECRET";

#[derive(Error, Debug, PartialEq, Eq)]
pub enum CredentialsError {
    #[error("{KEY_ID_ENV} is not set or empty")]
    MissingKeyId,
    #[error("{SECRET_ENV} is not set or empty")]
    MissingSecret,
}

/// The key id and shared secret this deployment uses upstream.
///
/// The secret is never transmitted; it only feeds the credential hash.
#[derive(Clone)]
pub struct Credentials {
    key_id: String,
    secret: String,
}

impl Credentials {
    pub fn new(key_id: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            key_id: key_id.into(),
            secret: secret.into(),
        }
    }

    /// Reads the credentials from `SWITCHBOARD_KEY_ID` and
    /// `SWITCHBOARD_SECRET`. There are no fallback values: missing or empty
    /// variables are a startup error.
    pub fn from_env() -> Result<Self, CredentialsError> {
        Self::from_vars(
            std::env::var(KEY_ID_ENV).ok(),
            std::env::var(SECRET_ENV).ok(),
        )
    }

    pub fn from_vars(
        key_id: Option<String>,
        secret: Option<String>,
    ) -> Result<Self, CredentialsError> {
        let key_id = key_id
            .filter(|v| !v.is_empty())
            .ok_or(CredentialsError::MissingKeyId)?;
        let secret = secret
            .filter(|v| !v.is_empty())
            .ok_or(CredentialsError::MissingSecret)?;
        Ok(Self { key_id, secret })
    }

    /// Derives the `Authorization` value for the current wall-clock time.
    pub fn authorization(&self) -> String {
        let now_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| d.as_millis() as u64);
        self.authorization_at(now_ms)
    }

    /// Derives the `Authorization` value for a fixed timestamp. Pure
    /// function of (timestamp, key id, secret).
    pub fn authorization_at(&self, unix_millis: u64) -> String {
        let timestamp36 = encode_base36(unix_millis);
        let mut hasher = Md5::new();
        hasher.update(timestamp36.as_bytes());
        hasher.update(self.secret.as_bytes());
        let hash = hex::encode(hasher.finalize());
        format!("Bearer {}{timestamp36}{hash}", self.key_id)
    }
}

// The secret must not end up in logs or error chains.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("key_id", &self.key_id)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// Encodes `value` in base 36 using lowercase digits, matching the
/// upstream's expected timestamp alphabet (`0-9a-z`).
fn encode_base36(mut value: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

    if value == 0 {
        return "0".to_string();
    }

    let mut out = String::new();
    while value > 0 {
        out.push(DIGITS[(value % 36) as usize] as char);
        value /= 36;
    }
    out.chars().rev().collect()
}
