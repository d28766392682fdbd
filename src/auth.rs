//! Authentication for the Bitso API
//!
//! Implements HMAC-SHA256 request signing per the Bitso API documentation:
//! the signed message is `nonce + method + path + body` and the resulting
//! header is `Authorization: Bitso <key>:<nonce>:<hex signature>`.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::sync::atomic::{AtomicI64, Ordering};
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("API secret must not be empty")]
    MissingSecret,
}

/// Compute the hex-encoded HMAC-SHA256 signature of a canonical message
pub fn sign_message(message: &str, secret: &str) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
    mac.update(message.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Verify a signature against the expected value
///
/// Useful for testing or webhook verification.
pub fn verify_signature(message: &str, secret: &str, signature: &str) -> bool {
    let computed = sign_message(message, secret);
    // Constant-time comparison to prevent timing attacks
    constant_time_eq(computed.as_bytes(), signature.as_bytes())
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}

/// API credentials and nonce source for signed requests
///
/// The nonce is seeded from wall-clock milliseconds and forced strictly
/// increasing across calls, so rapid successive requests (or a clock that
/// briefly steps backward) never reuse a value within the process.
#[derive(Debug)]
pub struct Credentials {
    api_key: String,
    api_secret: String,
    last_nonce: AtomicI64,
}

impl Credentials {
    /// Create credentials, rejecting an empty signing secret up front
    pub fn new(api_key: impl Into<String>, api_secret: impl Into<String>) -> Result<Self, AuthError> {
        let api_secret = api_secret.into();
        if api_secret.is_empty() {
            return Err(AuthError::MissingSecret);
        }
        Ok(Self {
            api_key: api_key.into(),
            api_secret,
            last_nonce: AtomicI64::new(0),
        })
    }

    /// Get the API key
    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    /// Next nonce: current time in milliseconds, bumped past the previous
    /// value if the clock has not advanced
    pub fn next_nonce(&self) -> i64 {
        let now = chrono::Utc::now().timestamp_millis();
        // fetch_update yields the previous value; the stored (and returned)
        // nonce is now unless the clock stalled or stepped back
        let prev = self
            .last_nonce
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
                Some(now.max(last + 1))
            })
            .expect("fetch_update closure always returns Some");
        now.max(prev + 1)
    }

    /// Build the `Authorization` header value for a request
    ///
    /// `body` is the empty string for GET requests.
    pub fn sign(&self, method: &str, path: &str, body: &str) -> String {
        let nonce = self.next_nonce();
        let message = format!("{}{}{}{}", nonce, method, path, body);
        let signature = sign_message(&message, &self.api_secret);
        format!("Bitso {}:{}:{}", self.api_key, nonce, signature)
    }
}
