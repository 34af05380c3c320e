//! Anonymous client fingerprint.
//!
//! Guests have no account, so repeated comment submissions are throttled by
//! a stable hash of what the request reveals about the client. The raw
//! inputs are never stored.

use std::net::IpAddr;

use axum::http::{HeaderMap, header};
use axum::{extract::FromRequestParts, http::request::Parts};
use sha2::{Digest, Sha256};

use super::rate_limit::request_ip;

/// Hex characters kept from the digest.
const FINGERPRINT_LENGTH: usize = 16;

/// SHA-256 of client IP, `User-Agent` and `Accept-Language`, truncated to
/// 16 hex characters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientFingerprint(pub String);

impl ClientFingerprint {
    #[must_use]
    pub fn compute(ip: Option<IpAddr>, headers: &HeaderMap) -> Self {
        let ip = ip.map(|ip| ip.to_string()).unwrap_or_default();
        let header_str = |name: header::HeaderName| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default()
        };

        let mut hasher = Sha256::new();
        hasher.update(ip.as_bytes());
        hasher.update(b"|");
        hasher.update(header_str(header::USER_AGENT).as_bytes());
        hasher.update(b"|");
        hasher.update(header_str(header::ACCEPT_LANGUAGE).as_bytes());

        let mut digest = hex::encode(hasher.finalize());
        digest.truncate(FINGERPRINT_LENGTH);
        Self(digest)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl<S> FromRequestParts<S> for ClientFingerprint
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let ip = request_ip(&parts.headers, &parts.extensions);
        Ok(Self::compute(ip, &parts.headers))
    }
}
