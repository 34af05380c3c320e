//! Rate limiting middleware using governor and `tower_governor`.
//!
//! - `api_rate_limiter`: general API traffic (~100/min per client)
//! - `write_rate_limiter`: checkout and comment submission (~10/min per client)
//!
//! Clients are keyed by their real IP as reported by the edge proxy.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::extract::ConnectInfo;
use axum::http::{Extensions, HeaderMap, Request};
use governor::clock::QuantaInstant;
use governor::middleware::NoOpMiddleware;
use tower_governor::{GovernorError, GovernorLayer, governor::GovernorConfigBuilder};

/// Proxy headers carrying the client IP, most trusted first.
const CLIENT_IP_HEADERS: &[&str] = &["cf-connecting-ip", "x-forwarded-for", "x-real-ip", "fly-client-ip"];

/// The client IP reported by Cloudflare, a generic proxy, or Fly.io.
///
/// For `X-Forwarded-For` the first (client-most) address is used.
#[must_use]
pub fn client_ip(headers: &HeaderMap) -> Option<IpAddr> {
    CLIENT_IP_HEADERS.iter().find_map(|name| {
        headers
            .get(*name)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.split(',').next())
            .and_then(|s| s.trim().parse::<IpAddr>().ok())
    })
}

/// [`client_ip`], falling back to the socket peer when the server was
/// started with connect info (local runs without a proxy).
#[must_use]
pub fn request_ip(headers: &HeaderMap, extensions: &Extensions) -> Option<IpAddr> {
    client_ip(headers).or_else(|| {
        extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip())
    })
}

/// Key extractor using [`request_ip`].
#[derive(Clone, Copy)]
pub struct ClientIpKeyExtractor;

impl tower_governor::key_extractor::KeyExtractor for ClientIpKeyExtractor {
    type Key = IpAddr;

    fn extract<T>(&self, req: &Request<T>) -> Result<Self::Key, GovernorError> {
        request_ip(req.headers(), req.extensions()).ok_or(GovernorError::UnableToExtractKey)
    }
}

/// Rate limiter layer type for Axum.
pub type RateLimiterLayer =
    GovernorLayer<ClientIpKeyExtractor, NoOpMiddleware<QuantaInstant>, axum::body::Body>;

fn build(replenish_secs: u64, burst: u32) -> Option<RateLimiterLayer> {
    let config = GovernorConfigBuilder::default()
        .key_extractor(ClientIpKeyExtractor)
        .per_second(replenish_secs)
        .burst_size(burst)
        .finish()?;
    Some(GovernorLayer::new(Arc::new(config)))
}

/// General API limiter: 1 token per second, burst of 50.
///
/// `None` only if the governor rejects the quota.
#[must_use]
pub fn api_rate_limiter() -> Option<RateLimiterLayer> {
    build(1, 50)
}

/// Limiter for endpoints that write: 1 token every 6 seconds, burst of 5.
#[must_use]
pub fn write_rate_limiter() -> Option<RateLimiterLayer> {
    build(6, 5)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    #[test]
    fn test_client_ip_prefers_cloudflare() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("10.0.0.1, 10.0.0.2"));
        headers.insert("cf-connecting-ip", HeaderValue::from_static("203.0.113.7"));
        assert_eq!(client_ip(&headers), "203.0.113.7".parse().ok());
    }

    #[test]
    fn test_client_ip_first_forwarded_address() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static(" 198.51.100.4 , 10.0.0.2"));
        assert_eq!(client_ip(&headers), "198.51.100.4".parse().ok());
    }

    #[test]
    fn test_client_ip_skips_garbage() {
        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", HeaderValue::from_static("not-an-ip"));
        headers.insert("fly-client-ip", HeaderValue::from_static("2001:db8::1"));
        assert_eq!(client_ip(&headers), "2001:db8::1".parse().ok());
        assert_eq!(client_ip(&HeaderMap::new()), None);
    }

    #[test]
    fn test_request_ip_falls_back_to_peer() {
        let mut extensions = Extensions::new();
        let peer: SocketAddr = "192.0.2.1:5000".parse().unwrap();
        extensions.insert(ConnectInfo(peer));
        assert_eq!(request_ip(&HeaderMap::new(), &extensions), Some(peer.ip()));
        assert_eq!(request_ip(&HeaderMap::new(), &Extensions::new()), None);
    }

    #[test]
    fn test_limiters_build() {
        assert!(api_rate_limiter().is_some());
        assert!(write_rate_limiter().is_some());
    }
}
