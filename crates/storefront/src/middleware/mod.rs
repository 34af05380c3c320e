//! HTTP middleware stack for the storefront.
//!
//! # Middleware Order (bottom to top in Router)
//!
//! 1. Sentry layer (capture errors)
//! 2. `TraceLayer` (request tracing)
//! 3. Request ID (add unique ID to each request)
//! 4. CORS (front end origin from `STOREFRONT_BASE_URL`)
//! 5. Session layer (tower-sessions with `PostgreSQL` store)
//! 6. Rate limiting (governor)
//!
//! `ClientFingerprint` is an extractor rather than a layer.

pub mod fingerprint;
pub mod rate_limit;
pub mod request_id;
pub mod session;

pub use fingerprint::ClientFingerprint;
pub use rate_limit::{RateLimiterLayer, api_rate_limiter, client_ip, request_ip, write_rate_limiter};
pub use request_id::request_id_middleware;
pub use session::create_session_layer;
