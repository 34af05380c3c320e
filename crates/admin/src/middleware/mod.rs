//! HTTP middleware stack for admin.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (added by the binary)
//! 2. `TraceLayer` (request span with id, status and latency)
//! 3. Request ID
//! 4. Security headers
//!
//! Authentication is per handler through the [`RequireAdmin`] extractor so
//! health probes stay public.

pub mod auth;
pub mod request_id;
pub mod security_headers;

pub use auth::{AdminToken, RequireAdmin};
pub use request_id::request_id_middleware;
pub use security_headers::security_headers_middleware;
