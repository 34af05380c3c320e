//! HTTP route handlers for admin.
//!
//! Everything under `/api` requires `Authorization: Bearer <ADMIN_API_TOKEN>`.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                          - Liveness
//! GET  /health/ready                    - Database readiness
//!
//! # Catalog
//! GET/POST        /api/categories       PUT/DELETE /api/categories/{id}
//! GET/POST        /api/products         GET/PUT/DELETE /api/products/{id}
//!
//! # Content
//! GET/POST        /api/gallery          PUT/DELETE /api/gallery/{id}
//! GET/POST        /api/content          PUT/DELETE /api/content/{id}
//! GET             /api/comments         (?approved=)
//! POST            /api/comments/{id}/approve
//! DELETE          /api/comments/{id}
//!
//! # Settings
//! GET             /api/settings
//! GET/PUT/DELETE  /api/settings/{key}
//! PUT             /api/settings/{key}/draft   - Debounced autosave (202)
//! GET/PUT         /api/hours                  - Typed business hours
//!
//! # Orders
//! GET             /api/orders           (?status=&limit=)
//! GET/DELETE      /api/orders/{id}      - Detail / cascade delete
//! POST            /api/orders/{id}/status
//! GET             /api/notifications    (?unread=&limit=)
//! POST            /api/notifications/{id}/read
//! POST            /api/notifications/read-all
//!
//! # Diagnostics
//! POST            /api/diagnostics/run
//! ```

pub mod catalog;
pub mod content;
pub mod diagnostics;
pub mod health;
pub mod orders;
pub mod settings;

use std::time::Duration;

use axum::{Router, middleware as axum_middleware, routing::get};
use tower_http::trace::{DefaultOnResponse, OnResponse, TraceLayer};
use tracing::Span;

use crate::middleware::{request_id_middleware, security_headers_middleware};
use crate::state::AppState;

/// All `/api` routes.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .merge(catalog::router())
        .merge(content::router())
        .merge(settings::router())
        .merge(orders::router())
        .merge(diagnostics::router())
}

/// The full application. Sentry layers are added by the binary.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route("/health/ready", get(health::readiness))
        .nest("/api", api_routes())
        .layer(axum_middleware::from_fn(security_headers_middleware))
        .layer(axum_middleware::from_fn(request_id_middleware))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        uri = %request.uri(),
                        request_id = tracing::field::Empty,
                        status = tracing::field::Empty,
                        latency_ms = tracing::field::Empty,
                    )
                })
                .on_response(
                    |response: &axum::http::Response<_>, latency: Duration, span: &Span| {
                        span.record("status", response.status().as_u16());
                        span.record(
                            "latency_ms",
                            u64::try_from(latency.as_millis()).unwrap_or(u64::MAX),
                        );
                        DefaultOnResponse::default().on_response(response, latency, span);
                    },
                ),
        )
        .with_state(state)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use secrecy::SecretString;
    use sqlx::PgPool;
    use tower::ServiceExt;

    use super::*;
    use crate::config::AdminConfig;

    const DATABASE_URL: &str = "postgres://bloomtable@127.0.0.1:1/bloomtable";
    const TOKEN: &str = "9b4e7c21d06f3a85e2c9174b6d0a3f58";

    fn test_app() -> Router {
        let config = AdminConfig {
            database_url: SecretString::from(DATABASE_URL),
            host: [127, 0, 0, 1].into(),
            port: 3001,
            api_token: SecretString::from(TOKEN),
            autosave_debounce: Duration::from_millis(500),
            sentry_dsn: None,
            sentry_environment: None,
        };
        let pool = PgPool::connect_lazy(DATABASE_URL).unwrap();
        app(AppState::new(config, pool))
    }

    #[tokio::test]
    async fn test_health_carries_security_headers() {
        let response = test_app()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let headers = response.headers();
        assert_eq!(headers.get("x-content-type-options").unwrap(), "nosniff");
        assert_eq!(headers.get(header::CACHE_CONTROL).unwrap(), "no-store");
    }

    #[tokio::test]
    async fn test_valid_token_reaches_handler() {
        let response = test_app()
            .oneshot(
                Request::put("/api/settings/no%20spaces/draft")
                    .header(header::AUTHORIZATION, format!("Bearer {TOKEN}"))
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from("{}"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
