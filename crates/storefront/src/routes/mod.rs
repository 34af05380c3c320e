//! HTTP route handlers for the storefront JSON API.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                          - Liveness
//! GET  /health/ready                    - Database readiness
//!
//! # Catalog
//! GET  /api/categories                  - Active categories
//! GET  /api/products                    - Active products (?category=&featured=)
//! GET  /api/products/{slug}             - Product detail
//!
//! # Cart (session)
//! GET    /api/cart                      - Cart with priced lines
//! DELETE /api/cart                      - Clear
//! POST   /api/cart/items                - Add {product_id, quantity}
//! PATCH  /api/cart/items/{product_id}   - Set quantity (0 removes)
//! DELETE /api/cart/items/{product_id}   - Remove
//!
//! # Checkout (rate limited)
//! POST /api/checkout                    - Create order + payment session
//! GET  /api/checkout/verify             - Payment return (?session_id=)
//! GET  /api/orders/{tracking_token}     - Order status
//!
//! # Content
//! GET  /api/settings/{key}              - Cached setting
//! GET  /api/settings/{key}/stream       - Live updates (SSE)
//! GET  /api/content/{key}               - Published content section
//! GET  /api/gallery                     - Gallery images
//! GET  /api/comments                    - Approved comments
//! POST /api/comments                    - Submit comment (rate limited)
//! ```

pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod content;
pub mod health;
pub mod orders;
pub mod settings;

use std::time::Duration;

use axum::{
    Router,
    handler::Handler,
    http::{HeaderValue, Method, header::CONTENT_TYPE},
    middleware as axum_middleware,
    routing::{MethodRouter, get, patch, post},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::{DefaultOnResponse, OnResponse, TraceLayer};
use tracing::{Span, warn};

use crate::middleware::{
    api_rate_limiter, create_session_layer, request_id_middleware, write_rate_limiter,
};
use crate::config::StorefrontConfig;
use crate::state::AppState;

/// Cross-origin access for the front end served from `base_url`, with
/// cookies so the cart session works.
fn cors_layer(config: &StorefrontConfig) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE])
        .allow_headers([CONTENT_TYPE])
        .max_age(Duration::from_secs(60 * 60));

    match HeaderValue::from_str(config.base_url.trim_end_matches('/')) {
        Ok(origin) => cors.allow_origin(origin).allow_credentials(true),
        Err(e) => {
            warn!(error = %e, "Base URL is not a valid origin, cross-origin requests disabled");
            cors
        }
    }
}

/// `POST` behind the write limiter.
fn limited_post<H, T>(handler: H) -> MethodRouter<AppState>
where
    H: Handler<T, AppState>,
    T: 'static,
{
    let method = post(handler);
    match write_rate_limiter() {
        Some(layer) => method.layer(layer),
        None => {
            warn!("Write rate limiter unavailable, serving route without it");
            method
        }
    }
}

/// Create the catalog routes router.
pub fn catalog_routes() -> Router<AppState> {
    Router::new()
        .route("/categories", get(catalog::categories))
        .route("/products", get(catalog::products))
        .route("/products/{slug}", get(catalog::product))
}

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show).delete(cart::clear))
        .route("/items", post(cart::add))
        .route(
            "/items/{product_id}",
            patch(cart::update).delete(cart::remove),
        )
}

/// Create the checkout and order tracking routes router.
pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/checkout", limited_post(checkout::start))
        .route("/checkout/verify", get(checkout::verify))
        .route("/orders/{tracking_token}", get(orders::track))
}

/// Create the settings and site content routes router.
pub fn content_routes() -> Router<AppState> {
    Router::new()
        .route("/settings/{key}", get(settings::show))
        .route("/settings/{key}/stream", get(settings::stream))
        .route("/content/{key}", get(content::section))
        .route("/gallery", get(content::gallery))
        .route(
            "/comments",
            get(content::comments).merge(limited_post(content::submit_comment)),
        )
}

/// All `/api` routes.
pub fn api_routes() -> Router<AppState> {
    let api = Router::new()
        .merge(catalog_routes())
        .nest("/cart", cart_routes())
        .merge(order_routes())
        .merge(content_routes());

    match api_rate_limiter() {
        Some(layer) => api.layer(layer),
        None => {
            warn!("API rate limiter unavailable, serving routes without it");
            api
        }
    }
}

/// The full application: health probes, API, sessions, CORS and request
/// tracing.
///
/// Sentry layers are added by the binary.
pub fn app(state: AppState) -> Router {
    let session_layer = create_session_layer(state.pool(), state.config());
    let cors = cors_layer(state.config());

    Router::new()
        .route("/health", get(health::health))
        .route("/health/ready", get(health::readiness))
        .nest("/api", api_routes())
        .layer(session_layer)
        .layer(cors)
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
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use bloomtable_core::CurrencyCode;
    use secrecy::SecretString;
    use sqlx::PgPool;
    use tower::ServiceExt;

    use super::*;
    use crate::config::PaymentConfig;
    use crate::db::PgSettingsSource;
    use crate::settings::{CacheConfig, NoopFeed, SettingsHub};

    const DATABASE_URL: &str = "postgres://bloomtable@127.0.0.1:1/bloomtable";

    fn test_app() -> Router {
        let config = StorefrontConfig {
            database_url: SecretString::from(DATABASE_URL),
            host: [127, 0, 0, 1].into(),
            port: 3000,
            base_url: "https://shop.bloomtable.test/".to_string(),
            session_secret: SecretString::from("c4e1b7f09a2d6e3851f4c7a90b2e5d8f16a3c9e7"),
            payment: PaymentConfig {
                api_base: "http://127.0.0.1:1".to_string(),
                secret_key: SecretString::from("sk_test_4eC39HqLyjWDarjtT1zdp7dc"),
                currency: CurrencyCode::USD,
            },
            settings_cache: CacheConfig::default(),
            sentry_dsn: None,
            sentry_environment: None,
        };
        let pool = PgPool::connect_lazy(DATABASE_URL).unwrap();
        let hub = Arc::new(SettingsHub::new(
            Arc::new(PgSettingsSource::new(pool.clone())),
            Arc::new(NoopFeed),
            &config.settings_cache,
        ));
        app(AppState::new(config, pool, hub).unwrap())
    }

    fn preflight(origin: &str) -> Request<Body> {
        Request::builder()
            .method(Method::OPTIONS)
            .uri("/api/cart/items")
            .header(header::ORIGIN, origin)
            .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn test_health_sets_request_id() {
        let response = test_app()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));
    }

    #[tokio::test]
    async fn test_preflight_allows_base_url_origin_with_credentials() {
        let response = test_app()
            .oneshot(preflight("https://shop.bloomtable.test"))
            .await
            .unwrap();
        let headers = response.headers();
        assert_eq!(
            headers.get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
            "https://shop.bloomtable.test"
        );
        assert_eq!(
            headers.get(header::ACCESS_CONTROL_ALLOW_CREDENTIALS).unwrap(),
            "true"
        );
    }

    #[tokio::test]
    async fn test_preflight_never_echoes_foreign_origin() {
        let response = test_app()
            .oneshot(preflight("https://elsewhere.test"))
            .await
            .unwrap();
        let allowed = response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .unwrap();
        assert_eq!(allowed, "https://shop.bloomtable.test");
        assert_ne!(allowed, "https://elsewhere.test");
    }
}
