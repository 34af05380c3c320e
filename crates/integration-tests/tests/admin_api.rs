//! Admin router: bearer token enforcement and debounced drafts.
//!
//! None of these requests reach the database.

#![allow(clippy::unwrap_used)]

use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use secrecy::SecretString;
use sqlx::PgPool;
use tower::ServiceExt;

use bloomtable_admin::config::AdminConfig;
use bloomtable_admin::routes;
use bloomtable_admin::state::AppState;
use bloomtable_core::SettingKey;
use bloomtable_integration_tests::{TEST_ADMIN_TOKEN, UNREACHABLE_DATABASE_URL};

fn state() -> AppState {
    let config = AdminConfig {
        database_url: SecretString::from(UNREACHABLE_DATABASE_URL),
        host: [127, 0, 0, 1].into(),
        port: 3001,
        api_token: SecretString::from(TEST_ADMIN_TOKEN),
        autosave_debounce: Duration::from_secs(60),
        sentry_dsn: None,
        sentry_environment: None,
    };
    AppState::new(config, PgPool::connect_lazy(UNREACHABLE_DATABASE_URL).unwrap())
}

fn authed(method: &str, uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {TEST_ADMIN_TOKEN}"))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_owned()))
        .unwrap()
}

#[tokio::test]
async fn test_health_is_public() {
    let response = routes::app(state())
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));
}

#[tokio::test]
async fn test_api_requires_token() {
    let app = routes::app(state());

    let missing = app
        .clone()
        .oneshot(Request::get("/api/products").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(missing.status(), StatusCode::UNAUTHORIZED);

    let wrong = app
        .oneshot(
            Request::get("/api/orders")
                .header(header::AUTHORIZATION, "Bearer not-the-token")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(wrong.headers()[header::X_FRAME_OPTIONS], "DENY");
}

#[tokio::test]
async fn test_invalid_setting_key_is_bad_request() {
    let response = routes::app(state())
        .oneshot(authed("PUT", "/api/settings/bad%20key/draft", "{}"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_drafts_collapse_into_one_pending_write() {
    let state = state();
    let app = routes::app(state.clone());

    for title in ["S", "Sp", "Spring"] {
        let body = format!(r#"{{"title": "{title}"}}"#);
        let response = app
            .clone()
            .oneshot(authed("PUT", "/api/settings/heroContent/draft", &body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
    }

    let hero = SettingKey::parse("heroContent").unwrap();
    assert!(state.autosave().is_pending(&hero));
    assert_eq!(state.autosave().pending_count(), 1);
    assert!(state.autosave().cancel(&hero));
}
