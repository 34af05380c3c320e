//! Storefront settings: the live hub driven through its event pump, and the
//! public settings endpoint served from the cache.

#![allow(clippy::unwrap_used)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use secrecy::SecretString;
use serde_json::{Value, json};
use sqlx::PgPool;
use tokio::sync::mpsc;
use tower::ServiceExt;

use bloomtable_core::{CurrencyCode, SettingKey};
use bloomtable_integration_tests::{MemorySettings, UNREACHABLE_DATABASE_URL};
use bloomtable_storefront::config::{PaymentConfig, StorefrontConfig};
use bloomtable_storefront::routes;
use bloomtable_storefront::settings::{CacheConfig, ChangeFeed, FeedEvent, SettingsHub};
use bloomtable_storefront::state::AppState;

/// Feed that only counts how often a key is listened to.
#[derive(Default)]
struct CountingFeed {
    listens: AtomicUsize,
    unlistens: AtomicUsize,
}

impl ChangeFeed for CountingFeed {
    fn listen(&self, _key: &SettingKey) {
        self.listens.fetch_add(1, Ordering::SeqCst);
    }

    fn unlisten(&self, _key: &SettingKey) {
        self.unlistens.fetch_add(1, Ordering::SeqCst);
    }
}

fn hero() -> SettingKey {
    SettingKey::parse("heroContent").unwrap()
}

/// Wait until `check` holds, yielding to spawned tasks in between.
async fn eventually(check: impl Fn() -> bool) {
    for _ in 0..200 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached");
}

#[tokio::test]
async fn test_subscribers_follow_upstream_changes_through_event_pump() {
    let source = Arc::new(MemorySettings::default());
    source.set("heroContent", json!({"title": "Winter"}));
    let feed = Arc::new(CountingFeed::default());
    let hub = Arc::new(SettingsHub::new(
        source.clone(),
        feed.clone(),
        &CacheConfig::default(),
    ));
    let (events, receiver) = mpsc::unbounded_channel();
    let _pump = hub.spawn_event_pump(receiver);

    let seen_a = Arc::new(Mutex::new(Vec::<Value>::new()));
    let seen_b = Arc::new(Mutex::new(Vec::<Value>::new()));
    let first = {
        let seen = Arc::clone(&seen_a);
        hub.subscribe(&hero(), move |v| seen.lock().unwrap().push(v.clone()))
    };
    let _second = {
        let seen = Arc::clone(&seen_b);
        hub.subscribe(&hero(), move |v| seen.lock().unwrap().push(v.clone()))
    };

    assert_eq!(hub.active_upstreams(&hero()), 1);
    assert_eq!(feed.listens.load(Ordering::SeqCst), 1);

    source.set("heroContent", json!({"title": "Spring"}));
    events.send(FeedEvent::Changed(hero())).unwrap();
    eventually(|| seen_b.lock().unwrap().len() == 1).await;

    assert_eq!(*seen_a.lock().unwrap(), vec![json!({"title": "Spring"})]);
    assert_eq!(*seen_b.lock().unwrap(), vec![json!({"title": "Spring"})]);

    first.unsubscribe();
    assert_eq!(feed.unlistens.load(Ordering::SeqCst), 0);

    source.set("heroContent", json!({"title": "Summer"}));
    events.send(FeedEvent::Changed(hero())).unwrap();
    eventually(|| seen_b.lock().unwrap().len() == 2).await;

    assert_eq!(seen_a.lock().unwrap().len(), 1);
    assert_eq!(
        hub.get(&hero(), Value::Null, Duration::from_secs(60)).await,
        json!({"title": "Summer"})
    );
}

fn storefront_config() -> StorefrontConfig {
    StorefrontConfig {
        database_url: SecretString::from(UNREACHABLE_DATABASE_URL),
        host: [127, 0, 0, 1].into(),
        port: 3000,
        base_url: "http://localhost:3000".to_string(),
        session_secret: SecretString::from("7d1f4a9c2e6b8035c1f7a4e9d2b6c8a0f3e5d7b9a1c3e5f7"),
        payment: PaymentConfig {
            api_base: "http://127.0.0.1:1".to_string(),
            secret_key: SecretString::from("sk_test_4eC39HqLyjWDarjtT1zdp7dc"),
            currency: CurrencyCode::USD,
        },
        settings_cache: CacheConfig::default(),
        sentry_dsn: None,
        sentry_environment: None,
    }
}

#[tokio::test]
async fn test_settings_endpoint_serves_cached_value() {
    let source = Arc::new(MemorySettings::default());
    source.set("heroContent", json!({"title": "Peonies are in"}));
    let hub = Arc::new(SettingsHub::new(
        source.clone(),
        Arc::new(CountingFeed::default()),
        &CacheConfig::default(),
    ));
    let pool = PgPool::connect_lazy(UNREACHABLE_DATABASE_URL).unwrap();
    let app = routes::app(AppState::new(storefront_config(), pool, hub).unwrap());

    for _ in 0..2 {
        let response = app
            .clone()
            .oneshot(
                Request::get("/api/settings/heroContent")
                    .header("x-forwarded-for", "203.0.113.7")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["key"], "heroContent");
        assert_eq!(body["value"]["title"], "Peonies are in");
    }

    assert_eq!(source.fetches(), 1);
}

#[tokio::test]
async fn test_settings_endpoint_rejects_bad_key() {
    let hub = Arc::new(SettingsHub::new(
        Arc::new(MemorySettings::default()),
        Arc::new(CountingFeed::default()),
        &CacheConfig::default(),
    ));
    let pool = PgPool::connect_lazy(UNREACHABLE_DATABASE_URL).unwrap();
    let app = routes::app(AppState::new(storefront_config(), pool, hub).unwrap());

    let response = app
        .oneshot(
            Request::get("/api/settings/not%20a%20key")
                .header("x-forwarded-for", "203.0.113.7")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
