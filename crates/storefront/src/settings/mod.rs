//! Live site settings.
//!
//! [`SettingsHub`] is the read path for every settings-backed part of the
//! storefront. It combines:
//!
//! - a TTL cache with per-key single-flight fetching ([`cache`]),
//! - a callback registry holding at most one upstream subscription per key
//!   ([`subscriptions`]),
//! - a change feed that reports upstream writes ([`feed`]).
//!
//! The hub lives in `AppState`; there is no global instance.

pub mod backoff;
pub mod cache;
pub mod feed;
pub mod source;
pub mod subscriptions;

use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, instrument, warn};

use bloomtable_core::SettingKey;

pub use backoff::Backoff;
pub use cache::{CacheConfig, SettingsCache};
pub use feed::{ChangeFeed, FeedEvent, NoopFeed, PgChangeFeed};
pub use source::{SettingsError, SettingsSource};
pub use subscriptions::{Callback, Subscription, SubscriptionManager};

/// Cached, subscribable view of the settings store.
pub struct SettingsHub {
    source: Arc<dyn SettingsSource>,
    cache: SettingsCache,
    subscriptions: Arc<SubscriptionManager>,
    default_ttl: Duration,
}

impl SettingsHub {
    #[must_use]
    pub fn new(
        source: Arc<dyn SettingsSource>,
        feed: Arc<dyn ChangeFeed>,
        config: &CacheConfig,
    ) -> Self {
        Self {
            source,
            cache: SettingsCache::new(config),
            subscriptions: SubscriptionManager::new(feed),
            default_ttl: config.default_ttl,
        }
    }

    /// Read `key`, serving from cache when the entry is younger than `ttl`.
    ///
    /// Never fails: a missing row or an unreachable store yields `default`.
    #[instrument(skip(self, default), fields(key = %key))]
    pub async fn get(&self, key: &SettingKey, default: Value, ttl: Duration) -> Value {
        let source = Arc::clone(&self.source);
        let result = self
            .cache
            .get_or_fetch(key, ttl, || async move { source.fetch(key).await })
            .await;

        match result {
            Ok(Some(value)) => value,
            Ok(None) => default,
            Err(e) => {
                warn!(error = %e, "Setting fetch failed, serving default");
                default
            }
        }
    }

    /// [`Self::get`] with the built-in default for `key` and the configured TTL.
    pub async fn get_or_builtin(&self, key: &SettingKey) -> Value {
        let default = key.default_value().unwrap_or(Value::Null);
        self.get(key, default, self.default_ttl).await
    }

    /// Read `key` and deserialize it, falling back to the built-in default
    /// when the stored value does not have the expected shape.
    pub async fn get_as<T: DeserializeOwned>(&self, key: &SettingKey) -> Option<T> {
        let value = self.get_or_builtin(key).await;
        match serde_json::from_value(value) {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                warn!(key = %key, error = %e, "Stored setting has unexpected shape");
                key.default_value()
                    .and_then(|fallback| serde_json::from_value(fallback).ok())
            }
        }
    }

    /// Be told about upstream changes to `key`.
    pub fn subscribe<F>(&self, key: &SettingKey, callback: F) -> Subscription
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        self.subscriptions.subscribe(key, Arc::new(callback))
    }

    /// Apply one change-feed event.
    pub async fn handle_event(&self, event: FeedEvent) {
        match event {
            FeedEvent::Changed(key) => self.refresh_and_dispatch(&key).await,
            FeedEvent::Resynced => {
                debug!("Settings feed resynced, refreshing subscribed keys");
                self.cache.invalidate_all();
                for key in self.subscriptions.subscribed_keys() {
                    self.refresh_and_dispatch(&key).await;
                }
            }
        }
    }

    async fn refresh_and_dispatch(&self, key: &SettingKey) {
        let source = Arc::clone(&self.source);
        match self
            .cache
            .refresh(key, || async move { source.fetch(key).await })
            .await
        {
            Ok(value) => {
                let value = value
                    .or_else(|| key.default_value())
                    .unwrap_or(Value::Null);
                let delivered = self.subscriptions.dispatch(key, &value);
                debug!(key = %key, delivered, "Dispatched setting change");
            }
            Err(e) => {
                warn!(key = %key, error = %e, "Refetch after change notification failed");
            }
        }
    }

    /// Drive [`Self::handle_event`] from a feed's event stream.
    ///
    /// Stops when the stream ends or the hub is dropped.
    pub fn spawn_event_pump(
        self: &Arc<Self>,
        mut events: mpsc::UnboundedReceiver<FeedEvent>,
    ) -> JoinHandle<()> {
        let hub = Arc::downgrade(self);
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                let Some(hub) = hub.upgrade() else {
                    break;
                };
                hub.handle_event(event).await;
            }
        })
    }

    #[must_use]
    pub fn active_upstreams(&self, key: &SettingKey) -> usize {
        self.subscriptions.active_upstreams(key)
    }

    #[must_use]
    pub fn subscriber_count(&self, key: &SettingKey) -> usize {
        self.subscriptions.subscriber_count(key)
    }

    #[must_use]
    pub const fn default_ttl(&self) -> Duration {
        self.default_ttl
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use async_trait::async_trait;
    use serde_json::json;

    use super::*;

    /// In-memory source that counts fetches and can be switched off.
    #[derive(Default)]
    struct MemorySource {
        values: Mutex<HashMap<String, Value>>,
        fetches: AtomicUsize,
        offline: AtomicBool,
    }

    impl MemorySource {
        fn set(&self, key: &str, value: Value) {
            self.values.lock().unwrap().insert(key.to_owned(), value);
        }

        fn remove(&self, key: &str) {
            self.values.lock().unwrap().remove(key);
        }
    }

    #[async_trait]
    impl SettingsSource for MemorySource {
        async fn fetch(&self, key: &SettingKey) -> Result<Option<Value>, SettingsError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            tokio::task::yield_now().await;
            if self.offline.load(Ordering::SeqCst) {
                return Err(SettingsError::Unavailable("connection refused".into()));
            }
            Ok(self.values.lock().unwrap().get(key.as_str()).cloned())
        }
    }

    fn key(s: &str) -> SettingKey {
        SettingKey::parse(s).unwrap()
    }

    fn hub_with(source: &Arc<MemorySource>) -> SettingsHub {
        SettingsHub::new(source.clone(), Arc::new(NoopFeed), &CacheConfig::default())
    }

    #[tokio::test]
    async fn test_two_gets_within_ttl_fetch_once() {
        let source = Arc::new(MemorySource::default());
        source.set("heroContent", json!({"title": "Spring"}));
        let hub = hub_with(&source);
        let ttl = Duration::from_secs(60);

        let first = hub.get(&key("heroContent"), Value::Null, ttl).await;
        let second = hub.get(&key("heroContent"), Value::Null, ttl).await;

        assert_eq!(first, json!({"title": "Spring"}));
        assert_eq!(first, second);
        assert_eq!(source.fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_concurrent_gets_fetch_once() {
        let source = Arc::new(MemorySource::default());
        source.set("heroContent", json!("v1"));
        let hub = hub_with(&source);
        let hero = key("heroContent");
        let ttl = Duration::from_secs(60);

        let results = futures::future::join_all(
            (0..8).map(|_| hub.get(&hero, Value::Null, ttl)),
        )
        .await;

        assert!(results.iter().all(|v| *v == json!("v1")));
        assert_eq!(source.fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failure_returns_default() {
        let source = Arc::new(MemorySource::default());
        source.offline.store(true, Ordering::SeqCst);
        let hub = hub_with(&source);

        let value = hub
            .get(&key("heroContent"), json!({"title": "fallback"}), Duration::from_secs(60))
            .await;
        assert_eq!(value, json!({"title": "fallback"}));

        // Failure was not cached
        source.offline.store(false, Ordering::SeqCst);
        source.set("heroContent", json!({"title": "live"}));
        let value = hub
            .get(&key("heroContent"), Value::Null, Duration::from_secs(60))
            .await;
        assert_eq!(value, json!({"title": "live"}));
    }

    #[tokio::test]
    async fn test_missing_row_returns_default() {
        let source = Arc::new(MemorySource::default());
        let hub = hub_with(&source);
        let value = hub
            .get(&key("unknown"), json!(42), Duration::from_secs(60))
            .await;
        assert_eq!(value, json!(42));
    }

    #[tokio::test]
    async fn test_two_subscribers_receive_change_once_each() {
        let source = Arc::new(MemorySource::default());
        source.set("heroContent", json!({"title": "Old"}));
        let hub = hub_with(&source);
        let hero = key("heroContent");

        let seen_a = Arc::new(Mutex::new(Vec::new()));
        let seen_b = Arc::new(Mutex::new(Vec::new()));
        let a = {
            let seen = Arc::clone(&seen_a);
            hub.subscribe(&hero, move |v| seen.lock().unwrap().push(v.clone()))
        };
        let _b = {
            let seen = Arc::clone(&seen_b);
            hub.subscribe(&hero, move |v| seen.lock().unwrap().push(v.clone()))
        };
        assert_eq!(hub.active_upstreams(&hero), 1);

        source.set("heroContent", json!({"title": "New"}));
        hub.handle_event(FeedEvent::Changed(hero.clone())).await;

        assert_eq!(*seen_a.lock().unwrap(), vec![json!({"title": "New"})]);
        assert_eq!(*seen_b.lock().unwrap(), vec![json!({"title": "New"})]);

        a.unsubscribe();
        source.set("heroContent", json!({"title": "Newer"}));
        hub.handle_event(FeedEvent::Changed(hero.clone())).await;

        assert_eq!(seen_a.lock().unwrap().len(), 1);
        assert_eq!(
            *seen_b.lock().unwrap(),
            vec![json!({"title": "New"}), json!({"title": "Newer"})]
        );
        assert_eq!(hub.active_upstreams(&hero), 1);
    }

    #[tokio::test]
    async fn test_change_updates_cache() {
        let source = Arc::new(MemorySource::default());
        source.set("orderingEnabled", json!(true));
        let hub = hub_with(&source);
        let k = key("orderingEnabled");
        let ttl = Duration::from_secs(600);

        assert_eq!(hub.get(&k, Value::Null, ttl).await, json!(true));
        source.set("orderingEnabled", json!(false));
        hub.handle_event(FeedEvent::Changed(k.clone())).await;

        let before = source.fetches.load(Ordering::SeqCst);
        assert_eq!(hub.get(&k, Value::Null, ttl).await, json!(false));
        assert_eq!(source.fetches.load(Ordering::SeqCst), before);
    }

    #[tokio::test]
    async fn test_resync_refreshes_subscribed_keys() {
        let source = Arc::new(MemorySource::default());
        source.set("heroContent", json!(1));
        source.set("aboutContent", json!("a"));
        let hub = hub_with(&source);
        let hits = Arc::new(AtomicUsize::new(0));
        let hits_cb = Arc::clone(&hits);
        let _sub = hub.subscribe(&key("heroContent"), move |v| {
            assert_eq!(*v, json!(2));
            hits_cb.fetch_add(1, Ordering::SeqCst);
        });

        let ttl = Duration::from_secs(600);
        hub.get(&key("aboutContent"), Value::Null, ttl).await;
        source.set("heroContent", json!(2));
        source.set("aboutContent", json!("b"));

        hub.handle_event(FeedEvent::Resynced).await;
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        // Unsubscribed keys were invalidated rather than pushed
        assert_eq!(hub.get(&key("aboutContent"), Value::Null, ttl).await, json!("b"));
    }

    #[tokio::test]
    async fn test_deleted_key_dispatches_builtin_default() {
        let source = Arc::new(MemorySource::default());
        source.set("heroContent", json!({"title": "Summer"}));
        source.set("specials.today", json!("tulips"));
        let hub = hub_with(&source);
        let (seen_tx, mut seen_rx) = mpsc::unbounded_channel();
        let hero_tx = seen_tx.clone();

        let _hero = hub.subscribe(&key("heroContent"), move |v| {
            let _ = hero_tx.send(v.clone());
        });
        let _specials = hub.subscribe(&key("specials.today"), move |v| {
            let _ = seen_tx.send(v.clone());
        });

        source.remove("heroContent");
        source.remove("specials.today");
        hub.handle_event(FeedEvent::Changed(key("heroContent"))).await;
        hub.handle_event(FeedEvent::Changed(key("specials.today"))).await;

        let hero = seen_rx.recv().await.unwrap();
        assert_eq!(Some(hero.clone()), key("heroContent").default_value());
        assert_eq!(
            hub.get_or_builtin(&key("heroContent")).await,
            hero
        );
        assert_eq!(seen_rx.recv().await, Some(Value::Null));
    }

    #[tokio::test]
    async fn test_failed_refetch_does_not_dispatch() {
        let source = Arc::new(MemorySource::default());
        let hub = hub_with(&source);
        let hits = Arc::new(AtomicUsize::new(0));
        let hits_cb = Arc::clone(&hits);
        let _sub = hub.subscribe(&key("heroContent"), move |_| {
            hits_cb.fetch_add(1, Ordering::SeqCst);
        });

        source.offline.store(true, Ordering::SeqCst);
        hub.handle_event(FeedEvent::Changed(key("heroContent"))).await;
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_event_pump_delivers_events() {
        let source = Arc::new(MemorySource::default());
        source.set("heroContent", json!("pushed"));
        let hub = Arc::new(hub_with(&source));
        let (tx, rx) = mpsc::unbounded_channel();
        let (seen_tx, mut seen_rx) = mpsc::unbounded_channel();

        let _sub = hub.subscribe(&key("heroContent"), move |v| {
            let _ = seen_tx.send(v.clone());
        });
        let pump = hub.spawn_event_pump(rx);

        tx.send(FeedEvent::Changed(key("heroContent"))).unwrap();
        assert_eq!(seen_rx.recv().await, Some(json!("pushed")));

        drop(tx);
        pump.await.unwrap();
    }

    #[tokio::test]
    async fn test_get_as_falls_back_on_bad_shape() {
        let source = Arc::new(MemorySource::default());
        source.set("orderingEnabled", json!("yes please"));
        let hub = hub_with(&source);

        let enabled: Option<bool> = hub.get_as(&key("orderingEnabled")).await;
        assert_eq!(enabled, Some(true));
    }
}
