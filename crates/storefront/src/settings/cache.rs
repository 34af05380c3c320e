//! Time-boxed settings cache with per-key single-flight fetching.
//!
//! Entries live in a `moka` cache bounded by capacity and a maximum lifetime.
//! Freshness is decided per call: a caller passes the `ttl` it is willing to
//! accept and entries older than that are refetched.
//!
//! Fetches are serialized per key. A caller that finds the entry missing or
//! stale takes the key's lock, re-checks the cache, and only then fetches, so
//! concurrent readers of the same key share one round trip. A key's lock is
//! dropped from the table once its last holder is done.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use std::time::Duration;

use moka::future::Cache;
use serde_json::Value;
use tokio::sync::Mutex;
use tokio::time::Instant;

use bloomtable_core::SettingKey;

use super::source::SettingsError;

/// A cached lookup result. `value == None` records that the key is absent.
#[derive(Debug, Clone)]
pub struct CachedSetting {
    pub value: Option<Value>,
    pub fetched_at: Instant,
}

impl CachedSetting {
    fn is_fresh(&self, ttl: Duration) -> bool {
        self.fetched_at.elapsed() < ttl
    }
}

/// Cache sizing.
#[derive(Debug, Clone, Copy)]
pub struct CacheConfig {
    /// Maximum number of keys kept.
    pub capacity: u64,
    /// Hard upper bound on entry lifetime, whatever `ttl` callers pass.
    pub max_ttl: Duration,
    /// TTL used by convenience readers that do not pass their own.
    pub default_ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: 1_000,
            max_ttl: Duration::from_secs(3_600),
            default_ttl: Duration::from_secs(300),
        }
    }
}

pub struct SettingsCache {
    entries: Cache<SettingKey, CachedSetting>,
    inflight: StdMutex<HashMap<SettingKey, Arc<Mutex<()>>>>,
}

/// A claim on one key's fetch lock. Removes the table entry on drop when no
/// other caller holds it.
struct InflightSlot<'a> {
    table: &'a StdMutex<HashMap<SettingKey, Arc<Mutex<()>>>>,
    key: SettingKey,
    lock: Arc<Mutex<()>>,
}

impl Drop for InflightSlot<'_> {
    fn drop(&mut self) {
        let mut table = self.table.lock().unwrap_or_else(PoisonError::into_inner);
        // One reference in the table, one here
        if Arc::strong_count(&self.lock) == 2 {
            table.remove(&self.key);
        }
    }
}

impl SettingsCache {
    #[must_use]
    pub fn new(config: &CacheConfig) -> Self {
        let entries = Cache::builder()
            .max_capacity(config.capacity)
            .time_to_live(config.max_ttl)
            .build();

        Self {
            entries,
            inflight: StdMutex::new(HashMap::new()),
        }
    }

    /// Return the cached value if younger than `ttl`, otherwise run `fetch`
    /// (at most once across concurrent callers) and cache its result.
    ///
    /// Fetch errors are returned to the caller and never cached.
    ///
    /// # Errors
    ///
    /// Propagates the error returned by `fetch`.
    pub async fn get_or_fetch<F, Fut>(
        &self,
        key: &SettingKey,
        ttl: Duration,
        fetch: F,
    ) -> Result<Option<Value>, SettingsError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Option<Value>, SettingsError>>,
    {
        if let Some(hit) = self.fresh(key, ttl).await {
            return Ok(hit);
        }

        let slot = self.slot_for(key);
        let _guard = slot.lock.lock().await;

        // Another caller may have fetched while we waited for the lock
        if let Some(hit) = self.fresh(key, ttl).await {
            return Ok(hit);
        }

        let value = fetch().await?;
        self.store(key, value.clone()).await;
        Ok(value)
    }

    /// Unconditionally refetch `key`, serialized with concurrent readers.
    ///
    /// On error the stale entry is dropped so the next reader refetches.
    ///
    /// # Errors
    ///
    /// Propagates the error returned by `fetch`.
    pub async fn refresh<F, Fut>(
        &self,
        key: &SettingKey,
        fetch: F,
    ) -> Result<Option<Value>, SettingsError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Option<Value>, SettingsError>>,
    {
        let slot = self.slot_for(key);
        let _guard = slot.lock.lock().await;

        match fetch().await {
            Ok(value) => {
                self.store(key, value.clone()).await;
                Ok(value)
            }
            Err(err) => {
                self.entries.invalidate(key).await;
                Err(err)
            }
        }
    }

    /// Peek at an entry without affecting freshness.
    pub async fn peek(&self, key: &SettingKey) -> Option<CachedSetting> {
        self.entries.get(key).await
    }

    pub async fn invalidate(&self, key: &SettingKey) {
        self.entries.invalidate(key).await;
    }

    pub fn invalidate_all(&self) {
        self.entries.invalidate_all();
    }

    async fn fresh(&self, key: &SettingKey, ttl: Duration) -> Option<Option<Value>> {
        self.entries
            .get(key)
            .await
            .filter(|entry| entry.is_fresh(ttl))
            .map(|entry| entry.value)
    }

    async fn store(&self, key: &SettingKey, value: Option<Value>) {
        self.entries
            .insert(
                key.clone(),
                CachedSetting {
                    value,
                    fetched_at: Instant::now(),
                },
            )
            .await;
    }

    fn slot_for(&self, key: &SettingKey) -> InflightSlot<'_> {
        let mut table = self.inflight.lock().unwrap_or_else(PoisonError::into_inner);
        let lock = Arc::clone(
            table
                .entry(key.clone())
                .or_insert_with(|| Arc::new(Mutex::new(()))),
        );
        InflightSlot {
            table: &self.inflight,
            key: key.clone(),
            lock,
        }
    }

    /// Keys with a fetch lock currently allocated.
    #[cfg(test)]
    fn inflight_len(&self) -> usize {
        self.inflight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde_json::json;

    use super::*;

    fn key(s: &str) -> SettingKey {
        SettingKey::parse(s).unwrap()
    }

    #[tokio::test]
    async fn test_second_read_within_ttl_is_served_from_cache() {
        let cache = SettingsCache::new(&CacheConfig::default());
        let fetches = AtomicUsize::new(0);
        let ttl = Duration::from_secs(60);

        for _ in 0..2 {
            let value = cache
                .get_or_fetch(&key("heroContent"), ttl, || async {
                    fetches.fetch_add(1, Ordering::SeqCst);
                    Ok(Some(json!({"title": "Hello"})))
                })
                .await
                .unwrap();
            assert_eq!(value, Some(json!({"title": "Hello"})));
        }

        assert_eq!(fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_entry_is_refetched() {
        let cache = SettingsCache::new(&CacheConfig::default());
        let fetches = AtomicUsize::new(0);
        let ttl = Duration::from_secs(10);
        let fetch = || async {
            let n = fetches.fetch_add(1, Ordering::SeqCst);
            Ok(Some(json!(n)))
        };

        assert_eq!(
            cache.get_or_fetch(&key("k"), ttl, fetch).await.unwrap(),
            Some(json!(0))
        );
        tokio::time::advance(Duration::from_secs(11)).await;
        assert_eq!(
            cache.get_or_fetch(&key("k"), ttl, fetch).await.unwrap(),
            Some(json!(1))
        );
    }

    #[tokio::test]
    async fn test_concurrent_reads_share_one_fetch() {
        let cache = SettingsCache::new(&CacheConfig::default());
        let fetches = AtomicUsize::new(0);
        let ttl = Duration::from_secs(60);
        let fetch = || async {
            fetches.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            Ok(Some(json!("open")))
        };

        let banner = key("banner");
        let (a, b, c) = tokio::join!(
            cache.get_or_fetch(&banner, ttl, fetch),
            cache.get_or_fetch(&banner, ttl, fetch),
            cache.get_or_fetch(&banner, ttl, fetch),
        );

        assert_eq!(a.unwrap(), Some(json!("open")));
        assert_eq!(b.unwrap(), Some(json!("open")));
        assert_eq!(c.unwrap(), Some(json!("open")));
        assert_eq!(fetches.load(Ordering::SeqCst), 1);
        assert_eq!(cache.inflight_len(), 0);
    }

    #[tokio::test]
    async fn test_fetch_locks_released_for_distinct_keys() {
        let cache = SettingsCache::new(&CacheConfig {
            capacity: 10,
            ..CacheConfig::default()
        });
        let ttl = Duration::from_secs(60);

        for i in 0..500 {
            cache
                .get_or_fetch(&key(&format!("promo{i}")), ttl, || async {
                    Ok(Some(json!(i)))
                })
                .await
                .unwrap();
            cache
                .refresh(&key(&format!("promo{i}")), || async { Ok(None) })
                .await
                .unwrap();
        }

        assert_eq!(cache.inflight_len(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_lock_released_when_caller_gives_up() {
        let cache = SettingsCache::new(&CacheConfig::default());
        let slow_key = key("slow");
        let slow = cache.get_or_fetch(&slow_key, Duration::from_secs(60), || async {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(Some(json!(1)))
        });

        let timed_out = tokio::time::timeout(Duration::from_secs(1), slow).await;
        assert!(timed_out.is_err());
        assert_eq!(cache.inflight_len(), 0);
    }

    #[tokio::test]
    async fn test_absent_keys_are_cached_too() {
        let cache = SettingsCache::new(&CacheConfig::default());
        let fetches = AtomicUsize::new(0);
        let ttl = Duration::from_secs(60);

        for _ in 0..3 {
            let value = cache
                .get_or_fetch(&key("missing"), ttl, || async {
                    fetches.fetch_add(1, Ordering::SeqCst);
                    Ok(None)
                })
                .await
                .unwrap();
            assert!(value.is_none());
        }
        assert_eq!(fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_errors_are_not_cached() {
        let cache = SettingsCache::new(&CacheConfig::default());
        let ttl = Duration::from_secs(60);

        let err = cache
            .get_or_fetch(&key("k"), ttl, || async {
                Err(SettingsError::Unavailable("offline".into()))
            })
            .await;
        assert!(err.is_err());
        assert!(cache.peek(&key("k")).await.is_none());

        let ok = cache
            .get_or_fetch(&key("k"), ttl, || async { Ok(Some(json!(true))) })
            .await
            .unwrap();
        assert_eq!(ok, Some(json!(true)));
    }

    #[tokio::test]
    async fn test_refresh_replaces_value_and_drops_on_error() {
        let cache = SettingsCache::new(&CacheConfig::default());
        let ttl = Duration::from_secs(60);
        cache
            .get_or_fetch(&key("k"), ttl, || async { Ok(Some(json!(1))) })
            .await
            .unwrap();

        cache
            .refresh(&key("k"), || async { Ok(Some(json!(2))) })
            .await
            .unwrap();
        assert_eq!(cache.peek(&key("k")).await.unwrap().value, Some(json!(2)));

        let failed = cache
            .refresh(&key("k"), || async {
                Err(SettingsError::Unavailable("offline".into()))
            })
            .await;
        assert!(failed.is_err());
        assert!(cache.peek(&key("k")).await.is_none());
    }
}
