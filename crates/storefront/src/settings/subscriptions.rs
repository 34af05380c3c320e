//! Per-key callback registry with one upstream subscription per key.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use serde_json::Value;

use bloomtable_core::SettingKey;

use super::feed::ChangeFeed;

/// Invoked with the new value whenever a subscribed key changes.
pub type Callback = Arc<dyn Fn(&Value) + Send + Sync>;

#[derive(Default)]
struct Registry {
    callbacks: HashMap<SettingKey, HashMap<u64, Callback>>,
    upstreams: HashSet<SettingKey>,
}

pub struct SubscriptionManager {
    feed: Arc<dyn ChangeFeed>,
    registry: Mutex<Registry>,
    next_id: AtomicU64,
}

impl SubscriptionManager {
    #[must_use]
    pub fn new(feed: Arc<dyn ChangeFeed>) -> Arc<Self> {
        Arc::new(Self {
            feed,
            registry: Mutex::new(Registry::default()),
            next_id: AtomicU64::new(1),
        })
    }

    /// Register `callback` for `key`. The first subscriber opens the upstream.
    pub fn subscribe(self: &Arc<Self>, key: &SettingKey, callback: Callback) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);

        let mut registry = self.lock();
        registry
            .callbacks
            .entry(key.clone())
            .or_default()
            .insert(id, callback);
        if registry.upstreams.insert(key.clone()) {
            self.feed.listen(key);
        }
        drop(registry);

        Subscription {
            manager: Arc::downgrade(self),
            key: key.clone(),
            id,
            active: AtomicBool::new(true),
        }
    }

    fn remove(&self, key: &SettingKey, id: u64) {
        let mut registry = self.lock();
        let now_empty = match registry.callbacks.get_mut(key) {
            Some(callbacks) => {
                callbacks.remove(&id);
                callbacks.is_empty()
            }
            None => false,
        };
        if now_empty {
            registry.callbacks.remove(key);
            if registry.upstreams.remove(key) {
                self.feed.unlisten(key);
            }
        }
    }

    /// Invoke every callback registered for `key`, outside the registry lock.
    pub fn dispatch(&self, key: &SettingKey, value: &Value) -> usize {
        let callbacks: Vec<Callback> = self
            .lock()
            .callbacks
            .get(key)
            .map(|callbacks| callbacks.values().cloned().collect())
            .unwrap_or_default();

        for callback in &callbacks {
            callback(value);
        }
        callbacks.len()
    }

    /// Keys with at least one subscriber.
    #[must_use]
    pub fn subscribed_keys(&self) -> Vec<SettingKey> {
        self.lock().callbacks.keys().cloned().collect()
    }

    #[must_use]
    pub fn subscriber_count(&self, key: &SettingKey) -> usize {
        self.lock().callbacks.get(key).map_or(0, HashMap::len)
    }

    /// Open upstream subscriptions for `key`: always 0 or 1.
    #[must_use]
    pub fn active_upstreams(&self, key: &SettingKey) -> usize {
        usize::from(self.lock().upstreams.contains(key))
    }

    fn lock(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Handle returned by [`SubscriptionManager::subscribe`].
///
/// Unsubscribes when dropped. [`Subscription::unsubscribe`] may be called any
/// number of times.
pub struct Subscription {
    manager: Weak<SubscriptionManager>,
    key: SettingKey,
    id: u64,
    active: AtomicBool,
}

impl Subscription {
    pub fn unsubscribe(&self) {
        if !self.active.swap(false, Ordering::AcqRel) {
            return;
        }
        if let Some(manager) = self.manager.upgrade() {
            manager.remove(&self.key, self.id);
        }
    }

    #[must_use]
    pub const fn key(&self) -> &SettingKey {
        &self.key
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("key", &self.key)
            .field("id", &self.id)
            .field("active", &self.is_active())
            .finish()
    }
}
