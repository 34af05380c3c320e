//! Per-key debouncing for autosave.
//!
//! Each key has at most one pending timer. Scheduling again for the same key
//! aborts the pending timer and starts a new one, so only the last scheduled
//! action runs once the key has been quiet for the configured delay.

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::debug;

struct Pending {
    id: u64,
    handle: JoinHandle<()>,
}

type PendingMap<K> = Arc<Mutex<HashMap<K, Pending>>>;

/// Delays actions until their key has been quiet for `delay`.
pub struct Debouncer<K> {
    delay: Duration,
    pending: PendingMap<K>,
    next_id: AtomicU64,
}

impl<K> std::fmt::Debug for Debouncer<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Debouncer")
            .field("delay", &self.delay)
            .finish_non_exhaustive()
    }
}

fn lock<K>(pending: &Mutex<HashMap<K, Pending>>) -> MutexGuard<'_, HashMap<K, Pending>> {
    pending.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<K> Debouncer<K>
where
    K: Eq + Hash + Clone + Send + 'static,
{
    #[must_use]
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: Arc::new(Mutex::new(HashMap::new())),
            next_id: AtomicU64::new(0),
        }
    }

    #[must_use]
    pub const fn delay(&self) -> Duration {
        self.delay
    }

    /// Run `action` once `key` has been quiet for the delay.
    ///
    /// Replaces any action still waiting for the same key. An action that
    /// has already started is left to finish.
    pub fn schedule<F, Fut>(&self, key: K, action: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let delay = self.delay;
        let pending = Arc::clone(&self.pending);
        let task_key = key.clone();

        // Held across spawn so the timer cannot observe the map before its
        // own entry is inserted.
        let mut map = lock(&self.pending);

        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            {
                let mut map = lock(&pending);
                match map.get(&task_key) {
                    Some(entry) if entry.id == id => {
                        map.remove(&task_key);
                    }
                    _ => return,
                }
            }
            action().await;
        });

        if let Some(previous) = map.insert(key, Pending { id, handle }) {
            previous.handle.abort();
            debug!("Debounced action replaced");
        }
    }

    /// Drop the pending action for `key`. Returns whether one was waiting.
    pub fn cancel(&self, key: &K) -> bool {
        lock(&self.pending).remove(key).is_some_and(|entry| {
            entry.handle.abort();
            true
        })
    }

    #[must_use]
    pub fn is_pending(&self, key: &K) -> bool {
        lock(&self.pending).contains_key(key)
    }

    #[must_use]
    pub fn pending_count(&self) -> usize {
        lock(&self.pending).len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DELAY: Duration = Duration::from_millis(800);

    fn recorder() -> Arc<Mutex<Vec<u32>>> {
        Arc::new(Mutex::new(Vec::new()))
    }

    fn record(log: &Arc<Mutex<Vec<u32>>>, value: u32) -> impl FnOnce() -> std::future::Ready<()> + Send + 'static {
        let log = Arc::clone(log);
        move || {
            log.lock().unwrap_or_else(PoisonError::into_inner).push(value);
            std::future::ready(())
        }
    }

    fn recorded(log: &Arc<Mutex<Vec<u32>>>) -> Vec<u32> {
        log.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_runs_once_with_last_value() {
        let debouncer = Debouncer::new(DELAY);
        let log = recorder();

        for value in 1..=5 {
            debouncer.schedule("heroContent", record(&log, value));
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        assert!(recorded(&log).is_empty());

        tokio::time::sleep(DELAY * 2).await;
        assert_eq!(recorded(&log), vec![5]);
        assert_eq!(debouncer.pending_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_waits_for_quiet_period() {
        let debouncer = Debouncer::new(DELAY);
        let log = recorder();

        debouncer.schedule("aboutContent", record(&log, 1));
        tokio::time::sleep(DELAY / 2).await;
        assert!(debouncer.is_pending(&"aboutContent"));
        assert!(recorded(&log).is_empty());

        tokio::time::sleep(DELAY).await;
        assert!(!debouncer.is_pending(&"aboutContent"));
        assert_eq!(recorded(&log), vec![1]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_keys_are_independent() {
        let debouncer = Debouncer::new(DELAY);
        let log = recorder();

        debouncer.schedule("a", record(&log, 1));
        debouncer.schedule("b", record(&log, 2));
        assert_eq!(debouncer.pending_count(), 2);

        tokio::time::sleep(DELAY * 2).await;
        let mut values = recorded(&log);
        values.sort_unstable();
        assert_eq!(values, vec![1, 2]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_drops_pending_action() {
        let debouncer = Debouncer::new(DELAY);
        let log = recorder();

        debouncer.schedule("a", record(&log, 1));
        assert!(debouncer.cancel(&"a"));
        assert!(!debouncer.cancel(&"a"));

        tokio::time::sleep(DELAY * 2).await;
        assert!(recorded(&log).is_empty());
    }
}
