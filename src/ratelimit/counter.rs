//! In-memory counter store.

use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::time::Instant;
use tracing::trace;

use super::backend::CounterStore;
use crate::error::Result;

/// A counter within its current window.
#[derive(Debug, Default, Clone, Copy)]
struct WindowCounter {
    /// Increments since the window started
    count: u64,
    /// When the window ends; `None` until an expiry is set
    expires_at: Option<Instant>,
}

impl WindowCounter {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }
}

/// Host-local counter store for tests and single-node deployments.
///
/// Each key lives in its own map shard entry, so increments on the same key
/// are serialized by the entry lock. Expired counters read as absent and
/// are reset by the next increment, but are only removed by
/// [`purge_expired`](Self::purge_expired). Long-lived stores with
/// high-cardinality keys (e.g. `%{path}` templates) must call it
/// periodically, or memory grows with every distinct key seen.
#[derive(Debug, Default)]
pub struct MemoryCounterStore {
    counters: DashMap<String, WindowCounter>,
}

impl MemoryCounterStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current count for a key, or `None` if absent or expired.
    pub fn count(&self, key: &str) -> Option<u64> {
        let now = Instant::now();
        self.counters
            .get(key)
            .filter(|counter| !counter.is_expired(now))
            .map(|counter| counter.count)
    }

    /// Time until the window for a key ends.
    ///
    /// Returns `None` for absent counters and counters without an expiry.
    pub fn time_to_reset(&self, key: &str) -> Option<Duration> {
        let now = Instant::now();
        self.counters
            .get(key)
            .and_then(|counter| counter.expires_at)
            .map(|at| at.saturating_duration_since(now))
    }

    /// Drop every expired counter, returning how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.counters.len();
        self.counters.retain(|_, counter| !counter.is_expired(now));
        let removed = before.saturating_sub(self.counters.len());
        trace!(removed = removed, "Purged expired counters");
        removed
    }

    /// Number of stored counters, including expired ones not yet purged.
    pub fn len(&self) -> usize {
        self.counters.len()
    }

    /// Whether the store holds no counters.
    pub fn is_empty(&self) -> bool {
        self.counters.is_empty()
    }

    /// Remove all counters.
    pub fn clear(&self) {
        self.counters.clear();
    }
}

#[async_trait]
impl CounterStore for MemoryCounterStore {
    async fn incr(&self, key: &str) -> Result<u64> {
        let now = Instant::now();
        let mut counter = self.counters.entry(key.to_string()).or_default();

        if counter.is_expired(now) {
            *counter = WindowCounter::default();
        }
        counter.count += 1;

        Ok(counter.count)
    }

    async fn expire(&self, key: &str, period: Duration) -> Result<()> {
        if let Some(mut counter) = self.counters.get_mut(key) {
            // A period past the clock's range never expires.
            counter.expires_at = Instant::now().checked_add(period);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tokio_test::assert_ok;

    #[tokio::test]
    async fn test_incr_counts_up() {
        let store = MemoryCounterStore::new();

        assert_eq!(assert_ok!(store.incr("a").await), 1);
        assert_eq!(assert_ok!(store.incr("a").await), 2);
        assert_eq!(assert_ok!(store.incr("b").await), 1);

        assert_eq!(store.count("a"), Some(2));
        assert_eq!(store.count("missing"), None);
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn test_expire_missing_key_is_noop() {
        let store = MemoryCounterStore::new();
        assert_ok!(store.expire("missing", Duration::from_secs(1)).await);
        assert!(store.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_hit_starts_window() {
        let store = MemoryCounterStore::new();
        let period = Duration::from_secs(60);

        assert_eq!(assert_ok!(store.increment_and_expire("k", period).await), 1);
        assert_eq!(store.time_to_reset("k"), Some(period));

        tokio::time::advance(Duration::from_secs(30)).await;

        // Later hits in the same window do not push the expiry out.
        assert_eq!(assert_ok!(store.increment_and_expire("k", period).await), 2);
        assert_eq!(store.time_to_reset("k"), Some(Duration::from_secs(30)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_counter_resets_after_window() {
        let store = MemoryCounterStore::new();
        let period = Duration::from_secs(60);

        for _ in 0..3 {
            assert_ok!(store.increment_and_expire("k", period).await);
        }
        assert_eq!(store.count("k"), Some(3));

        tokio::time::advance(period).await;
        assert_eq!(store.count("k"), None);

        assert_eq!(assert_ok!(store.increment_and_expire("k", period).await), 1);
        assert_eq!(store.time_to_reset("k"), Some(period));
    }

    #[tokio::test(start_paused = true)]
    async fn test_period_beyond_clock_range_never_expires() {
        let store = MemoryCounterStore::new();
        let period = Duration::from_secs(u64::MAX);

        assert_eq!(assert_ok!(store.increment_and_expire("k", period).await), 1);
        assert_eq!(store.time_to_reset("k"), None);

        tokio::time::advance(Duration::from_secs(86400)).await;
        assert_eq!(assert_ok!(store.increment_and_expire("k", period).await), 2);
        assert_eq!(store.purge_expired(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_purge_expired() {
        let store = MemoryCounterStore::new();

        assert_ok!(store.increment_and_expire("short", Duration::from_secs(1)).await);
        assert_ok!(store.increment_and_expire("long", Duration::from_secs(10)).await);

        tokio::time::advance(Duration::from_secs(2)).await;

        assert_eq!(store.purge_expired(), 1);
        assert_eq!(store.len(), 1);
        assert_eq!(store.count("long"), Some(1));

        store.clear();
        assert!(store.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_increments_are_atomic() {
        let store = Arc::new(MemoryCounterStore::new());

        let handles: Vec<_> = (0..64)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move {
                    for _ in 0..50 {
                        store.incr("shared").await.unwrap();
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(store.count("shared"), Some(64 * 50));
    }
}
