//! In-memory correlation cache.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::debug;

use super::{CacheError, CorrelationCache};

/// Default interval between expired-entry sweeps.
pub const DEFAULT_CLEANUP_INTERVAL: Duration = Duration::from_secs(60);

struct CacheEntry {
    value: String,
    expires_at: Instant,
}

impl CacheEntry {
    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// Correlation cache backed by a concurrent hash map.
///
/// `take` is a single `DashMap::remove`, so two concurrent takers of the same
/// key can never both receive the value.
#[derive(Default)]
pub struct MemoryCache {
    entries: DashMap<String, CacheEntry>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Evict expired entries. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.is_live(now));
        before.saturating_sub(self.entries.len())
    }

    /// Number of entries, including expired ones not yet purged.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Spawn a periodic cleanup task.
    pub fn spawn_cleanup_task(
        self: &Arc<Self>,
        interval: Duration,
    ) -> tokio::task::JoinHandle<()> {
        let cache = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                let removed = cache.purge_expired();
                if removed > 0 {
                    debug!(removed, "purged expired correlation entries");
                }
            }
        })
    }
}

#[async_trait]
impl CorrelationCache for MemoryCache {
    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError> {
        let expires_at = Instant::now()
            .checked_add(ttl)
            .ok_or_else(|| CacheError::Value(format!("ttl out of range: {ttl:?}")))?;
        self.entries
            .insert(key.to_string(), CacheEntry { value, expires_at });
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let now = Instant::now();
        Ok(self
            .entries
            .get(key)
            .filter(|entry| entry.is_live(now))
            .map(|entry| entry.value.clone()))
    }

    async fn delete(&self, key: &str) -> Result<bool, CacheError> {
        let now = Instant::now();
        Ok(self
            .entries
            .remove(key)
            .is_some_and(|(_, entry)| entry.is_live(now)))
    }

    async fn take(&self, key: &str) -> Result<Option<String>, CacheError> {
        let now = Instant::now();
        Ok(self
            .entries
            .remove(key)
            .filter(|(_, entry)| entry.is_live(now))
            .map(|(_, entry)| entry.value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TTL: Duration = Duration::from_secs(120);

    #[tokio::test]
    async fn get_returns_none_for_missing_key() {
        let cache = MemoryCache::new();
        assert!(cache.get("unknown").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn set_and_get_roundtrip() {
        let cache = MemoryCache::new();
        cache.set("k1", "v1".into(), TTL).await.unwrap();
        assert_eq!(cache.get("k1").await.unwrap().as_deref(), Some("v1"));
        // get does not consume
        assert_eq!(cache.get("k1").await.unwrap().as_deref(), Some("v1"));
    }

    #[tokio::test]
    async fn take_is_single_use() {
        let cache = MemoryCache::new();
        cache.set("k1", "v1".into(), TTL).await.unwrap();
        assert_eq!(cache.take("k1").await.unwrap().as_deref(), Some("v1"));
        assert!(cache.take("k1").await.unwrap().is_none());
        assert!(cache.get("k1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn delete_reports_removal() {
        let cache = MemoryCache::new();
        cache.set("k1", "v1".into(), TTL).await.unwrap();
        assert!(cache.delete("k1").await.unwrap());
        assert!(!cache.delete("k1").await.unwrap());
    }

    #[tokio::test]
    async fn expired_entries_read_as_absent() {
        let cache = MemoryCache::new();
        cache.set("k1", "v1".into(), Duration::ZERO).await.unwrap();
        assert!(cache.get("k1").await.unwrap().is_none());
        assert!(cache.take("k1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn purge_removes_only_expired() {
        let cache = MemoryCache::new();
        cache.set("fresh", "v".into(), TTL).await.unwrap();
        cache.set("stale", "v".into(), Duration::ZERO).await.unwrap();
        assert_eq!(cache.purge_expired(), 1);
        assert_eq!(cache.len(), 1);
        assert!(cache.get("fresh").await.unwrap().is_some());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_takes_yield_one_winner() {
        let cache = Arc::new(MemoryCache::new());
        cache.set("code", "v".into(), TTL).await.unwrap();

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let cache = Arc::clone(&cache);
                tokio::spawn(async move { cache.take("code").await.unwrap() })
            })
            .collect();

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap().is_some() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }
}
