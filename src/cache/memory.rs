use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::time::interval;
use tracing::{debug, info};

use super::CacheStore;

/// How often the background sweeper drops expired entries.
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(30);

struct Entry {
    value: String,
    expires_at: Instant,
}

/// Process-local backend holding at most `max_items` entries. Expired
/// entries go on read, on a full insert, and in the periodic sweep.
pub struct MemoryCache {
    entries: DashMap<String, Entry>,
    max_items: usize,
}

impl MemoryCache {
    pub fn new(max_items: usize) -> Self {
        Self {
            entries: DashMap::new(),
            max_items: max_items.max(1),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Drops every expired entry, returning how many went.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, e| e.expires_at > now);
        before.saturating_sub(self.entries.len())
    }

    pub fn start_sweeper(cache: Arc<Self>, every: Duration) {
        tokio::spawn(async move {
            let mut ticker = interval(every);
            info!(every_secs = every.as_secs(), "memory cache sweeper started");
            loop {
                ticker.tick().await;
                let removed = cache.purge_expired();
                if removed > 0 {
                    debug!(removed, remaining = cache.len(), "swept expired cache entries");
                }
            }
        });
    }

    /// Makes room for one new key: expired entries first, then the entry
    /// closest to expiry.
    fn make_room(&self) {
        if self.entries.len() < self.max_items {
            return;
        }
        self.purge_expired();
        while self.entries.len() >= self.max_items {
            let victim = self
                .entries
                .iter()
                .min_by_key(|e| e.value().expires_at)
                .map(|e| e.key().clone());
            match victim {
                Some(key) => {
                    self.entries.remove(&key);
                }
                None => break,
            }
        }
    }
}

#[async_trait]
impl CacheStore for MemoryCache {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        let hit = self
            .entries
            .get(key)
            .map(|e| (e.value.clone(), e.expires_at));
        match hit {
            Some((value, expires_at)) if expires_at > Instant::now() => Ok(Some(value)),
            Some(_) => {
                self.entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> anyhow::Result<()> {
        if !self.entries.contains_key(key) {
            self.make_room();
        }
        self.entries.insert(
            key.to_string(),
            Entry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> anyhow::Result<()> {
        self.entries.remove(key);
        Ok(())
    }

    async fn delete_prefix(&self, prefix: &str) -> anyhow::Result<u64> {
        let before = self.entries.len();
        self.entries.retain(|k, _| !k.starts_with(prefix));
        Ok(before.saturating_sub(self.entries.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TTL: Duration = Duration::from_secs(60);

    #[tokio::test]
    async fn expired_entries_are_misses() {
        let cache = MemoryCache::new(16);
        cache.set("k", "v".into(), Duration::ZERO).await.unwrap();
        assert_eq!(cache.get("k").await.unwrap(), None);
        assert_eq!(cache.len(), 0);
    }

    #[tokio::test]
    async fn delete_prefix_only_touches_matching_keys() {
        let cache = MemoryCache::new(16);
        cache.set("user:id:1", "a".into(), TTL).await.unwrap();
        cache.set("user:list:{}", "b".into(), TTL).await.unwrap();
        cache.set("session:1", "c".into(), TTL).await.unwrap();

        let removed = cache.delete_prefix("user:list:").await.unwrap();
        assert_eq!(removed, 1);
        assert!(cache.get("user:id:1").await.unwrap().is_some());
        assert!(cache.get("session:1").await.unwrap().is_some());

        cache.delete_prefix("user:").await.unwrap();
        assert!(cache.get("user:id:1").await.unwrap().is_none());
        assert_eq!(cache.get("session:1").await.unwrap().as_deref(), Some("c"));
    }

    #[tokio::test]
    async fn purge_drops_unread_expired_entries() {
        let cache = MemoryCache::new(10_000);
        for i in 0..5000 {
            cache
                .set(&format!("user:list:{i}"), "x".into(), Duration::ZERO)
                .await
                .unwrap();
        }
        cache.set("live", "y".into(), TTL).await.unwrap();
        assert_eq!(cache.purge_expired(), 5000);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn entry_count_is_capped() {
        let cache = MemoryCache::new(3);
        for i in 0..10u64 {
            cache
                .set(&format!("k{i}"), i.to_string(), TTL + Duration::from_secs(i))
                .await
                .unwrap();
        }
        assert_eq!(cache.len(), 3);
        // the soonest-expiring entries were evicted
        assert_eq!(cache.get("k9").await.unwrap().as_deref(), Some("9"));
        assert!(cache.get("k0").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn overwriting_a_key_does_not_evict() {
        let cache = MemoryCache::new(2);
        cache.set("a", "1".into(), TTL).await.unwrap();
        cache.set("b", "2".into(), TTL).await.unwrap();
        cache.set("a", "3".into(), TTL).await.unwrap();
        assert_eq!(cache.get("a").await.unwrap().as_deref(), Some("3"));
        assert_eq!(cache.get("b").await.unwrap().as_deref(), Some("2"));
    }

    #[tokio::test]
    async fn sweeper_clears_expired_entries() {
        let cache = Arc::new(MemoryCache::new(64));
        for i in 0..20 {
            cache
                .set(&format!("k{i}"), "x".into(), Duration::ZERO)
                .await
                .unwrap();
        }
        MemoryCache::start_sweeper(cache.clone(), Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(cache.len(), 0);
    }
}
