//! Key-value cache used in front of the user store.
//!
//! Backends implement [`CacheStore`] and must support prefix eviction
//! natively. [`Cache`] wraps a backend with JSON encoding, a TTL, a size
//! ceiling, and the rule that cache failures are logged and never returned.

mod memory;
mod redis_store;

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, warn};

pub use self::memory::MemoryCache;
pub use self::redis_store::RedisCache;
use crate::config::CacheConfig;

#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>>;
    async fn set(&self, key: &str, value: String, ttl: Duration) -> anyhow::Result<()>;
    async fn delete(&self, key: &str) -> anyhow::Result<()>;
    /// Removes every key starting with `prefix`, returning how many went.
    async fn delete_prefix(&self, prefix: &str) -> anyhow::Result<u64>;
}

#[derive(Clone)]
pub struct Cache {
    store: Arc<dyn CacheStore>,
    ttl: Duration,
    max_entry_bytes: usize,
}

impl Cache {
    pub fn new(store: Arc<dyn CacheStore>, ttl: Duration, max_entry_bytes: usize) -> Self {
        Self {
            store,
            ttl,
            max_entry_bytes,
        }
    }

    /// Picks Redis when a URL is configured, the in-process map otherwise.
    pub async fn from_config(cfg: &CacheConfig) -> anyhow::Result<Self> {
        let store: Arc<dyn CacheStore> = match &cfg.redis_url {
            Some(url) => Arc::new(RedisCache::connect(url).await?),
            None => {
                let local = Arc::new(MemoryCache::new(cfg.max_items));
                MemoryCache::start_sweeper(local.clone(), memory::SWEEP_INTERVAL);
                local
            }
        };
        Ok(Self::new(
            store,
            Duration::from_secs(cfg.ttl_seconds),
            cfg.max_entry_bytes,
        ))
    }

    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = match self.store.get(key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                debug!(%key, "cache miss");
                return None;
            }
            Err(e) => {
                warn!(error = %e, %key, "cache get failed");
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(value) => {
                debug!(%key, "cache hit");
                Some(value)
            }
            Err(e) => {
                warn!(error = %e, %key, "cached value could not be decoded");
                None
            }
        }
    }

    /// Stores `value` unless its encoding exceeds the size ceiling.
    pub async fn set<T: Serialize>(&self, key: &str, value: &T) {
        let raw = match serde_json::to_string(value) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(error = %e, %key, "cache value could not be encoded");
                return;
            }
        };
        if raw.len() >= self.max_entry_bytes {
            debug!(%key, size = raw.len(), "value too large to cache");
            return;
        }
        if let Err(e) = self.store.set(key, raw, self.ttl).await {
            warn!(error = %e, %key, "cache set failed");
        }
    }

    pub async fn delete(&self, key: &str) {
        if let Err(e) = self.store.delete(key).await {
            warn!(error = %e, %key, "cache delete failed");
        }
    }

    pub async fn delete_prefix(&self, prefix: &str) {
        match self.store.delete_prefix(prefix).await {
            Ok(0) => {}
            Ok(n) => debug!(%prefix, cleared = n, "cleared cache keys"),
            Err(e) => warn!(error = %e, %prefix, "cache prefix eviction failed"),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Backend whose every call fails.
    pub(crate) struct BrokenStore;

    #[async_trait]
    impl CacheStore for BrokenStore {
        async fn get(&self, _key: &str) -> anyhow::Result<Option<String>> {
            anyhow::bail!("connection refused")
        }
        async fn set(&self, _key: &str, _value: String, _ttl: Duration) -> anyhow::Result<()> {
            anyhow::bail!("connection refused")
        }
        async fn delete(&self, _key: &str) -> anyhow::Result<()> {
            anyhow::bail!("connection refused")
        }
        async fn delete_prefix(&self, _prefix: &str) -> anyhow::Result<u64> {
            anyhow::bail!("connection refused")
        }
    }

    pub(crate) fn memory_cache() -> Cache {
        Cache::new(Arc::new(MemoryCache::new(1024)), Duration::from_secs(60), 100 * 1024)
    }

    #[tokio::test]
    async fn typed_roundtrip_through_memory() {
        let cache = memory_cache();
        cache.set("user:id:1", &vec!["a".to_string(), "b".to_string()]).await;
        let got: Option<Vec<String>> = cache.get("user:id:1").await;
        assert_eq!(got, Some(vec!["a".to_string(), "b".to_string()]));
    }

    #[tokio::test]
    async fn oversized_values_are_not_cached() {
        let cache = Cache::new(Arc::new(MemoryCache::new(1024)), Duration::from_secs(60), 16);
        cache.set("big", &"x".repeat(64)).await;
        assert_eq!(cache.get::<String>("big").await, None);
        cache.set("small", &"x").await;
        assert_eq!(cache.get::<String>("small").await.as_deref(), Some("x"));
    }

    #[tokio::test]
    async fn backend_failures_are_swallowed() {
        let cache = Cache::new(Arc::new(BrokenStore), Duration::from_secs(60), 1024);
        cache.set("k", &1u32).await;
        assert_eq!(cache.get::<u32>("k").await, None);
        cache.delete("k").await;
        cache.delete_prefix("user:").await;
    }

    #[tokio::test]
    async fn undecodable_entry_reads_as_miss() {
        let store = Arc::new(MemoryCache::new(1024));
        store
            .set("k", "not json".into(), Duration::from_secs(60))
            .await
            .unwrap();
        let cache = Cache::new(store, Duration::from_secs(60), 1024);
        assert_eq!(cache.get::<u32>("k").await, None);
    }
}
