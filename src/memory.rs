//! In-process cache tier with LRU eviction and TTL support
//!
//! Used standalone (zero external dependencies) or as the fast L1 tier
//! inside [`NetworkedCache`](crate::network::NetworkedCache). Operations
//! never suspend on I/O and never surface errors: the cache must not be a
//! source of request failure.

use crate::store::{CacheStore, CacheValue};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::debug;

/// A stored entry with its expiration instant. `expires_at: None` means the
/// entry never expires (TTL=0 at set time).
#[derive(Debug, Clone)]
struct MemoryEntry {
    value: CacheValue,
    expires_at: Option<Instant>,
}

impl MemoryEntry {
    fn new(value: CacheValue, ttl: Duration) -> Self {
        let expires_at = if ttl.is_zero() {
            None
        } else {
            Some(Instant::now() + ttl)
        };
        Self { value, expires_at }
    }

    fn is_expired(&self) -> bool {
        match self.expires_at {
            Some(at) => Instant::now() >= at,
            None => false,
        }
    }
}

/// Internal storage, guarded by a single RwLock
#[derive(Debug)]
struct MemoryStore {
    entries: HashMap<String, MemoryEntry>,
    /// LRU tracking: front = least recently used, back = most recent
    lru_queue: VecDeque<String>,
    hits: u64,
    misses: u64,
    evictions: u64,
}

/// Point-in-time introspection of a [`MemoryCache`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryCacheStats {
    /// Entries currently stored (including not-yet-swept expired ones)
    pub entries: usize,
    /// Configured capacity
    pub max_entries: usize,
    /// Capacity utilization percentage
    pub utilization_pct: f64,
    /// Entries that are still live
    pub active_entries: usize,
    /// Entries past their expiration, pending lazy removal
    pub expired_entries: usize,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

impl MemoryCacheStats {
    /// Cache hit rate as a percentage.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            (self.hits as f64 / total as f64) * 100.0
        }
    }
}

/// Bounded in-process LRU+TTL cache
///
/// Access order is refreshed on both `get` and `set` (an overwrite counts
/// as a fresh access). Expired entries are removed lazily when touched by
/// `get`/`exists` or swept by [`MemoryCache::cleanup_expired`].
#[derive(Debug)]
pub struct MemoryCache {
    store: Arc<RwLock<MemoryStore>>,
    max_entries: usize,
    default_ttl: Duration,
}

impl MemoryCache {
    /// Create a cache holding at most `max_entries`, with `default_ttl`
    /// applied to entries stored without an explicit TTL.
    pub fn new(max_entries: usize, default_ttl: Duration) -> Self {
        Self {
            store: Arc::new(RwLock::new(MemoryStore {
                entries: HashMap::new(),
                lru_queue: VecDeque::new(),
                hits: 0,
                misses: 0,
                evictions: 0,
            })),
            max_entries: max_entries.max(1),
            default_ttl,
        }
    }

    /// Default TTL applied to entries stored without an explicit TTL.
    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Number of entries currently stored (including expired, pre-sweep).
    pub async fn len(&self) -> usize {
        self.store.read().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.store.read().await.entries.is_empty()
    }

    /// Raw key listing, including expired entries, for diagnostics.
    pub async fn keys(&self) -> Vec<String> {
        self.store.read().await.entries.keys().cloned().collect()
    }

    /// Read-only introspection snapshot.
    pub async fn stats(&self) -> MemoryCacheStats {
        let store = self.store.read().await;
        let expired = store
            .entries
            .values()
            .filter(|entry| entry.is_expired())
            .count();
        let entries = store.entries.len();

        MemoryCacheStats {
            entries,
            max_entries: self.max_entries,
            utilization_pct: (entries as f64 / self.max_entries as f64) * 100.0,
            active_entries: entries - expired,
            expired_entries: expired,
            hits: store.hits,
            misses: store.misses,
            evictions: store.evictions,
        }
    }

    /// Remove all entries.
    pub async fn clear(&self) {
        let mut store = self.store.write().await;
        let count = store.entries.len();
        store.entries.clear();
        store.lru_queue.clear();
        debug!("Cleared {} entries from memory cache", count);
    }

    /// Sweep expired entries, returning how many were removed.
    pub async fn cleanup_expired(&self) -> usize {
        let mut store = self.store.write().await;
        let expired_keys: Vec<String> = store
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired())
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired_keys {
            store.entries.remove(key);
            store.lru_queue.retain(|k| k != key);
        }

        if !expired_keys.is_empty() {
            debug!("Swept {} expired entries", expired_keys.len());
        }
        expired_keys.len()
    }

    fn remove_entry(store: &mut MemoryStore, key: &str) {
        store.entries.remove(key);
        store.lru_queue.retain(|k| k != key);
    }

    fn touch(store: &mut MemoryStore, key: &str) {
        store.lru_queue.retain(|k| k != key);
        store.lru_queue.push_back(key.to_string());
    }
}

#[async_trait]
impl CacheStore for MemoryCache {
    async fn get(&self, key: &str) -> Option<CacheValue> {
        let mut store = self.store.write().await;

        match store.entries.get(key) {
            Some(entry) if entry.is_expired() => {
                debug!("Memory cache entry expired: {}", key);
                Self::remove_entry(&mut store, key);
                store.misses += 1;
                None
            }
            Some(entry) => {
                let value = entry.value.clone();
                store.hits += 1;
                Self::touch(&mut store, key);
                Some(value)
            }
            None => {
                store.misses += 1;
                None
            }
        }
    }

    async fn set(&self, key: &str, value: CacheValue, ttl: Option<Duration>) {
        let mut store = self.store.write().await;

        // Evict the least recently used entry before inserting a new key
        // at capacity. Overwrites reuse the existing slot.
        if !store.entries.contains_key(key) && store.entries.len() >= self.max_entries {
            if let Some(oldest) = store.lru_queue.pop_front() {
                debug!("Evicting LRU entry: {}", oldest);
                store.entries.remove(&oldest);
                store.evictions += 1;
            }
        }

        let effective_ttl = ttl.unwrap_or(self.default_ttl);
        store
            .entries
            .insert(key.to_string(), MemoryEntry::new(value, effective_ttl));
        Self::touch(&mut store, key);
    }

    async fn delete(&self, key: &str) -> bool {
        let mut store = self.store.write().await;
        let existed = store.entries.remove(key).is_some();
        if existed {
            store.lru_queue.retain(|k| k != key);
        }
        existed
    }

    async fn exists(&self, key: &str) -> bool {
        let mut store = self.store.write().await;
        match store.entries.get(key) {
            Some(entry) if entry.is_expired() => {
                Self::remove_entry(&mut store, key);
                false
            }
            Some(_) => true,
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_set_and_get_roundtrip() {
        let cache = MemoryCache::new(100, Duration::from_secs(60));

        cache.set("key1", json!({"answer": 42}), None).await;
        let value = cache.get("key1").await;

        assert_eq!(value, Some(json!({"answer": 42})));
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn test_miss_is_silent() {
        let cache = MemoryCache::new(100, Duration::from_secs(60));
        assert_eq!(cache.get("nonexistent").await, None);

        let stats = cache.stats().await;
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits, 0);
    }

    #[tokio::test]
    async fn test_ttl_expiration() {
        let cache = MemoryCache::new(100, Duration::from_secs(60));

        cache
            .set("short", json!("v"), Some(Duration::from_millis(50)))
            .await;
        assert!(cache.get("short").await.is_some());

        tokio::time::sleep(Duration::from_millis(80)).await;
        assert_eq!(cache.get("short").await, None);
        // Lazy deletion removed the entry.
        assert_eq!(cache.len().await, 0);
    }

    #[tokio::test]
    async fn test_ttl_zero_disables_expiration() {
        let cache = MemoryCache::new(100, Duration::from_millis(20));

        cache.set("pinned", json!("v"), Some(Duration::ZERO)).await;
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(cache.get("pinned").await.is_some());
    }

    #[tokio::test]
    async fn test_lru_eviction_at_capacity() {
        let cache = MemoryCache::new(3, Duration::from_secs(60));

        cache.set("key1", json!(1), None).await;
        cache.set("key2", json!(2), None).await;
        cache.set("key3", json!(3), None).await;

        // Full: inserting key4 evicts key1 (least recently used).
        cache.set("key4", json!(4), None).await;

        assert_eq!(cache.len().await, 3);
        assert_eq!(cache.get("key1").await, None);
        assert!(cache.get("key2").await.is_some());
        assert!(cache.get("key4").await.is_some());
    }

    #[tokio::test]
    async fn test_get_refreshes_recency() {
        let cache = MemoryCache::new(3, Duration::from_secs(60));

        cache.set("key1", json!(1), None).await;
        cache.set("key2", json!(2), None).await;
        cache.set("key3", json!(3), None).await;

        // key1 becomes most recent; key2 is now the eviction candidate.
        cache.get("key1").await;
        cache.set("key4", json!(4), None).await;

        assert!(cache.get("key1").await.is_some());
        assert_eq!(cache.get("key2").await, None);
    }

    #[tokio::test]
    async fn test_overwrite_refreshes_recency() {
        let cache = MemoryCache::new(3, Duration::from_secs(60));

        cache.set("key1", json!(1), None).await;
        cache.set("key2", json!(2), None).await;
        cache.set("key3", json!(3), None).await;

        cache.set("key1", json!("updated"), None).await;
        cache.set("key4", json!(4), None).await;

        assert_eq!(cache.get("key1").await, Some(json!("updated")));
        assert_eq!(cache.get("key2").await, None);
        assert_eq!(cache.len().await, 3);
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let cache = MemoryCache::new(100, Duration::from_secs(60));

        cache.set("key1", json!(1), None).await;
        assert!(cache.delete("key1").await);
        assert!(!cache.delete("key1").await);
        assert!(!cache.delete("never-existed").await);
    }

    #[tokio::test]
    async fn test_exists_is_expiration_aware() {
        let cache = MemoryCache::new(100, Duration::from_secs(60));

        cache
            .set("short", json!("v"), Some(Duration::from_millis(50)))
            .await;
        assert!(cache.exists("short").await);

        tokio::time::sleep(Duration::from_millis(80)).await;
        assert!(!cache.exists("short").await);
        assert!(!cache.exists("never-set").await);
    }

    #[tokio::test]
    async fn test_introspection() {
        let cache = MemoryCache::new(10, Duration::from_secs(60));

        cache.set("live", json!(1), None).await;
        cache
            .set("dead", json!(2), Some(Duration::from_millis(10)))
            .await;
        tokio::time::sleep(Duration::from_millis(30)).await;

        let stats = cache.stats().await;
        assert_eq!(stats.entries, 2);
        assert_eq!(stats.active_entries, 1);
        assert_eq!(stats.expired_entries, 1);
        assert!((stats.utilization_pct - 20.0).abs() < f64::EPSILON);

        // Key listing includes expired entries for diagnostics.
        let mut keys = cache.keys().await;
        keys.sort();
        assert_eq!(keys, vec!["dead".to_string(), "live".to_string()]);
    }

    #[tokio::test]
    async fn test_cleanup_expired() {
        let cache = MemoryCache::new(10, Duration::from_secs(60));

        cache
            .set("a", json!(1), Some(Duration::from_millis(10)))
            .await;
        cache.set("b", json!(2), None).await;
        tokio::time::sleep(Duration::from_millis(30)).await;

        assert_eq!(cache.cleanup_expired().await, 1);
        assert_eq!(cache.len().await, 1);
        assert!(cache.get("b").await.is_some());
    }

    #[tokio::test]
    async fn test_debug_formatting() {
        let cache = MemoryCache::new(10, Duration::from_secs(60));
        cache.set("k", json!(1), None).await;
        assert!(format!("{:?}", cache).contains("MemoryCache"));
    }

    #[tokio::test]
    async fn test_hit_rate() {
        let cache = MemoryCache::new(10, Duration::from_secs(60));

        cache.set("k", json!(1), None).await;
        cache.get("k").await;
        cache.get("missing").await;

        let stats = cache.stats().await;
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert!((stats.hit_rate() - 50.0).abs() < f64::EPSILON);
    }
}
