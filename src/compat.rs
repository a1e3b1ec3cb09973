//! Legacy call-surface adapter
//!
//! Earlier integrations used `get_from_cache`/`save_to_cache`-style method
//! names with TTLs in whole seconds. This facade keeps those call sites
//! compiling against the modern interface while logging a one-time
//! deprecation notice per method.

use crate::factory::{BuiltCache, CacheBackend};
use crate::store::{CacheStore, CacheValue};
use serde_json::json;
use std::sync::{Arc, Once};
use std::time::Duration;
use tracing::warn;

/// Adapter exposing the legacy method names over a built cache instance.
pub struct LegacyCacheFacade {
    inner: Arc<BuiltCache>,
}

impl LegacyCacheFacade {
    pub fn new(inner: Arc<BuiltCache>) -> Self {
        Self { inner }
    }

    fn deprecation_notice(once: &'static Once, old: &'static str, new: &'static str) {
        once.call_once(|| {
            warn!(old, new, "deprecated cache method called; migrate to the new name");
        });
    }

    /// Legacy name for [`CacheStore::get`].
    pub async fn get_from_cache(&self, key: &str) -> Option<CacheValue> {
        static NOTICE: Once = Once::new();
        Self::deprecation_notice(&NOTICE, "get_from_cache", "get");
        self.inner.backend().get(key).await
    }

    /// Legacy name for [`CacheStore::set`], TTL in whole seconds.
    pub async fn save_to_cache(&self, key: &str, value: CacheValue, ttl_seconds: Option<u64>) {
        static NOTICE: Once = Once::new();
        Self::deprecation_notice(&NOTICE, "save_to_cache", "set");
        let ttl = ttl_seconds.map(Duration::from_secs);
        self.inner.backend().set(key, value, ttl).await;
    }

    /// Legacy name for [`CacheStore::delete`].
    pub async fn remove_from_cache(&self, key: &str) -> bool {
        static NOTICE: Once = Once::new();
        Self::deprecation_notice(&NOTICE, "remove_from_cache", "delete");
        self.inner.backend().delete(key).await
    }

    /// Legacy stats accessor returning a loose JSON document.
    pub async fn cache_stats(&self) -> CacheValue {
        static NOTICE: Once = Once::new();
        Self::deprecation_notice(&NOTICE, "cache_stats", "status/stats");

        match self.inner.backend() {
            CacheBackend::Networked(cache) => {
                let status = cache.status().await;
                serde_json::to_value(&status).unwrap_or_else(|_| json!({}))
            }
            CacheBackend::Memory(cache) => {
                let stats = cache.stats().await;
                serde_json::to_value(&stats).unwrap_or_else(|_| json!({}))
            }
        }
    }
}
