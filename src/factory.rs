//! Cache construction and the process-wide instance registry
//!
//! The factory validates configuration before any I/O, builds the
//! requested cache kind and applies the documented fallback: when the
//! remote store is unreachable it either returns an equivalent memory-only
//! cache (default) or fails with a structured infrastructure error
//! (strict mode). The registry deduplicates instances by configuration
//! fingerprint, holding only weak references so lifetime stays with the
//! last strong holder.

use crate::config::{CacheConfig, CacheSpec, ResponseConfig};
use crate::error::{CacheError, Result};
use crate::memory::MemoryCache;
use crate::monitor::PerformanceMonitor;
use crate::network::{NetworkedCache, SetOptions};
use crate::response::ResponseCache;
use crate::store::{CacheStore, CacheValue};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Storage backend a cache instance runs on: the full two-tier cache or
/// the memory-only fallback with identical call semantics.
#[derive(Debug)]
pub enum CacheBackend {
    Networked(Arc<NetworkedCache>),
    Memory(Arc<MemoryCache>),
}

impl CacheBackend {
    /// Store with per-write options. The memory fallback has no remote
    /// tier, so the options have nothing to apply to.
    pub async fn set_with(
        &self,
        key: &str,
        value: CacheValue,
        ttl: Option<Duration>,
        options: SetOptions,
    ) {
        match self {
            CacheBackend::Networked(cache) => cache.set_with(key, value, ttl, options).await,
            CacheBackend::Memory(cache) => cache.set(key, value, ttl).await,
        }
    }

    /// Performance monitor, present on the networked backend only.
    pub fn monitor(&self) -> Option<&Arc<PerformanceMonitor>> {
        match self {
            CacheBackend::Networked(cache) => Some(cache.monitor()),
            CacheBackend::Memory(_) => None,
        }
    }

    /// Whether this backend is serving without a remote tier.
    pub fn is_degraded(&self) -> bool {
        match self {
            CacheBackend::Networked(cache) => !cache.is_connected(),
            CacheBackend::Memory(_) => true,
        }
    }
}

#[async_trait]
impl CacheStore for CacheBackend {
    async fn get(&self, key: &str) -> Option<CacheValue> {
        match self {
            CacheBackend::Networked(cache) => cache.get(key).await,
            CacheBackend::Memory(cache) => cache.get(key).await,
        }
    }

    async fn set(&self, key: &str, value: CacheValue, ttl: Option<Duration>) {
        match self {
            CacheBackend::Networked(cache) => cache.set(key, value, ttl).await,
            CacheBackend::Memory(cache) => cache.set(key, value, ttl).await,
        }
    }

    async fn delete(&self, key: &str) -> bool {
        match self {
            CacheBackend::Networked(cache) => cache.delete(key).await,
            CacheBackend::Memory(cache) => cache.delete(key).await,
        }
    }

    async fn exists(&self, key: &str) -> bool {
        match self {
            CacheBackend::Networked(cache) => cache.exists(key).await,
            CacheBackend::Memory(cache) => cache.exists(key).await,
        }
    }
}

/// A fully assembled cache instance as handed out by the factory
#[derive(Debug)]
pub enum BuiltCache {
    Generic(CacheBackend),
    Response(ResponseCache),
}

impl BuiltCache {
    /// The underlying storage backend of either kind.
    pub fn backend(&self) -> &CacheBackend {
        match self {
            BuiltCache::Generic(backend) => backend,
            BuiltCache::Response(cache) => cache.backend(),
        }
    }

    /// The response specialization, when this instance is one.
    pub fn as_response(&self) -> Option<&ResponseCache> {
        match self {
            BuiltCache::Response(cache) => Some(cache),
            BuiltCache::Generic(_) => None,
        }
    }
}

/// Deterministic constructor for wired cache instances.
pub struct CacheFactory;

impl CacheFactory {
    /// Build the cache described by `spec`.
    ///
    /// Validation happens before any I/O. If the remote store is
    /// unreachable, the default is a logged fallback to an equivalent
    /// memory-only cache; with `fail_on_connection_error` set, an
    /// infrastructure error is returned instead.
    pub async fn build(spec: CacheSpec) -> Result<Arc<BuiltCache>> {
        spec.validate()?;

        let built = match spec {
            CacheSpec::Generic(config) => {
                let backend = Self::build_backend(config).await?;
                BuiltCache::Generic(backend)
            }
            CacheSpec::AiResponse(config) => {
                let backend = Self::build_backend(config.base.clone()).await?;
                BuiltCache::Response(ResponseCache::new(backend, &config))
            }
        };

        Ok(Arc::new(built))
    }

    async fn build_backend(config: CacheConfig) -> Result<CacheBackend> {
        let strict = config.fail_on_connection_error;
        let l1_max_entries = config.l1_max_entries;
        let default_ttl = config.default_ttl;
        let connection_string = config.connection_string.clone();

        let cache = NetworkedCache::new(config)?;
        if cache.connect().await {
            return Ok(CacheBackend::Networked(Arc::new(cache)));
        }

        if strict {
            return Err(CacheError::Infrastructure(format!(
                "remote store unreachable at {}",
                connection_string
            )));
        }

        warn!(
            url = %connection_string,
            "remote store unreachable, falling back to memory-only cache"
        );
        Ok(CacheBackend::Memory(Arc::new(MemoryCache::new(
            l1_max_entries,
            default_ttl,
        ))))
    }

    /// Balanced profile for web applications.
    pub async fn for_web_app() -> Result<Arc<BuiltCache>> {
        Self::build(CacheSpec::Generic(CacheConfig::web_app())).await
    }

    /// AI-optimized response cache with default tiering.
    pub async fn for_ai_workloads() -> Result<Arc<BuiltCache>> {
        Self::build(CacheSpec::AiResponse(ResponseConfig::default())).await
    }

    /// Ephemeral profile for tests.
    pub async fn for_testing() -> Result<Arc<BuiltCache>> {
        Self::build(CacheSpec::Generic(CacheConfig::ephemeral())).await
    }
}

static REGISTRY: Lazy<Mutex<HashMap<String, Weak<BuiltCache>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

/// Process-wide cache instance registry keyed by configuration fingerprint.
///
/// Holds weak references only: an instance lives as long as its last
/// strong holder, and dead entries are swept on access.
pub struct CacheRegistry;

impl CacheRegistry {
    /// Return the live instance for this configuration, or build and
    /// register one.
    ///
    /// The registry lock is not held across construction; two callers
    /// racing on a new fingerprint may build twice, with the later
    /// registration winning. Both instances stay fully functional.
    pub async fn get_or_build(spec: CacheSpec) -> Result<Arc<BuiltCache>> {
        let fingerprint = spec.fingerprint();

        if let Some(existing) = Self::lookup(&fingerprint) {
            debug!(fingerprint, "registry hit, reusing cache instance");
            return Ok(existing);
        }

        let built = CacheFactory::build(spec).await?;

        if let Ok(mut registry) = REGISTRY.lock() {
            Self::sweep(&mut registry);
            registry.insert(fingerprint.clone(), Arc::downgrade(&built));
            info!(fingerprint, live = registry.len(), "cache instance registered");
        }

        Ok(built)
    }

    fn lookup(fingerprint: &str) -> Option<Arc<BuiltCache>> {
        let mut registry = REGISTRY.lock().ok()?;
        Self::sweep(&mut registry);
        registry.get(fingerprint).and_then(Weak::upgrade)
    }

    fn sweep(registry: &mut HashMap<String, Weak<BuiltCache>>) {
        registry.retain(|_, weak| weak.strong_count() > 0);
    }

    /// Number of live registered instances.
    pub fn len() -> usize {
        REGISTRY
            .lock()
            .map(|mut registry| {
                Self::sweep(&mut registry);
                registry.len()
            })
            .unwrap_or(0)
    }

    /// Drop all registrations (instances themselves stay alive with their
    /// holders). Intended for shutdown and test isolation.
    pub fn clear() {
        if let Ok(mut registry) = REGISTRY.lock() {
            registry.clear();
        }
    }
}
