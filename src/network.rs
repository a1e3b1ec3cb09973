//! Two-tier networked cache: in-process L1 in front of a remote L2
//!
//! Reads check L1 first and only then the remote store; remote hits are
//! decoded and promoted into L1. Writes encode for the remote tier and
//! mirror into L1. When the remote store is unreachable the cache runs in
//! degraded L1-only mode: every operation still succeeds and no error
//! reaches the caller.

use crate::codec::{Codec, PayloadFormat};
use crate::config::CacheConfig;
use crate::error::Result;
use crate::events::{CacheEventKind, EventBus};
use crate::memory::{MemoryCache, MemoryCacheStats};
use crate::monitor::{PerfReport, PerformanceMonitor};
use crate::remote::{ConnectionState, RemoteStore, SecurityReport};
use crate::store::{CacheStore, CacheValue};
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Per-write knobs used by the response-tier logic
#[derive(Debug, Clone, Copy)]
pub struct SetOptions {
    /// Mirror the value into L1 after the remote write
    pub promote_l1: bool,
    /// Compress even below the configured threshold
    pub force_compression: bool,
}

impl Default for SetOptions {
    fn default() -> Self {
        Self {
            promote_l1: true,
            force_compression: false,
        }
    }
}

/// Operational snapshot for monitoring and administration
#[derive(Debug, Clone, Serialize)]
pub struct CacheStatus {
    pub connection_state: ConnectionState,
    /// True when serving from L1 only
    pub degraded: bool,
    pub l1: MemoryCacheStats,
    pub performance: PerfReport,
    pub security: SecurityReport,
}

/// L1+L2 cache with graceful degradation.
pub struct NetworkedCache {
    config: CacheConfig,
    l1: MemoryCache,
    remote: RemoteStore,
    codec: Codec,
    events: EventBus,
    monitor: Arc<PerformanceMonitor>,
}

impl NetworkedCache {
    /// Assemble the cache from a validated configuration. No I/O happens
    /// here; call [`connect`](Self::connect) to reach the remote store.
    pub fn new(config: CacheConfig) -> Result<Self> {
        config.validate()?;

        let l1 = MemoryCache::new(config.l1_max_entries, config.default_ttl);
        let remote = RemoteStore::new(&config)?;
        let codec = Codec::new(
            config.json_fast_path_limit,
            config.compression_threshold,
            config.compression_level,
        );
        let monitor = Arc::new(PerformanceMonitor::new(config.monitor.clone()));

        Ok(Self {
            config,
            l1,
            remote,
            codec,
            events: EventBus::new(),
            monitor,
        })
    }

    /// Attempt to establish the remote connection. Returns whether the
    /// cache is connected afterwards; never errors.
    pub async fn connect(&self) -> bool {
        let was_connected = self.remote.is_connected();
        let connected = self.remote.connect().await;

        if connected && !was_connected {
            self.events
                .emit(crate::events::CacheEvent::new(CacheEventKind::Connected, None));
        }
        connected
    }

    pub fn is_connected(&self) -> bool {
        self.remote.is_connected()
    }

    /// Health probe: validate the live remote connection with a ping.
    pub async fn ping(&self) -> bool {
        let was_connected = self.remote.is_connected();
        let healthy = self.remote.ping().await;
        if !healthy {
            self.observe_disconnect(was_connected);
        }
        healthy
    }

    /// Event subscription surface.
    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Shared performance monitor.
    pub fn monitor(&self) -> &Arc<PerformanceMonitor> {
        &self.monitor
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Reconnect lazily outside the cooldown window; the cooldown check
    /// inside [`RemoteStore::connect`] keeps this cheap when throttled.
    async fn ensure_connection(&self) -> bool {
        if self.remote.is_connected() {
            return true;
        }
        self.connect().await
    }

    /// Note a lost connection observed mid-operation.
    fn observe_disconnect(&self, was_connected: bool) {
        if was_connected && !self.remote.is_connected() {
            self.events
                .emit(crate::events::CacheEvent::new(CacheEventKind::Disconnected, None));
        }
    }

    /// Store with per-write options; the plain `set` uses the defaults.
    pub async fn set_with(
        &self,
        key: &str,
        value: CacheValue,
        ttl: Option<Duration>,
        options: SetOptions,
    ) {
        let started = Instant::now();
        let effective_ttl = ttl.unwrap_or(self.config.default_ttl);

        let mut payload_len = 0usize;
        if self.ensure_connection().await {
            match self.codec.encode(&value, options.force_compression) {
                Ok((payload, stats)) => {
                    payload_len = payload.len();
                    if stats.format == PayloadFormat::Compressed {
                        self.monitor.record_compression(&stats);
                    }

                    // Jitter only widens remote expiry; L1 stays exact.
                    let remote_ttl = self.config.ttl_with_jitter(effective_ttl);
                    let was_connected = true;
                    if let Err(e) = self.remote.set(key, &payload, remote_ttl).await {
                        warn!(key, error = %e, "remote set failed, keeping L1 copy");
                        self.observe_disconnect(was_connected);
                    }
                }
                Err(e) => {
                    warn!(key, error = %e, "payload encoding failed, storing in L1 only");
                }
            }
        }

        if options.promote_l1 || !self.remote.is_connected() {
            self.l1.set(key, value, Some(effective_ttl)).await;
        } else {
            // Large-tier writes skip L1; drop any stale copy so the next
            // read sees the remote value.
            self.l1.delete(key).await;
        }

        self.monitor.record_set(started.elapsed(), payload_len);
        self.events.emit_key(CacheEventKind::SetSuccess, key);

        let stats = self.l1.stats().await;
        self.monitor.observe_memory(stats.utilization_pct);
    }

    /// Remove all keys matching a glob-style pattern from both tiers.
    ///
    /// `audit` names the triggering context and is written to the log with
    /// the removal count. Returns how many keys were removed.
    pub async fn invalidate_pattern(&self, pattern: &str, audit: &str) -> Result<usize> {
        let matcher = glob::Pattern::new(pattern).map_err(|e| {
            crate::error::CacheError::validation("pattern", format!("invalid glob: {}", e))
        })?;

        let mut removed = 0usize;

        for key in self.l1.keys().await {
            if matcher.matches(&key) && self.l1.delete(&key).await {
                removed += 1;
            }
        }

        if self.ensure_connection().await {
            let was_connected = true;
            match self.remote.scan_match(pattern).await {
                Ok(keys) => {
                    for key in keys {
                        match self.remote.del(&key).await {
                            Ok(true) => removed += 1,
                            Ok(false) => {}
                            Err(e) => {
                                warn!(key, error = %e, "remote delete failed during invalidation");
                                self.observe_disconnect(was_connected);
                                break;
                            }
                        }
                    }
                }
                Err(e) => {
                    warn!(pattern, error = %e, "remote scan failed during invalidation");
                    self.observe_disconnect(was_connected);
                }
            }
        }

        self.monitor.record_invalidation(removed);
        info!(pattern, audit, removed, "pattern invalidation completed");
        Ok(removed)
    }

    /// Point-in-time operational snapshot.
    pub async fn status(&self) -> CacheStatus {
        let connection_state = self.remote.state();
        CacheStatus {
            connection_state,
            degraded: connection_state != ConnectionState::Connected,
            l1: self.l1.stats().await,
            performance: self.monitor.report(),
            security: self.remote.security_report(self.config.security.as_ref()),
        }
    }

    /// Direct access to the L1 tier for diagnostics.
    pub fn l1(&self) -> &MemoryCache {
        &self.l1
    }
}

#[async_trait]
impl CacheStore for NetworkedCache {
    async fn get(&self, key: &str) -> Option<CacheValue> {
        let started = Instant::now();

        // Fast path: no network call on an L1 hit.
        if let Some(value) = self.l1.get(key).await {
            self.monitor.record_get(started.elapsed(), true);
            self.events.emit_key(CacheEventKind::GetHit, key);
            return Some(value);
        }

        if self.ensure_connection().await {
            let was_connected = true;
            match self.remote.get_with_ttl(key).await {
                Ok((Some(payload), pttl_ms)) => match self.codec.decode(&payload) {
                    Ok(value) => {
                        // Promote with the remaining remote TTL so the L1
                        // copy never outlives the expiry the writer set.
                        if let Some(remaining) = promotion_ttl(pttl_ms) {
                            debug!(key, pttl_ms, "remote hit, promoting to L1");
                            self.l1.set(key, value.clone(), Some(remaining)).await;
                            self.monitor.record_get(started.elapsed(), true);
                            self.events.emit_key(CacheEventKind::GetHit, key);
                            return Some(value);
                        }
                        // Expired between the GET and the PTTL: a miss.
                    }
                    Err(e) => {
                        // Corrupted payload reads as a miss.
                        warn!(key, error = %e, "undecodable remote payload, treating as miss");
                    }
                },
                Ok((None, _)) => {}
                Err(e) => {
                    debug!(key, error = %e, "remote get failed, degraded to L1-only");
                    self.observe_disconnect(was_connected);
                }
            }
        }

        self.monitor.record_get(started.elapsed(), false);
        self.events.emit_key(CacheEventKind::GetMiss, key);
        None
    }

    async fn set(&self, key: &str, value: CacheValue, ttl: Option<Duration>) {
        self.set_with(key, value, ttl, SetOptions::default()).await;
    }

    async fn delete(&self, key: &str) -> bool {
        let started = Instant::now();

        let existed_l1 = self.l1.delete(key).await;
        let existed_l2 = if self.ensure_connection().await {
            let was_connected = true;
            match self.remote.del(key).await {
                Ok(existed) => existed,
                Err(e) => {
                    debug!(key, error = %e, "remote delete failed");
                    self.observe_disconnect(was_connected);
                    false
                }
            }
        } else {
            false
        };

        let existed = existed_l1 || existed_l2;
        self.monitor.record_delete(started.elapsed());
        if existed {
            self.events.emit_key(CacheEventKind::DeleteSuccess, key);
        }
        existed
    }

    async fn exists(&self, key: &str) -> bool {
        // Short-circuit on an L1 hit.
        if self.l1.exists(key).await {
            return true;
        }

        if self.ensure_connection().await {
            let was_connected = true;
            match self.remote.exists(key).await {
                Ok(exists) => return exists,
                Err(e) => {
                    debug!(key, error = %e, "remote exists failed");
                    self.observe_disconnect(was_connected);
                }
            }
        }
        false
    }
}

/// Map a PTTL answer to the TTL an L1 promotion gets.
///
/// A positive remainder carries over as-is, `-1` (no expiry on the remote
/// entry) pins the L1 copy, and anything else (`-2` missing, or a zero
/// remainder) suppresses the promotion entirely.
fn promotion_ttl(pttl_ms: i64) -> Option<Duration> {
    match pttl_ms {
        ms if ms > 0 => Some(Duration::from_millis(ms as u64)),
        -1 => Some(Duration::ZERO),
        _ => None,
    }
}

impl std::fmt::Debug for NetworkedCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetworkedCache")
            .field("connection_state", &self.remote.state())
            .field("l1_max_entries", &self.config.l1_max_entries)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::CacheEventKind;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Remote endpoint that never answers: reserved TEST-NET address.
    fn degraded_cache() -> NetworkedCache {
        let config = CacheConfig {
            connection_string: "redis://192.0.2.1:6379".to_string(),
            connect_timeout: Duration::from_millis(50),
            operation_timeout: Duration::from_millis(50),
            reconnect_cooldown: Duration::from_secs(60),
            default_ttl: Duration::from_secs(60),
            ..Default::default()
        };
        NetworkedCache::new(config).unwrap()
    }

    #[tokio::test]
    async fn test_degraded_mode_serves_from_l1() {
        let cache = degraded_cache();
        assert!(!cache.connect().await);

        cache.set("key1", json!({"answer": 42}), None).await;
        assert_eq!(cache.get("key1").await, Some(json!({"answer": 42})));
        assert!(cache.exists("key1").await);
        assert!(cache.delete("key1").await);
        assert!(!cache.exists("key1").await);
    }

    #[tokio::test]
    async fn test_degraded_mode_miss_is_silent() {
        let cache = degraded_cache();
        assert_eq!(cache.get("never-set").await, None);
        assert!(!cache.delete("never-set").await);
        assert!(!cache.exists("never-set").await);
    }

    #[tokio::test]
    async fn test_read_your_own_writes() {
        let cache = degraded_cache();
        cache.set("k", json!("v1"), None).await;
        assert_eq!(cache.get("k").await, Some(json!("v1")));

        cache.set("k", json!("v2"), None).await;
        assert_eq!(cache.get("k").await, Some(json!("v2")));
    }

    #[tokio::test]
    async fn test_ttl_expiry_in_degraded_mode() {
        let cache = degraded_cache();
        cache
            .set("short", json!("v"), Some(Duration::from_millis(50)))
            .await;
        assert!(cache.get("short").await.is_some());

        tokio::time::sleep(Duration::from_millis(80)).await;
        assert_eq!(cache.get("short").await, None);
    }

    #[tokio::test]
    async fn test_events_fire_on_hit_and_miss() {
        let cache = degraded_cache();
        let hits = Arc::new(AtomicUsize::new(0));
        let misses = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&hits);
        cache.events().subscribe(CacheEventKind::GetHit, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        let counter = Arc::clone(&misses);
        cache.events().subscribe(CacheEventKind::GetMiss, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        cache.set("k", json!(1), None).await;
        cache.get("k").await;
        cache.get("absent").await;

        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(misses.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_monitor_records_operations() {
        let cache = degraded_cache();

        cache.set("k", json!(1), None).await;
        cache.get("k").await;
        cache.get("absent").await;
        cache.delete("k").await;

        let report = cache.monitor().report();
        assert_eq!(report.gets, 2);
        assert_eq!(report.sets, 1);
        assert_eq!(report.deletes, 1);
        assert!((report.hit_ratio - 0.5).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_skip_l1_promotion_on_write() {
        let cache = degraded_cache();

        // Disconnected: the value must land in L1 regardless, or degraded
        // mode would lose writes entirely.
        cache
            .set_with(
                "large",
                json!("x"),
                None,
                SetOptions {
                    promote_l1: false,
                    force_compression: true,
                },
            )
            .await;
        assert!(cache.exists("large").await);
    }

    #[test]
    fn test_promotion_keeps_remaining_ttl() {
        // A remote entry near its expiry is promoted with the remainder,
        // never with the (much longer) instance default.
        assert_eq!(promotion_ttl(750), Some(Duration::from_millis(750)));

        // No expiry on the remote entry pins the L1 copy.
        assert_eq!(promotion_ttl(-1), Some(Duration::ZERO));

        // Gone or zero remainder: do not resurrect the entry in L1.
        assert_eq!(promotion_ttl(0), None);
        assert_eq!(promotion_ttl(-2), None);
    }

    #[tokio::test]
    async fn test_invalidate_pattern_on_l1() {
        let cache = degraded_cache();

        cache.set("ai_cache:summarize:a", json!(1), None).await;
        cache.set("ai_cache:summarize:b", json!(2), None).await;
        cache.set("ai_cache:translate:c", json!(3), None).await;

        let removed = cache
            .invalidate_pattern("ai_cache:summarize:*", "model-rollout")
            .await
            .unwrap();

        assert_eq!(removed, 2);
        assert!(!cache.exists("ai_cache:summarize:a").await);
        assert!(cache.exists("ai_cache:translate:c").await);
    }

    #[tokio::test]
    async fn test_invalidate_rejects_bad_pattern() {
        let cache = degraded_cache();
        assert!(cache.invalidate_pattern("[unclosed", "test").await.is_err());
    }

    #[tokio::test]
    async fn test_status_reports_degraded() {
        let cache = degraded_cache();
        cache.connect().await;
        cache.set("k", json!(1), None).await;

        let status = cache.status().await;
        assert!(status.degraded);
        assert_eq!(status.connection_state, ConnectionState::Disconnected);
        assert_eq!(status.l1.entries, 1);
    }
}
