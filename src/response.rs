//! AI-response cache specialization
//!
//! Wraps a cache backend with key derivation, input-size tiering and
//! per-operation TTL policy. Stored payloads are envelopes carrying the
//! response plus metadata (timestamp, schema version, tier, operation);
//! retrieval enriches a copy with hit metadata without mutating the
//! stored entry.

use crate::config::{OperationPolicy, ResponseConfig, TierThresholds};
use crate::error::{CacheError, Result};
use crate::factory::CacheBackend;
use crate::key::KeyGenerator;
use crate::network::SetOptions;
use crate::store::{CacheStore, CacheValue};
use chrono::Utc;
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Envelope format version written with every cached response
const SCHEMA_VERSION: u32 = 1;

/// Bound on the rolling recent-operation sample ring
const RECENT_SAMPLE_LIMIT: usize = 100;

/// Input-size classification bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TierLabel {
    Small,
    Medium,
    Large,
    ExtraLarge,
}

impl TierLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            TierLabel::Small => "small",
            TierLabel::Medium => "medium",
            TierLabel::Large => "large",
            TierLabel::ExtraLarge => "extra-large",
        }
    }

    /// Larger tiers skip L1 residency and compress aggressively.
    fn set_options(&self) -> SetOptions {
        match self {
            TierLabel::Small | TierLabel::Medium => SetOptions::default(),
            TierLabel::Large | TierLabel::ExtraLarge => SetOptions {
                promote_l1: false,
                force_compression: true,
            },
        }
    }
}

/// Classify an input length into its tier.
///
/// Inconsistent thresholds (which validation normally rules out) fall back
/// to the medium tier rather than failing the operation.
pub fn classify_tier(length: usize, thresholds: &TierThresholds) -> TierLabel {
    if thresholds.validate().is_err() {
        warn!(length, "inconsistent tier thresholds, defaulting to medium");
        return TierLabel::Medium;
    }

    if length <= thresholds.small_max {
        TierLabel::Small
    } else if length <= thresholds.medium_max {
        TierLabel::Medium
    } else if length <= thresholds.large_max {
        TierLabel::Large
    } else {
        TierLabel::ExtraLarge
    }
}

/// Per-operation hit/miss/set counters
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct OperationCounters {
    pub hits: u64,
    pub misses: u64,
    pub sets: u64,
}

/// One entry in the rolling recent-operation ring
#[derive(Debug, Clone)]
struct RecentSample {
    operation: String,
    tier: Option<TierLabel>,
    hit: Option<bool>,
    duration: Duration,
}

#[derive(Debug, Default)]
struct ResponseState {
    operations: HashMap<String, OperationCounters>,
    tier_distribution: HashMap<TierLabel, u64>,
    recent: VecDeque<RecentSample>,
}

impl ResponseState {
    fn push_recent(&mut self, sample: RecentSample) {
        self.recent.push_back(sample);
        while self.recent.len() > RECENT_SAMPLE_LIMIT {
            self.recent.pop_front();
        }
    }
}

/// One recent operation as surfaced in [`ResponseCacheStats`]
#[derive(Debug, Clone, Serialize)]
pub struct RecentSampleView {
    pub operation: String,
    /// Tier label for writes, absent for reads
    pub tier: Option<&'static str>,
    /// Hit outcome for reads, absent for writes
    pub hit: Option<bool>,
    pub duration_ms: f64,
}

/// Aggregated view over the response-cache counters
#[derive(Debug, Clone, Serialize)]
pub struct ResponseCacheStats {
    pub operations: HashMap<String, OperationCounters>,
    pub tier_distribution: HashMap<String, u64>,
    /// Most recent operations, oldest first
    pub recent: Vec<RecentSampleView>,
}

/// Response cache over a generic backend.
///
/// Composition, not inheritance: storage calls are delegated to the
/// backend, which is either a networked two-tier cache or a memory-only
/// fallback with identical call semantics.
pub struct ResponseCache {
    backend: CacheBackend,
    keys: KeyGenerator,
    tiers: TierThresholds,
    policy: OperationPolicy,
    default_ttl: Duration,
    state: Mutex<ResponseState>,
}

impl ResponseCache {
    pub fn new(backend: CacheBackend, config: &ResponseConfig) -> Self {
        Self {
            backend,
            keys: KeyGenerator::new(config.base.hashing_threshold),
            tiers: config.tiers,
            policy: config.operations.clone(),
            default_ttl: config.base.default_ttl,
            state: Mutex::new(ResponseState::default()),
        }
    }

    /// The storage backend, for status and event access.
    pub fn backend(&self) -> &CacheBackend {
        &self.backend
    }

    /// Derive the cache key for a request without touching storage.
    pub fn key_for(
        &self,
        text: &str,
        operation: &str,
        options: &Map<String, Value>,
    ) -> Result<String> {
        let started = Instant::now();
        let key = self.keys.generate(text, operation, options, None)?;
        if let Some(monitor) = self.backend.monitor() {
            monitor.record_keygen(started.elapsed(), text.len());
        }
        Ok(key)
    }

    /// Cache one AI response under a derived key.
    ///
    /// The stored payload is an envelope with the response, a timestamp,
    /// the schema version and the tier label. TTL comes from the operation
    /// policy, falling back to the global default. Returns the key.
    pub async fn cache_response(
        &self,
        text: &str,
        operation: &str,
        options: &Map<String, Value>,
        response: CacheValue,
    ) -> Result<String> {
        if text.is_empty() {
            return Err(CacheError::validation("text", "must be non-empty"));
        }
        if operation.trim().is_empty() {
            return Err(CacheError::validation("operation", "must be non-empty"));
        }
        if response.is_null() {
            return Err(CacheError::validation("response", "must not be null"));
        }

        let started = Instant::now();
        let key = self.key_for(text, operation, options)?;
        let tier = classify_tier(text.chars().count(), &self.tiers);

        let envelope = json!({
            "response": response,
            "cached_at": Utc::now().to_rfc3339(),
            "schema_version": SCHEMA_VERSION,
            "tier": tier.as_str(),
            "operation": operation,
        });

        let ttl = self.policy.resolve(operation, self.default_ttl);
        self.backend
            .set_with(&key, envelope, Some(ttl), tier.set_options())
            .await;

        debug!(operation, tier = tier.as_str(), ttl_secs = ttl.as_secs(), "response cached");

        if let Ok(mut state) = self.state.lock() {
            state.operations.entry(operation.to_string()).or_default().sets += 1;
            *state.tier_distribution.entry(tier).or_insert(0) += 1;
            state.push_recent(RecentSample {
                operation: operation.to_string(),
                tier: Some(tier),
                hit: None,
                duration: started.elapsed(),
            });
        }

        Ok(key)
    }

    /// Look up a cached response for the same request arguments.
    ///
    /// On hit the returned envelope copy is enriched with `cache_hit` and
    /// `retrieved_at`; the stored entry is not mutated. On miss returns
    /// `Ok(None)`.
    pub async fn get_cached_response(
        &self,
        text: &str,
        operation: &str,
        options: &Map<String, Value>,
    ) -> Result<Option<CacheValue>> {
        let started = Instant::now();
        let key = self.key_for(text, operation, options)?;

        let result = self.backend.get(&key).await.map(|mut envelope| {
            if let Some(fields) = envelope.as_object_mut() {
                fields.insert("cache_hit".to_string(), json!(true));
                fields.insert("retrieved_at".to_string(), json!(Utc::now().to_rfc3339()));
            }
            envelope
        });

        if let Ok(mut state) = self.state.lock() {
            let counters = state.operations.entry(operation.to_string()).or_default();
            let hit = result.is_some();
            if hit {
                counters.hits += 1;
            } else {
                counters.misses += 1;
            }
            state.push_recent(RecentSample {
                operation: operation.to_string(),
                tier: None,
                hit: Some(hit),
                duration: started.elapsed(),
            });
        }

        Ok(result)
    }

    /// Remove a cached response, reporting whether it existed.
    pub async fn invalidate_response(
        &self,
        text: &str,
        operation: &str,
        options: &Map<String, Value>,
    ) -> Result<bool> {
        let key = self.key_for(text, operation, options)?;
        Ok(self.backend.delete(&key).await)
    }

    /// Aggregated counter snapshot.
    pub fn stats(&self) -> ResponseCacheStats {
        let state = match self.state.lock() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        };

        ResponseCacheStats {
            operations: state.operations.clone(),
            tier_distribution: state
                .tier_distribution
                .iter()
                .map(|(tier, count)| (tier.as_str().to_string(), *count))
                .collect(),
            recent: state
                .recent
                .iter()
                .map(|sample| RecentSampleView {
                    operation: sample.operation.clone(),
                    tier: sample.tier.map(|tier| tier.as_str()),
                    hit: sample.hit,
                    duration_ms: sample.duration.as_secs_f64() * 1_000.0,
                })
                .collect(),
        }
    }
}

impl std::fmt::Debug for ResponseCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseCache")
            .field("tiers", &self.tiers)
            .field("default_ttl", &self.default_ttl)
            .finish()
    }
}
