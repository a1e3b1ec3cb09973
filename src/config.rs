//! Configuration for the cache system
//!
//! The configuration object is the only contract the surrounding application
//! has to satisfy to construct a cache: connection string, TTLs, size
//! thresholds and the deployment profile presets live here. All fields are
//! validated by [`CacheConfig::validate`] before the factory performs any I/O.

use crate::error::{CacheError, Result};
use crate::monitor::MonitorConfig;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::time::Duration;

/// Input-size boundaries for response tiering, in characters.
///
/// Inputs at or below `small_max` are "small", at or below `medium_max`
/// "medium", at or below `large_max` "large", anything bigger "extra-large".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierThresholds {
    pub small_max: usize,
    pub medium_max: usize,
    pub large_max: usize,
}

impl Default for TierThresholds {
    fn default() -> Self {
        Self {
            small_max: 1_000,
            medium_max: 10_000,
            large_max: 100_000,
        }
    }
}

impl TierThresholds {
    /// Thresholds must be strictly ascending for classification to be total.
    pub fn validate(&self) -> Result<()> {
        if self.small_max == 0 {
            return Err(CacheError::validation(
                "tier_thresholds.small_max",
                "must be greater than 0",
            ));
        }
        if self.small_max >= self.medium_max || self.medium_max >= self.large_max {
            return Err(CacheError::validation(
                "tier_thresholds",
                "boundaries must be strictly ascending (small < medium < large)",
            ));
        }
        Ok(())
    }
}

/// Per-operation time-to-live policy, consulted at write time.
///
/// Unknown operations fall back to the global default TTL.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OperationPolicy {
    ttls: HashMap<String, Duration>,
}

impl OperationPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a policy from (operation, ttl) pairs.
    pub fn from_pairs(pairs: impl IntoIterator<Item = (String, Duration)>) -> Self {
        Self {
            ttls: pairs.into_iter().collect(),
        }
    }

    /// Set the TTL for a logical operation name.
    pub fn set(&mut self, operation: impl Into<String>, ttl: Duration) {
        self.ttls.insert(operation.into(), ttl);
    }

    /// Resolve the TTL for an operation, falling back to `default_ttl`.
    pub fn resolve(&self, operation: &str, default_ttl: Duration) -> Duration {
        self.ttls.get(operation).copied().unwrap_or(default_ttl)
    }

    /// Number of operations with an explicit TTL.
    pub fn len(&self) -> usize {
        self.ttls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ttls.is_empty()
    }

    /// Stable rendering for fingerprinting (sorted by operation name).
    fn canonical(&self) -> String {
        let mut pairs: Vec<(&String, &Duration)> = self.ttls.iter().collect();
        pairs.sort_by(|a, b| a.0.cmp(b.0));
        pairs
            .iter()
            .map(|(op, ttl)| format!("{}={}", op, ttl.as_secs()))
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// Optional security expectations for the remote connection.
///
/// Absence of this configuration is a valid, logged state, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityConfig {
    /// Require a TLS (`rediss://`) connection string
    pub require_tls: bool,
    /// Require credentials embedded in the connection string
    pub require_auth: bool,
}

/// Configuration for a networked two-tier cache
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Remote store connection string (e.g. "redis://127.0.0.1:6379")
    pub connection_string: String,

    /// Default time-to-live for cache entries
    pub default_ttl: Duration,

    /// TTL jitter factor (0.0 - 1.0) applied to remote-tier writes
    /// to prevent synchronized expiry (cache stampede)
    pub ttl_jitter: f64,

    /// Maximum number of entries in the in-process (L1) tier
    pub l1_max_entries: usize,

    /// Compact-JSON payloads at or under this size use the tagged JSON
    /// fast path; larger payloads use the raw/compressed byte path
    pub json_fast_path_limit: usize,

    /// Payloads above this size are compressed before storage
    pub compression_threshold: usize,

    /// LZ4 compression level
    pub compression_level: i32,

    /// Inputs at or above this length are content-hashed when deriving
    /// cache keys instead of being embedded literally
    pub hashing_threshold: usize,

    /// Timeout for establishing the remote connection
    pub connect_timeout: Duration,

    /// Timeout for individual remote-store round trips
    pub operation_timeout: Duration,

    /// Cooldown after a failed connection attempt during which further
    /// attempts are skipped and the cache operates L1-only
    pub reconnect_cooldown: Duration,

    /// When true, factory construction raises a structured infrastructure
    /// error if the remote store is unreachable instead of falling back
    /// to a memory-only cache
    pub fail_on_connection_error: bool,

    /// Optional security expectations for the remote connection
    pub security: Option<SecurityConfig>,

    /// Performance-monitor retention and alert thresholds
    pub monitor: MonitorConfig,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            connection_string: "redis://127.0.0.1:6379".to_string(),
            // 1 hour default TTL
            default_ttl: Duration::from_secs(3600),
            ttl_jitter: 0.0,
            l1_max_entries: 1_000,
            // 512 bytes of compact JSON
            json_fast_path_limit: 512,
            // 4 KiB
            compression_threshold: 4 * 1024,
            compression_level: 4,
            // 1,000 characters
            hashing_threshold: 1_000,
            connect_timeout: Duration::from_secs(2),
            operation_timeout: Duration::from_secs(1),
            reconnect_cooldown: Duration::from_secs(30),
            fail_on_connection_error: false,
            security: None,
            monitor: MonitorConfig::default(),
        }
    }
}

impl CacheConfig {
    /// Create a new builder for cache configuration
    pub fn builder() -> CacheConfigBuilder {
        CacheConfigBuilder::default()
    }

    /// Validate the configuration. Called by the factory before any I/O.
    pub fn validate(&self) -> Result<()> {
        if !self.connection_string.starts_with("redis://")
            && !self.connection_string.starts_with("rediss://")
        {
            return Err(CacheError::validation(
                "connection_string",
                "must start with redis:// or rediss://",
            ));
        }

        if self.default_ttl > Duration::from_secs(365 * 24 * 3600) {
            return Err(CacheError::validation(
                "default_ttl",
                "must not exceed one year",
            ));
        }

        if !(0.0..=1.0).contains(&self.ttl_jitter) {
            return Err(CacheError::validation(
                "ttl_jitter",
                "must be between 0.0 and 1.0",
            ));
        }

        if self.l1_max_entries == 0 {
            return Err(CacheError::validation(
                "l1_max_entries",
                "must be greater than 0",
            ));
        }

        if self.json_fast_path_limit > self.compression_threshold {
            return Err(CacheError::validation(
                "json_fast_path_limit",
                "must not exceed compression_threshold",
            ));
        }

        if self.hashing_threshold == 0 {
            return Err(CacheError::validation(
                "hashing_threshold",
                "must be greater than 0",
            ));
        }

        if self.connect_timeout.is_zero() || self.operation_timeout.is_zero() {
            return Err(CacheError::validation(
                "timeouts",
                "connect_timeout and operation_timeout must be non-zero",
            ));
        }

        self.monitor.validate()
    }

    /// Calculate an effective TTL with jitter applied.
    ///
    /// Jitter only widens remote-tier expiry (it adds up to
    /// `ttl * ttl_jitter`, never subtracts), so a jittered entry is never
    /// seen expiring before the TTL the writer set. A zero factor returns
    /// the TTL unchanged.
    pub fn ttl_with_jitter(&self, ttl: Duration) -> Duration {
        if self.ttl_jitter == 0.0 || ttl.is_zero() {
            return ttl;
        }

        let base_secs = ttl.as_secs_f64();
        let jitter = rand::random::<f64>() * base_secs * self.ttl_jitter;

        Duration::from_secs_f64(base_secs + jitter)
    }

    /// Stable fingerprint of the full configuration.
    ///
    /// Used as the process-wide registry key: two configurations share a
    /// cache instance only when every behavior-affecting field matches.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.connection_string.as_bytes());
        hasher.update(self.default_ttl.as_millis().to_le_bytes());
        hasher.update(self.ttl_jitter.to_le_bytes());
        hasher.update(self.l1_max_entries.to_le_bytes());
        hasher.update(self.json_fast_path_limit.to_le_bytes());
        hasher.update(self.compression_threshold.to_le_bytes());
        hasher.update(self.compression_level.to_le_bytes());
        hasher.update(self.hashing_threshold.to_le_bytes());
        hasher.update(self.connect_timeout.as_millis().to_le_bytes());
        hasher.update(self.operation_timeout.as_millis().to_le_bytes());
        hasher.update(self.reconnect_cooldown.as_millis().to_le_bytes());
        hasher.update([self.fail_on_connection_error as u8]);
        match self.security {
            Some(security) => {
                hasher.update([1u8, security.require_tls as u8, security.require_auth as u8])
            }
            None => hasher.update([0u8; 3]),
        }
        // MonitorConfig is a plain struct, so its JSON rendering is stable.
        if let Ok(monitor) = serde_json::to_vec(&self.monitor) {
            hasher.update(&monitor);
        }
        let digest = hasher.finalize();
        hex_prefix(digest.as_slice(), 16)
    }
}

/// Preset configurations for common deployment profiles
impl CacheConfig {
    /// Balanced profile for web applications: moderate TTL, jitter against
    /// synchronized expiry, mid-sized L1.
    pub fn web_app() -> Self {
        Self {
            default_ttl: Duration::from_secs(1800), // 30 minutes
            ttl_jitter: 0.1,
            l1_max_entries: 5_000,
            ..Default::default()
        }
    }

    /// Profile tuned for AI response payloads: long TTL (generations are
    /// expensive), aggressive compression, large L1.
    pub fn ai_optimized() -> Self {
        Self {
            default_ttl: Duration::from_secs(24 * 3600), // 24 hours
            ttl_jitter: 0.1,
            l1_max_entries: 10_000,
            compression_threshold: 2 * 1024,
            ..Default::default()
        }
    }

    /// Ephemeral profile for tests: short exact TTLs, tiny L1, fast
    /// timeouts and no reconnect cooldown to keep test runs snappy.
    pub fn ephemeral() -> Self {
        Self {
            default_ttl: Duration::from_secs(60),
            ttl_jitter: 0.0,
            l1_max_entries: 100,
            connect_timeout: Duration::from_millis(200),
            operation_timeout: Duration::from_millis(200),
            reconnect_cooldown: Duration::from_millis(50),
            ..Default::default()
        }
    }
}

/// Builder for cache configuration
#[derive(Debug, Default)]
pub struct CacheConfigBuilder {
    connection_string: Option<String>,
    default_ttl: Option<Duration>,
    ttl_jitter: Option<f64>,
    l1_max_entries: Option<usize>,
    json_fast_path_limit: Option<usize>,
    compression_threshold: Option<usize>,
    compression_level: Option<i32>,
    hashing_threshold: Option<usize>,
    connect_timeout: Option<Duration>,
    operation_timeout: Option<Duration>,
    reconnect_cooldown: Option<Duration>,
    fail_on_connection_error: Option<bool>,
    security: Option<SecurityConfig>,
    monitor: Option<MonitorConfig>,
}

impl CacheConfigBuilder {
    pub fn connection_string(mut self, url: impl Into<String>) -> Self {
        self.connection_string = Some(url.into());
        self
    }

    pub fn default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = Some(ttl);
        self
    }

    pub fn ttl_jitter(mut self, jitter: f64) -> Self {
        self.ttl_jitter = Some(jitter);
        self
    }

    pub fn l1_max_entries(mut self, max: usize) -> Self {
        self.l1_max_entries = Some(max);
        self
    }

    pub fn json_fast_path_limit(mut self, bytes: usize) -> Self {
        self.json_fast_path_limit = Some(bytes);
        self
    }

    pub fn compression_threshold(mut self, bytes: usize) -> Self {
        self.compression_threshold = Some(bytes);
        self
    }

    pub fn compression_level(mut self, level: i32) -> Self {
        self.compression_level = Some(level);
        self
    }

    pub fn hashing_threshold(mut self, chars: usize) -> Self {
        self.hashing_threshold = Some(chars);
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    pub fn operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = Some(timeout);
        self
    }

    pub fn reconnect_cooldown(mut self, cooldown: Duration) -> Self {
        self.reconnect_cooldown = Some(cooldown);
        self
    }

    pub fn fail_on_connection_error(mut self, fail: bool) -> Self {
        self.fail_on_connection_error = Some(fail);
        self
    }

    pub fn security(mut self, security: SecurityConfig) -> Self {
        self.security = Some(security);
        self
    }

    pub fn monitor(mut self, monitor: MonitorConfig) -> Self {
        self.monitor = Some(monitor);
        self
    }

    /// Build the cache configuration, filling unset fields from defaults.
    pub fn build(self) -> CacheConfig {
        let defaults = CacheConfig::default();

        CacheConfig {
            connection_string: self
                .connection_string
                .unwrap_or(defaults.connection_string),
            default_ttl: self.default_ttl.unwrap_or(defaults.default_ttl),
            ttl_jitter: self.ttl_jitter.unwrap_or(defaults.ttl_jitter),
            l1_max_entries: self.l1_max_entries.unwrap_or(defaults.l1_max_entries),
            json_fast_path_limit: self
                .json_fast_path_limit
                .unwrap_or(defaults.json_fast_path_limit),
            compression_threshold: self
                .compression_threshold
                .unwrap_or(defaults.compression_threshold),
            compression_level: self
                .compression_level
                .unwrap_or(defaults.compression_level),
            hashing_threshold: self
                .hashing_threshold
                .unwrap_or(defaults.hashing_threshold),
            connect_timeout: self.connect_timeout.unwrap_or(defaults.connect_timeout),
            operation_timeout: self
                .operation_timeout
                .unwrap_or(defaults.operation_timeout),
            reconnect_cooldown: self
                .reconnect_cooldown
                .unwrap_or(defaults.reconnect_cooldown),
            fail_on_connection_error: self
                .fail_on_connection_error
                .unwrap_or(defaults.fail_on_connection_error),
            security: self.security.or(defaults.security),
            monitor: self.monitor.unwrap_or(defaults.monitor),
        }
    }
}

/// Configuration for the AI-response specialization
#[derive(Debug, Clone)]
pub struct ResponseConfig {
    /// Base two-tier cache configuration
    pub base: CacheConfig,

    /// Input-size tier boundaries
    pub tiers: TierThresholds,

    /// Per-operation TTL policy
    pub operations: OperationPolicy,
}

impl Default for ResponseConfig {
    fn default() -> Self {
        Self {
            base: CacheConfig::ai_optimized(),
            tiers: TierThresholds::default(),
            operations: OperationPolicy::default(),
        }
    }
}

impl ResponseConfig {
    pub fn validate(&self) -> Result<()> {
        self.base.validate()?;
        self.tiers.validate()
    }

    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.base.fingerprint().as_bytes());
        hasher.update(
            format!(
                "{}:{}:{}",
                self.tiers.small_max, self.tiers.medium_max, self.tiers.large_max
            )
            .as_bytes(),
        );
        hasher.update(self.operations.canonical().as_bytes());
        let digest = hasher.finalize();
        hex_prefix(digest.as_slice(), 16)
    }
}

/// Tagged cache construction request, decided once at the boundary.
///
/// The caller states explicitly whether a generic two-tier cache or the
/// AI-response specialization is wanted; the factory never infers the kind
/// from key presence in a loose map.
#[derive(Debug, Clone)]
pub enum CacheSpec {
    /// Generic two-tier cache
    Generic(CacheConfig),
    /// AI-response cache with tiering and operation TTL policy
    AiResponse(ResponseConfig),
}

impl CacheSpec {
    pub fn validate(&self) -> Result<()> {
        match self {
            CacheSpec::Generic(config) => config.validate(),
            CacheSpec::AiResponse(config) => config.validate(),
        }
    }

    /// Registry key: kind tag plus the inner configuration fingerprint.
    pub fn fingerprint(&self) -> String {
        match self {
            CacheSpec::Generic(config) => format!("generic:{}", config.fingerprint()),
            CacheSpec::AiResponse(config) => format!("response:{}", config.fingerprint()),
        }
    }
}

fn hex_prefix(digest: &[u8], bytes: usize) -> String {
    digest
        .iter()
        .take(bytes)
        .map(|b| format!("{:02x}", b))
        .collect()
}
