//! The minimal async contract all cache implementations satisfy
//!
//! A cache miss is a valid, silent result: `get` returns `None`, `delete`
//! reports prior existence, and no ordinary operation surfaces an error to
//! the caller. Implementations swallow and log internal failures, returning
//! the documented absent/no-op result instead.

use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

/// Cache value type - arbitrary JSON-representable payloads
pub type CacheValue = Value;

/// Minimal asynchronous cache contract.
///
/// `ttl` semantics on `set`: `None` uses the instance default,
/// `Some(Duration::ZERO)` disables expiration for that entry.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Return the stored value if present and not expired.
    async fn get(&self, key: &str) -> Option<CacheValue>;

    /// Store a value under `key` with an optional explicit TTL.
    async fn set(&self, key: &str, value: CacheValue, ttl: Option<Duration>);

    /// Remove `key`, reporting whether it previously existed. Idempotent.
    async fn delete(&self, key: &str) -> bool;

    /// Expiration-aware existence check without cloning the value.
    async fn exists(&self, key: &str) -> bool;
}
