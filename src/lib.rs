//! # aicache
//!
//! A two-tier response cache for AI workloads: a fast in-process LRU+TTL
//! tier (L1) in front of a networked Redis tier (L2), with graceful
//! degradation to memory-only operation when the remote store is
//! unreachable.
//!
//! ## Features
//!
//! - Async-first design using tokio
//! - LRU+TTL in-process tier usable standalone
//! - Remote tier with connection state machine, timeouts and reconnect
//!   cooldown
//! - Deterministic key derivation with content hashing for large inputs
//! - Size-tagged payload format with LZ4 compression for large payloads
//! - AI-response specialization: input tiering, per-operation TTL policy,
//!   envelope metadata and hit enrichment
//! - Performance monitoring with bounded sample retention and
//!   threshold-based alerts
//! - Factory with deployment profiles and a process-wide instance registry
//!
//! ## Quick Start
//!
//! ```no_run
//! use aicache::{CacheFactory, CacheStore};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     // Falls back to a memory-only cache if Redis is unreachable.
//!     let cache = CacheFactory::for_web_app().await?;
//!
//!     let backend = cache.backend();
//!     backend.set("greeting", json!({"text": "hello"}), None).await;
//!     let value = backend.get("greeting").await;
//!     println!("cached: {:?}", value);
//!     Ok(())
//! }
//! ```
//!
//! ## Caching AI Responses
//!
//! ```no_run
//! use aicache::CacheFactory;
//! use serde_json::{json, Map};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let cache = CacheFactory::for_ai_workloads().await?;
//!     let responses = cache.as_response().expect("response cache");
//!
//!     let mut options = Map::new();
//!     options.insert("max_length".to_string(), json!(100));
//!
//!     responses
//!         .cache_response("Hello world", "summarize", &options, json!({"summary": "Hi"}))
//!         .await?;
//!
//!     if let Some(hit) = responses
//!         .get_cached_response("Hello world", "summarize", &options)
//!         .await?
//!     {
//!         println!("hit: {}", hit["response"]);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Sharing Instances Across Call Sites
//!
//! ```no_run
//! use aicache::{CacheConfig, CacheRegistry, CacheSpec};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     // Same configuration fingerprint, same instance.
//!     let spec = CacheSpec::Generic(CacheConfig::web_app());
//!     let a = CacheRegistry::get_or_build(spec.clone()).await?;
//!     let b = CacheRegistry::get_or_build(spec).await?;
//!     assert!(std::sync::Arc::ptr_eq(&a, &b));
//!     Ok(())
//! }
//! ```

pub mod codec;
pub mod compat;
pub mod config;
pub mod error;
pub mod events;
pub mod factory;
pub mod key;
pub mod memory;
pub mod monitor;
pub mod network;
pub mod remote;
pub mod response;
pub mod store;

pub use codec::{Codec, EncodeStats, PayloadFormat};
pub use compat::LegacyCacheFacade;
pub use config::{
    CacheConfig, CacheConfigBuilder, CacheSpec, OperationPolicy, ResponseConfig, SecurityConfig,
    TierThresholds,
};
pub use error::{CacheError, Result};
pub use events::{CacheEvent, CacheEventKind, EventBus};
pub use factory::{BuiltCache, CacheBackend, CacheFactory, CacheRegistry};
pub use key::KeyGenerator;
pub use memory::{MemoryCache, MemoryCacheStats};
pub use monitor::{
    Alert, AlertSeverity, MemoryTrend, MonitorConfig, PerfReport, PerformanceMonitor,
};
pub use network::{CacheStatus, NetworkedCache, SetOptions};
pub use remote::{ConnectionState, RemoteStore, SecurityReport};
pub use response::{
    classify_tier, OperationCounters, RecentSampleView, ResponseCache, ResponseCacheStats,
    TierLabel,
};
pub use store::{CacheStore, CacheValue};
