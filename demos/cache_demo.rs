//! End-to-end demo: build an AI-optimized cache, store a response and
//! read it back, then print the operational snapshot.
//!
//! Run with a local Redis for the full two-tier path; without one the
//! factory falls back to a memory-only cache and everything still works.
//!
//! ```bash
//! RUST_LOG=aicache=debug cargo run --example cache_demo
//! ```

use aicache::{CacheBackend, CacheFactory};
use serde_json::{json, Map};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("aicache=info")),
        )
        .init();

    let cache = CacheFactory::for_ai_workloads().await?;
    let responses = cache.as_response().expect("AI profile builds a response cache");

    let mut options = Map::new();
    options.insert("max_length".to_string(), json!(100));

    let key = responses
        .cache_response(
            "The quick brown fox jumps over the lazy dog.",
            "summarize",
            &options,
            json!({"summary": "A fox jumps over a dog."}),
        )
        .await?;
    println!("stored under key: {}", key);

    match responses
        .get_cached_response(
            "The quick brown fox jumps over the lazy dog.",
            "summarize",
            &options,
        )
        .await?
    {
        Some(hit) => {
            println!("cache hit: {}", hit["response"]);
            println!("retrieved at: {}", hit["retrieved_at"]);
        }
        None => println!("cache miss"),
    }

    match cache.backend() {
        CacheBackend::Networked(networked) => {
            let status = networked.status().await;
            println!(
                "mode: two-tier ({}), L1 entries: {}, hit ratio: {:.0}%",
                status.connection_state.as_str(),
                status.l1.entries,
                status.performance.hit_ratio * 100.0
            );
        }
        CacheBackend::Memory(memory) => {
            let stats = memory.stats().await;
            println!(
                "mode: memory-only fallback, entries: {}, hit rate: {:.0}%",
                stats.entries,
                stats.hit_rate()
            );
        }
    }

    Ok(())
}
