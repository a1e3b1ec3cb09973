//! Typed cache event notifications
//!
//! Callers subscribe to a closed set of event kinds instead of free-form
//! string names, so a typo in a subscription is a compile error rather than
//! a silently dead callback. Callback panics are caught and logged; they
//! never take down a cache operation.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, RwLock};
use tracing::warn;

/// The closed set of observable cache events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheEventKind {
    /// A get found a live entry (either tier)
    GetHit,
    /// A get found nothing
    GetMiss,
    /// A set completed
    SetSuccess,
    /// A delete removed an existing entry
    DeleteSuccess,
    /// The remote tier became reachable
    Connected,
    /// The remote tier was lost; operating L1-only
    Disconnected,
}

impl CacheEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheEventKind::GetHit => "get_hit",
            CacheEventKind::GetMiss => "get_miss",
            CacheEventKind::SetSuccess => "set_success",
            CacheEventKind::DeleteSuccess => "delete_success",
            CacheEventKind::Connected => "connected",
            CacheEventKind::Disconnected => "disconnected",
        }
    }
}

/// A single cache event delivered to subscribers
#[derive(Debug, Clone)]
pub struct CacheEvent {
    pub kind: CacheEventKind,
    /// Cache key involved, when the event concerns one
    pub key: Option<String>,
    pub at: DateTime<Utc>,
}

impl CacheEvent {
    pub fn new(kind: CacheEventKind, key: Option<String>) -> Self {
        Self {
            kind,
            key,
            at: Utc::now(),
        }
    }
}

type Callback = Arc<dyn Fn(&CacheEvent) + Send + Sync>;

/// Subscription registry and dispatch for cache events.
///
/// Dispatch is synchronous and in-order per kind. A panicking callback is
/// logged and skipped; remaining callbacks still run.
#[derive(Default)]
pub struct EventBus {
    subscribers: RwLock<HashMap<CacheEventKind, Vec<Callback>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe a callback to one event kind.
    pub fn subscribe<F>(&self, kind: CacheEventKind, callback: F)
    where
        F: Fn(&CacheEvent) + Send + Sync + 'static,
    {
        if let Ok(mut subscribers) = self.subscribers.write() {
            subscribers.entry(kind).or_default().push(Arc::new(callback));
        }
    }

    /// Number of callbacks registered for a kind.
    pub fn subscriber_count(&self, kind: CacheEventKind) -> usize {
        self.subscribers
            .read()
            .map(|s| s.get(&kind).map_or(0, |v| v.len()))
            .unwrap_or(0)
    }

    /// Dispatch an event to all subscribers of its kind.
    pub fn emit(&self, event: CacheEvent) {
        let callbacks: Vec<Callback> = match self.subscribers.read() {
            Ok(subscribers) => subscribers
                .get(&event.kind)
                .map(|v| v.to_vec())
                .unwrap_or_default(),
            Err(_) => return,
        };

        for callback in callbacks {
            if catch_unwind(AssertUnwindSafe(|| callback(&event))).is_err() {
                warn!(
                    event = event.kind.as_str(),
                    key = event.key.as_deref().unwrap_or(""),
                    "event callback panicked"
                );
            }
        }
    }

    /// Convenience emit for key-scoped events.
    pub fn emit_key(&self, kind: CacheEventKind, key: &str) {
        self.emit(CacheEvent::new(kind, Some(key.to_string())));
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let counts: Vec<(CacheEventKind, usize)> = self
            .subscribers
            .read()
            .map(|s| s.iter().map(|(k, v)| (*k, v.len())).collect())
            .unwrap_or_default();
        f.debug_struct("EventBus").field("subscribers", &counts).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_subscribe_and_emit() {
        let bus = EventBus::new();
        let hits = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&hits);
        bus.subscribe(CacheEventKind::GetHit, move |event| {
            assert_eq!(event.key.as_deref(), Some("k1"));
            counter.fetch_add(1, Ordering::SeqCst);
        });

        bus.emit_key(CacheEventKind::GetHit, "k1");
        bus.emit_key(CacheEventKind::GetHit, "k1");
        // Different kind, no delivery.
        bus.emit_key(CacheEventKind::GetMiss, "k1");

        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_panicking_callback_does_not_stop_dispatch() {
        let bus = EventBus::new();
        let delivered = Arc::new(AtomicUsize::new(0));

        bus.subscribe(CacheEventKind::SetSuccess, |_| {
            panic!("listener bug");
        });
        let counter = Arc::clone(&delivered);
        bus.subscribe(CacheEventKind::SetSuccess, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        bus.emit_key(CacheEventKind::SetSuccess, "k1");
        assert_eq!(delivered.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_subscriber_count() {
        let bus = EventBus::new();
        assert_eq!(bus.subscriber_count(CacheEventKind::Connected), 0);

        bus.subscribe(CacheEventKind::Connected, |_| {});
        bus.subscribe(CacheEventKind::Connected, |_| {});
        assert_eq!(bus.subscriber_count(CacheEventKind::Connected), 2);
    }
}
