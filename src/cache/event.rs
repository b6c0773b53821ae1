//! Cache lifecycle events.
//!
//! A cache publishes an [`CacheEventKind::Init`] event when its first load
//! completes and a [`CacheEventKind::Refresh`] event after every successful
//! reload. Delivery is synchronous, on the thread that performed the load,
//! in registration order, and always happens after the new store is visible,
//! so a listener calling back into the cache sees the fresh data.
//!
//! Listeners are registered explicitly on a [`CacheNotifier`]. A notifier can
//! be shared between caches; [`CacheNotifier::subscribe_to`] scopes a listener
//! to one cache name.
//!
//! A listener returning an error does not stop delivery to the others: the
//! failure is logged and counted, and the load that triggered the event still
//! succeeds.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::ManagedCache;
use crate::telemetry;

/// What happened to the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CacheEventKind {
    Init,
    Refresh,
}

impl CacheEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheEventKind::Init => "INIT",
            CacheEventKind::Refresh => "REFRESH",
        }
    }
}

impl fmt::Display for CacheEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle notification, borrowed from the emitting cache for the duration
/// of delivery.
pub struct CacheEvent<'a> {
    cache: &'a dyn ManagedCache,
    kind: CacheEventKind,
    timestamp: DateTime<Utc>,
}

impl<'a> CacheEvent<'a> {
    pub fn new(cache: &'a dyn ManagedCache, kind: CacheEventKind) -> Self {
        Self {
            cache,
            kind,
            timestamp: Utc::now(),
        }
    }

    /// The cache that finished loading.
    pub fn cache(&self) -> &'a dyn ManagedCache {
        self.cache
    }

    pub fn cache_name(&self) -> &'a str {
        self.cache.name()
    }

    pub fn kind(&self) -> CacheEventKind {
        self.kind
    }

    /// When the event was created.
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

impl fmt::Debug for CacheEvent<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheEvent")
            .field("cache", &self.cache.name())
            .field("kind", &self.kind)
            .field("timestamp", &self.timestamp)
            .finish()
    }
}

/// Error type listeners may return.
pub type ListenerError = Box<dyn std::error::Error + Send + Sync>;

/// Receives lifecycle events.
pub trait CacheListener: Send + Sync {
    fn on_event(&self, event: &CacheEvent<'_>) -> Result<(), ListenerError>;
}

struct Subscription {
    /// `None` listens to every cache.
    cache: Option<String>,
    listener: Arc<dyn CacheListener>,
}

impl Subscription {
    fn matches(&self, cache: &str) -> bool {
        self.cache.as_deref().is_none_or(|name| name == cache)
    }
}

/// Registry of lifecycle listeners.
#[derive(Default)]
pub struct CacheNotifier {
    subscriptions: RwLock<Vec<Subscription>>,
}

impl CacheNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Listen to events from every cache using this notifier.
    pub fn subscribe(&self, listener: Arc<dyn CacheListener>) {
        self.subscriptions.write().push(Subscription {
            cache: None,
            listener,
        });
    }

    /// Listen to events from the named cache only.
    pub fn subscribe_to(&self, cache: impl Into<String>, listener: Arc<dyn CacheListener>) {
        self.subscriptions.write().push(Subscription {
            cache: Some(cache.into()),
            listener,
        });
    }

    /// Number of registered listeners.
    pub fn len(&self) -> usize {
        self.subscriptions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Deliver `event` to every matching listener, in registration order.
    ///
    /// Returns the number of listeners that failed.
    pub fn publish(&self, event: &CacheEvent<'_>) -> usize {
        // Snapshot so listeners may subscribe during delivery.
        let listeners: Vec<Arc<dyn CacheListener>> = self
            .subscriptions
            .read()
            .iter()
            .filter(|s| s.matches(event.cache_name()))
            .map(|s| Arc::clone(&s.listener))
            .collect();

        let mut failures = 0;
        for listener in listeners {
            if let Err(e) = listener.on_event(event) {
                failures += 1;
                metrics::counter!(
                    telemetry::LISTENER_FAILURES_TOTAL,
                    "cache" => event.cache_name().to_string(),
                    "kind" => event.kind().as_str()
                )
                .increment(1);
                warn!(
                    cache = event.cache_name(),
                    kind = %event.kind(),
                    error = %e,
                    "cache listener failed"
                );
            }
        }
        failures
    }
}

impl fmt::Debug for CacheNotifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheNotifier")
            .field("listeners", &self.len())
            .finish()
    }
}
