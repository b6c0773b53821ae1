//! The refreshable key-value cache.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{Instrument, debug, info, info_span, warn};

use super::event::{CacheEvent, CacheEventKind, CacheListener, CacheNotifier};
use super::expiry::{Expiration, format_age};
use super::store::KeyValueStore;
use crate::error::LoadError;
use crate::format::{self, DEFAULT_XML_ROOT, Format};
use crate::source::{CacheLoader, CacheSource, JdbcSource, RestSource};
use crate::telemetry;
use crate::{CacheInfo, CacheStatus, CacheValue, ManagedCache, MimirError, Result, SourceKind};

#[derive(Debug)]
struct Lifecycle {
    status: CacheStatus,
    initialized_at: Option<DateTime<Utc>>,
    refreshed_at: Option<DateTime<Utc>>,
    /// Monotonic time of the last successful load, for expiry checks.
    loaded_at: Option<Instant>,
    /// Bumped on every successful load.
    generation: u64,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self {
            status: CacheStatus::New,
            initialized_at: None,
            refreshed_at: None,
            loaded_at: None,
            generation: 0,
        }
    }
}

/// Puts the cache back to READY when a refresh ends, including when the
/// refreshing future is dropped mid-load.
struct RefreshingState<'a> {
    lifecycle: &'a RwLock<Lifecycle>,
}

impl<'a> RefreshingState<'a> {
    fn enter(lifecycle: &'a RwLock<Lifecycle>) -> Self {
        lifecycle.write().status = CacheStatus::Refreshing;
        Self { lifecycle }
    }
}

impl Drop for RefreshingState<'_> {
    fn drop(&mut self) {
        self.lifecycle.write().status = CacheStatus::Ready;
    }
}

/// A named in-memory key-value cache populated from a [`CacheSource`].
///
/// Reads always go to the active store and never wait for a refresh: a
/// refresh loads into a fresh store and swaps it in atomically, so a reader
/// sees either the old data or the new data, never a mix. Only one refresh
/// runs at a time; callers that queued behind it get `Ok(false)` instead of
/// loading again.
///
/// ```rust,no_run
/// # use mimir::{DataMapCache, ManagedCache};
/// # use mimir::source::RestSource;
/// # #[derive(Clone, serde::Serialize, serde::Deserialize)]
/// # struct User { id: u64, name: String }
/// # async fn example() -> mimir::Result<()> {
/// let users = DataMapCache::<User>::builder("users")
///     .rest_source(RestSource::new("https://api.example.com/users", |u: &User| u.id.to_string()))
///     .expiration("10 MINUTES")
///     .build()?;
/// users.initialize().await?;
/// let alice = users.get("1");
/// # Ok(())
/// # }
/// ```
pub struct DataMapCache<V> {
    name: String,
    store: ArcSwap<KeyValueStore<V>>,
    source: Option<CacheSource<V>>,
    source_kind: SourceKind,
    xml_root: String,
    lifecycle: RwLock<Lifecycle>,
    expiry: RwLock<Option<Expiration>>,
    refresh_lock: Mutex<()>,
    notifier: Arc<CacheNotifier>,
}

impl<V: CacheValue> DataMapCache<V> {
    pub fn builder(name: impl Into<String>) -> DataMapCacheBuilder<V> {
        DataMapCacheBuilder::new(name)
    }

    // ===== Lifecycle =====

    /// First load. Fails with [`MimirError::IllegalState`] unless the cache
    /// is NEW. A failed load leaves the cache NEW so the call can be retried.
    pub async fn initialize(&self) -> Result<()> {
        self.initialize_as(self).await
    }

    /// Reload from the source and swap the result in.
    ///
    /// Returns `Ok(false)` when another refresh completed while this call was
    /// waiting for the refresh lock. On failure the previous data stays
    /// active and the cache returns to READY.
    pub async fn refresh(&self) -> Result<bool> {
        self.refresh_as(self).await
    }

    /// Refresh if the expiration has elapsed since the last successful load.
    ///
    /// Does nothing unless the cache is READY with an expiration set. Load
    /// failures are logged and swallowed.
    pub async fn check_refresh(&self) -> bool {
        self.check_refresh_as(self).await
    }

    pub(crate) async fn initialize_as(&self, emitter: &dyn ManagedCache) -> Result<()> {
        let guard = self.refresh_lock.lock().await;
        let status = self.lifecycle.read().status;
        if status != CacheStatus::New {
            return Err(MimirError::IllegalState(format!(
                "cache [{}] is already initialized",
                self.name
            )));
        }

        let store = self.load("initialize").await?;
        let size = store.size();
        self.install(store, true);
        drop(guard);

        info!(cache = %self.name, source = %self.source_kind, size, "cache initialized");
        self.publish(emitter, CacheEventKind::Init);
        Ok(())
    }

    pub(crate) async fn refresh_as(&self, emitter: &dyn ManagedCache) -> Result<bool> {
        let seen = self.require_initialized("refresh")?;
        self.refresh_after(seen, "refresh", emitter).await
    }

    pub(crate) async fn check_refresh_as(&self, emitter: &dyn ManagedCache) -> bool {
        let Some(expiry) = self.expiry() else {
            return false;
        };
        let (status, loaded_at, generation) = {
            let lifecycle = self.lifecycle.read();
            (lifecycle.status, lifecycle.loaded_at, lifecycle.generation)
        };
        if status != CacheStatus::Ready {
            return false;
        }
        let Some(loaded_at) = loaded_at else {
            return false;
        };
        let elapsed = loaded_at.elapsed();
        if elapsed < expiry {
            return false;
        }

        debug!(cache = %self.name, age = %format_age(elapsed), "expiration reached, refreshing");
        match self.refresh_after(generation, "scheduled", emitter).await {
            Ok(refreshed) => refreshed,
            Err(e) => {
                warn!(
                    cache = %self.name,
                    source = %self.source_kind,
                    since_last_success = %format_age(loaded_at.elapsed()),
                    error = %e,
                    "scheduled refresh failed, keeping previous data"
                );
                false
            }
        }
    }

    /// Refresh unless the generation moved past `seen` while waiting for the
    /// lock.
    async fn refresh_after(
        &self,
        seen: u64,
        operation: &'static str,
        emitter: &dyn ManagedCache,
    ) -> Result<bool> {
        let guard = self.refresh_lock.lock().await;
        let current = self.lifecycle.read().generation;
        if current != seen {
            debug!(cache = %self.name, "refresh already done by a concurrent caller");
            metrics::counter!(telemetry::REFRESH_SKIPPED_TOTAL, "cache" => self.name.clone())
                .increment(1);
            return Ok(false);
        }

        let refreshing = RefreshingState::enter(&self.lifecycle);
        let store = self.load(operation).await?;
        let size = store.size();
        self.install(store, false);
        drop(refreshing);
        drop(guard);

        info!(cache = %self.name, source = %self.source_kind, size, operation, "cache refreshed");
        self.publish(emitter, CacheEventKind::Refresh);
        Ok(true)
    }

    /// Run the source into a fresh store. The store is only returned when
    /// the whole load succeeded.
    async fn load(&self, operation: &'static str) -> Result<KeyValueStore<V>> {
        let start = Instant::now();
        let Some(source) = &self.source else {
            record_load(&self.name, operation, start, false);
            return Err(MimirError::load(&self.name, LoadError::NoSource));
        };

        debug!(cache = %self.name, source = %self.source_kind, operation, "loading cache");
        let store = KeyValueStore::new();
        let outcome = source
            .load(&store)
            .instrument(info_span!("cache_load", cache = %self.name, operation))
            .await;
        record_load(&self.name, operation, start, outcome.is_ok());

        outcome.map_err(|e| MimirError::load(&self.name, e))?;
        Ok(store)
    }

    fn install(&self, store: KeyValueStore<V>, initial: bool) {
        self.store.store(Arc::new(store));

        let now = Utc::now();
        let mut lifecycle = self.lifecycle.write();
        if initial {
            lifecycle.initialized_at = Some(now);
        }
        lifecycle.refreshed_at = Some(now);
        lifecycle.loaded_at = Some(Instant::now());
        lifecycle.generation += 1;
        lifecycle.status = CacheStatus::Ready;
    }

    fn publish(&self, emitter: &dyn ManagedCache, kind: CacheEventKind) {
        if self.notifier.is_empty() {
            return;
        }
        self.notifier.publish(&CacheEvent::new(emitter, kind));
    }

    /// Current generation, or `IllegalState` while NEW.
    fn require_initialized(&self, operation: &str) -> Result<u64> {
        let lifecycle = self.lifecycle.read();
        if lifecycle.status == CacheStatus::New {
            return Err(MimirError::IllegalState(format!(
                "cache [{}] must be initialized before {operation}",
                self.name
            )));
        }
        Ok(lifecycle.generation)
    }

    // ===== Reads =====

    /// Look up a value in the active store.
    pub fn get(&self, key: &str) -> Option<V> {
        self.store.load().get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.store.load().contains_key(key)
    }

    /// The active store. Stays valid (and unchanged by refreshes) for as long
    /// as the caller holds it.
    pub fn snapshot(&self) -> Arc<KeyValueStore<V>> {
        self.store.load_full()
    }

    /// Render a value, or `""` on a miss.
    pub fn render(&self, key: &str, format: Format) -> Result<String> {
        match self.get(key) {
            Some(value) => format::render(&value, format, &self.xml_root),
            None => Ok(String::new()),
        }
    }

    pub fn get_json(&self, key: &str) -> Result<String> {
        self.render(key, Format::Json)
    }

    pub fn get_xml(&self, key: &str) -> Result<String> {
        self.render(key, Format::Xml)
    }

    pub fn get_yaml(&self, key: &str) -> Result<String> {
        self.render(key, Format::Yaml)
    }

    // ===== Mutations =====

    /// Insert into the active store. Returns the previous value.
    ///
    /// Writes made while a refresh is loading are lost when the refreshed
    /// store is swapped in.
    pub fn put(&self, key: impl Into<String>, value: V) -> Result<Option<V>> {
        self.require_initialized("put")?;
        Ok(self.store.load().put(key, value))
    }

    /// Deserialize `json` and insert it under `key`.
    pub fn put_json(&self, key: &str, json: &str) -> Result<()> {
        let value: V = format::from_json(json)?;
        self.put(key, value).map(|_| ())
    }

    pub fn remove(&self, key: &str) -> Result<Option<V>> {
        self.require_initialized("remove")?;
        Ok(self.store.load().remove(key))
    }

    /// Set the auto-refresh interval, e.g. `"300 SECONDS"`. An empty spec
    /// disables auto-refresh.
    pub fn set_expiration(&self, spec: &str) -> Result<()> {
        let parsed = Expiration::parse(spec)?;
        info!(
            cache = %self.name,
            expiration = parsed.as_ref().map(Expiration::spec).unwrap_or("none"),
            "expiration updated"
        );
        *self.expiry.write() = parsed;
        Ok(())
    }

    /// Subscribe a listener to this cache's events.
    pub fn add_listener(&self, listener: Arc<dyn CacheListener>) {
        self.notifier.subscribe_to(self.name.clone(), listener);
    }

    pub fn notifier(&self) -> &Arc<CacheNotifier> {
        &self.notifier
    }

    // ===== Introspection =====

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn status(&self) -> CacheStatus {
        self.lifecycle.read().status
    }

    pub fn source_kind(&self) -> SourceKind {
        self.source_kind
    }

    pub fn size(&self) -> usize {
        self.store.load().size()
    }

    pub fn keys(&self) -> Vec<String> {
        self.store.load().keys()
    }

    /// The expiration spec, empty when auto-refresh is disabled.
    pub fn expiration(&self) -> String {
        self.expiry
            .read()
            .as_ref()
            .map(|e| e.spec().to_string())
            .unwrap_or_default()
    }

    pub fn expiry(&self) -> Option<Duration> {
        self.expiry.read().as_ref().map(Expiration::duration)
    }

    pub fn initialized_at(&self) -> Option<DateTime<Utc>> {
        self.lifecycle.read().initialized_at
    }

    pub fn refreshed_at(&self) -> Option<DateTime<Utc>> {
        self.lifecycle.read().refreshed_at
    }

    /// Time since the last successful load, e.g. `"0 hours, 5 minutes, 3 seconds"`.
    pub fn age(&self) -> String {
        let loaded_at = self.lifecycle.read().loaded_at;
        format_age(loaded_at.map(|t| t.elapsed()).unwrap_or_default())
    }

    pub fn info(&self) -> CacheInfo {
        let (status, initialized_at, refreshed_at) = {
            let lifecycle = self.lifecycle.read();
            (
                lifecycle.status,
                lifecycle.initialized_at,
                lifecycle.refreshed_at,
            )
        };
        CacheInfo {
            name: self.name.clone(),
            status,
            source: self.source_kind,
            expiration: self.expiration(),
            size: self.size(),
            age: self.age(),
            initialized_at,
            refreshed_at,
            profile: None,
            config_url: None,
        }
    }

    pub fn to_debug_string(&self) -> Result<String> {
        format::to_json(&self.info())
    }
}

fn record_load(cache: &str, operation: &'static str, start: Instant, ok: bool) {
    let status = if ok { "ok" } else { "error" };
    metrics::counter!(telemetry::LOADS_TOTAL,
        "cache" => cache.to_owned(),
        "operation" => operation,
        "status" => status,
    )
    .increment(1);
    metrics::histogram!(telemetry::LOAD_DURATION_SECONDS,
        "cache" => cache.to_owned(),
        "operation" => operation,
    )
    .record(start.elapsed().as_secs_f64());
}

#[async_trait]
impl<V: CacheValue> ManagedCache for DataMapCache<V> {
    fn name(&self) -> &str {
        &self.name
    }

    fn status(&self) -> CacheStatus {
        DataMapCache::status(self)
    }

    fn source_kind(&self) -> SourceKind {
        self.source_kind
    }

    fn size(&self) -> usize {
        DataMapCache::size(self)
    }

    fn keys(&self) -> Vec<String> {
        DataMapCache::keys(self)
    }

    fn info(&self) -> CacheInfo {
        DataMapCache::info(self)
    }

    fn get_value(&self, key: &str) -> Result<Option<serde_json::Value>> {
        Ok(self.get(key).map(serde_json::to_value).transpose()?)
    }

    fn render(&self, key: &str, format: Format) -> Result<String> {
        DataMapCache::render(self, key, format)
    }

    fn put_json(&self, key: &str, json: &str) -> Result<()> {
        DataMapCache::put_json(self, key, json)
    }

    fn set_expiration(&self, spec: &str) -> Result<()> {
        DataMapCache::set_expiration(self, spec)
    }

    async fn initialize(&self) -> Result<()> {
        DataMapCache::initialize(self).await
    }

    async fn refresh(&self) -> Result<bool> {
        DataMapCache::refresh(self).await
    }

    async fn check_refresh(&self) -> bool {
        DataMapCache::check_refresh(self).await
    }
}

impl<V> fmt::Debug for DataMapCache<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let lifecycle = self.lifecycle.read();
        f.debug_struct("DataMapCache")
            .field("name", &self.name)
            .field("status", &lifecycle.status)
            .field("source", &self.source)
            .field("size", &self.store.load().size())
            .field("generation", &lifecycle.generation)
            .finish()
    }
}

/// Builder for [`DataMapCache`].
///
/// The source is fixed at build time; setting a second source replaces the
/// first.
pub struct DataMapCacheBuilder<V> {
    name: String,
    source: Option<CacheSource<V>>,
    source_kind: Option<SourceKind>,
    expiration: Option<String>,
    notifier: Option<Arc<CacheNotifier>>,
    xml_root: Option<String>,
}

impl<V: CacheValue> DataMapCacheBuilder<V> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: None,
            source_kind: None,
            expiration: None,
            notifier: None,
            xml_root: None,
        }
    }

    pub fn rest_source(self, source: RestSource<V>) -> Self {
        self.source(source)
    }

    pub fn jdbc_source(self, source: JdbcSource<V>) -> Self {
        self.source(source)
    }

    /// Populate the cache with caller code.
    pub fn loader(self, loader: impl CacheLoader<V> + 'static) -> Self {
        self.source(CacheSource::custom(loader))
    }

    pub fn source(mut self, source: impl Into<CacheSource<V>>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Auto-refresh interval, e.g. `"8 HOURS"`.
    pub fn expiration(mut self, spec: impl Into<String>) -> Self {
        self.expiration = Some(spec.into());
        self
    }

    /// Share a notifier with other caches. Default: a private one.
    pub fn notifier(mut self, notifier: Arc<CacheNotifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Root element name for XML renderings. Default: `value`.
    pub fn xml_root(mut self, root: impl Into<String>) -> Self {
        self.xml_root = Some(root.into());
        self
    }

    /// Report a different source kind than the configured source implies.
    pub(crate) fn source_kind(mut self, kind: SourceKind) -> Self {
        self.source_kind = Some(kind);
        self
    }

    pub fn build(self) -> Result<DataMapCache<V>> {
        if self.name.trim().is_empty() {
            return Err(MimirError::Configuration(
                "cache name must not be empty".into(),
            ));
        }
        let expiry = match &self.expiration {
            Some(spec) => Expiration::parse(spec)?,
            None => None,
        };
        let source_kind = self.source_kind.unwrap_or_else(|| {
            self.source
                .as_ref()
                .map_or(SourceKind::None, CacheSource::kind)
        });

        Ok(DataMapCache {
            name: self.name,
            store: ArcSwap::from_pointee(KeyValueStore::new()),
            source: self.source,
            source_kind,
            xml_root: self.xml_root.unwrap_or_else(|| DEFAULT_XML_ROOT.to_string()),
            lifecycle: RwLock::new(Lifecycle::default()),
            expiry: RwLock::new(expiry),
            refresh_lock: Mutex::new(()),
            notifier: self.notifier.unwrap_or_default(),
        })
    }
}
