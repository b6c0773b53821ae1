//! Core ManagedCache trait

use async_trait::async_trait;

use crate::format::{self, Format};
use crate::{CacheInfo, CacheStatus, Result, SourceKind};

/// Type-erased view of a cache, as seen by management surfaces.
///
/// Every cache implements this regardless of its value type, so registries,
/// schedulers, lifecycle listeners and the HTTP management API can work with
/// `dyn ManagedCache` without knowing what the cache stores.
#[async_trait]
pub trait ManagedCache: Send + Sync {
    // ===== Introspection =====

    /// Unique cache name.
    fn name(&self) -> &str;

    /// Current lifecycle state.
    fn status(&self) -> CacheStatus;

    /// Which kind of source populates the cache.
    fn source_kind(&self) -> SourceKind;

    /// Number of entries in the active store.
    fn size(&self) -> usize;

    /// Snapshot of the keys in the active store.
    fn keys(&self) -> Vec<String>;

    /// Name, status, age, size and timestamps.
    fn info(&self) -> CacheInfo;

    // ===== Reads =====

    /// Look up a value as a JSON tree. `None` on a miss.
    fn get_value(&self, key: &str) -> Result<Option<serde_json::Value>>;

    /// Render a value in the given format, or `""` on a miss.
    fn render(&self, key: &str, format: Format) -> Result<String>;

    fn get_json(&self, key: &str) -> Result<String> {
        self.render(key, Format::Json)
    }

    fn get_xml(&self, key: &str) -> Result<String> {
        self.render(key, Format::Xml)
    }

    fn get_yaml(&self, key: &str) -> Result<String> {
        self.render(key, Format::Yaml)
    }

    /// Structured dump of [`info()`](Self::info) as JSON.
    fn to_debug_string(&self) -> Result<String> {
        format::to_json(&self.info())
    }

    // ===== Mutations =====

    /// Parse `json` into the cache's value type and store it under `key`.
    fn put_json(&self, key: &str, json: &str) -> Result<()>;

    /// Change (or clear, with `""`) the expiration spec.
    fn set_expiration(&self, spec: &str) -> Result<()>;

    // ===== Lifecycle =====

    /// Perform the first load. Fails if the cache was already initialized.
    async fn initialize(&self) -> Result<()>;

    /// Reload from the source. `Ok(false)` when a concurrent refresh already
    /// did the work.
    async fn refresh(&self) -> Result<bool>;

    /// Scheduler tick: refresh if the expiration has elapsed. Failures are
    /// logged and swallowed; returns whether a refresh happened.
    async fn check_refresh(&self) -> bool;
}
