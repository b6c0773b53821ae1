//! Cache registry: named, type-erased lookup for management surfaces.
//!
//! Caches of any value type are registered as `Arc<dyn ManagedCache>`. The
//! HTTP management API and the daemon work exclusively through the registry.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{error, info};

use crate::scheduler::{RefreshScheduler, SchedulerConfig};
use crate::{CacheInfo, ManagedCache, MimirError, Result};

/// Name-keyed set of caches, listed in name order.
#[derive(Default)]
pub struct CacheRegistry {
    caches: RwLock<BTreeMap<String, Arc<dyn ManagedCache>>>,
}

impl CacheRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a cache. Names must be unique.
    pub fn register(&self, cache: Arc<dyn ManagedCache>) -> Result<()> {
        let name = cache.name().to_string();
        let mut caches = self.caches.write();
        if caches.contains_key(&name) {
            return Err(MimirError::Configuration(format!(
                "cache [{name}] is already registered"
            )));
        }
        caches.insert(name, cache);
        Ok(())
    }

    /// Remove a cache, returning it if it was registered.
    pub fn unregister(&self, name: &str) -> Option<Arc<dyn ManagedCache>> {
        self.caches.write().remove(name)
    }

    pub fn get(&self, name: &str) -> Result<Arc<dyn ManagedCache>> {
        self.caches
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| MimirError::CacheNotFound(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.caches.read().contains_key(name)
    }

    /// Registered cache names, sorted.
    pub fn names(&self) -> Vec<String> {
        self.caches.read().keys().cloned().collect()
    }

    /// Info snapshot of every cache, in name order.
    pub fn list(&self) -> Vec<CacheInfo> {
        self.all().iter().map(|cache| cache.info()).collect()
    }

    pub fn len(&self) -> usize {
        self.caches.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn all(&self) -> Vec<Arc<dyn ManagedCache>> {
        self.caches.read().values().cloned().collect()
    }

    /// Initialize every cache, in name order. Stops at the first failure;
    /// caches already initialized stay READY.
    pub async fn initialize_all(&self) -> Result<()> {
        for cache in self.all() {
            if let Err(e) = cache.initialize().await {
                error!(cache = cache.name(), error = %e, "cache initialization failed");
                return Err(e);
            }
        }
        info!(caches = self.len(), "all caches initialized");
        Ok(())
    }

    /// Start a refresh scheduler per cache. The schedulers stop when the
    /// returned handles are dropped.
    pub fn spawn_schedulers(&self, config: &SchedulerConfig) -> Vec<RefreshScheduler> {
        self.all()
            .into_iter()
            .map(|cache| RefreshScheduler::spawn(cache, config))
            .collect()
    }
}

impl std::fmt::Debug for CacheRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheRegistry")
            .field("caches", &self.names())
            .finish()
    }
}
