//! Integration tests for [`DataMapCache`]: lifecycle, single-flight refresh,
//! atomic swaps, failure handling and renderings.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use mimir::cache::KeyValueStore;
use mimir::source::{CacheLoader, CacheSource};
use mimir::{CacheStatus, DataMapCache, LoadError, ManagedCache, MimirError, SourceKind};

// ============================================================================
// Loaders
// ============================================================================

struct FixedLoader(Vec<(&'static str, i64)>);

#[async_trait]
impl CacheLoader<i64> for FixedLoader {
    async fn load(&self, store: &KeyValueStore<i64>) -> Result<(), LoadError> {
        for (key, value) in &self.0 {
            store.put(*key, *value);
        }
        Ok(())
    }
}

/// Writes `keys` entries all carrying the current version, one at a time.
/// Can be switched to fail or slowed down between loads.
struct VersionedLoader {
    keys: usize,
    version: AtomicI64,
    fail: AtomicBool,
    calls: AtomicUsize,
    delay_ms: AtomicU64,
}

impl VersionedLoader {
    fn new(keys: usize, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            keys,
            version: AtomicI64::new(1),
            fail: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
            delay_ms: AtomicU64::new(delay.as_millis() as u64),
        })
    }

    fn set_delay(&self, delay: Duration) {
        self.delay_ms.store(delay.as_millis() as u64, Ordering::SeqCst);
    }
}

#[async_trait]
impl CacheLoader<i64> for VersionedLoader {
    async fn load(&self, store: &KeyValueStore<i64>) -> Result<(), LoadError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let delay = self.delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(LoadError::custom("source unreachable"));
        }
        let version = self.version.load(Ordering::SeqCst);
        for i in 0..self.keys {
            store.put(format!("k{i}"), version);
            tokio::task::yield_now().await;
        }
        Ok(())
    }
}

fn versioned_cache(loader: &Arc<VersionedLoader>) -> DataMapCache<i64> {
    DataMapCache::builder("versioned")
        .source(CacheSource::<i64>::Custom(loader.clone()))
        .build()
        .unwrap()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Country {
    code: String,
    name: String,
    population: u64,
}

struct CountryLoader;

#[async_trait]
impl CacheLoader<Country> for CountryLoader {
    async fn load(&self, store: &KeyValueStore<Country>) -> Result<(), LoadError> {
        store.put(
            "SE",
            Country {
                code: "SE".into(),
                name: "Sweden".into(),
                population: 10_500_000,
            },
        );
        Ok(())
    }
}

// ============================================================================
// Lifecycle
// ============================================================================

#[tokio::test]
async fn basic_cache_initializes_from_custom_loader() {
    let cache = DataMapCache::builder("basic")
        .loader(FixedLoader(vec![("k1", 1), ("k2", 2)]))
        .build()
        .unwrap();
    assert_eq!(cache.status(), CacheStatus::New);

    cache.initialize().await.unwrap();

    assert_eq!(cache.status(), CacheStatus::Ready);
    assert_eq!(cache.size(), 2);
    assert_eq!(cache.get("k1"), Some(1));
    assert_eq!(cache.keys(), vec!["k1", "k2"]);
    assert!(cache.initialized_at().is_some());
    assert_eq!(cache.initialized_at(), cache.refreshed_at());
}

#[tokio::test]
async fn second_initialize_is_illegal_state() {
    let cache = DataMapCache::builder("basic")
        .loader(FixedLoader(vec![("k1", 1)]))
        .build()
        .unwrap();
    cache.initialize().await.unwrap();

    let err = cache.initialize().await.unwrap_err();
    assert!(matches!(err, MimirError::IllegalState(_)), "got {err:?}");
    assert_eq!(cache.status(), CacheStatus::Ready);
}

#[tokio::test]
async fn missing_source_fails_initialize() {
    let cache = DataMapCache::<i64>::builder("empty").build().unwrap();
    assert_eq!(cache.source_kind(), SourceKind::None);

    let err = cache.initialize().await.unwrap_err();
    assert!(err.is_load_error());
    assert!(err.to_string().contains("[empty]"));
    assert!(err.to_string().contains("no cache source provided"));
    assert_eq!(cache.status(), CacheStatus::New);
}

#[tokio::test]
async fn failed_initialize_can_be_retried() {
    let loader = VersionedLoader::new(3, Duration::ZERO);
    loader.fail.store(true, Ordering::SeqCst);
    let cache = versioned_cache(&loader);

    assert!(cache.initialize().await.unwrap_err().is_load_error());
    assert_eq!(cache.status(), CacheStatus::New);
    assert!(cache.initialized_at().is_none());

    loader.fail.store(false, Ordering::SeqCst);
    cache.initialize().await.unwrap();
    assert_eq!(cache.status(), CacheStatus::Ready);
    assert_eq!(cache.size(), 3);
}

#[tokio::test]
async fn refresh_before_initialize_is_illegal_state() {
    let loader = VersionedLoader::new(1, Duration::ZERO);
    let cache = versioned_cache(&loader);
    let err = cache.refresh().await.unwrap_err();
    assert!(matches!(err, MimirError::IllegalState(_)));
    assert_eq!(loader.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn refresh_replaces_data_and_stamps_time() {
    let loader = VersionedLoader::new(2, Duration::ZERO);
    let cache = versioned_cache(&loader);
    cache.initialize().await.unwrap();
    let initialized = cache.initialized_at();

    loader.version.store(2, Ordering::SeqCst);
    assert!(cache.refresh().await.unwrap());

    assert_eq!(cache.get("k0"), Some(2));
    assert_eq!(cache.status(), CacheStatus::Ready);
    assert_eq!(cache.initialized_at(), initialized);
    assert!(cache.refreshed_at() >= initialized);
}

#[tokio::test]
async fn failed_refresh_keeps_previous_data() {
    let loader = VersionedLoader::new(2, Duration::ZERO);
    let cache = versioned_cache(&loader);
    cache.initialize().await.unwrap();
    let refreshed = cache.refreshed_at();

    loader.version.store(2, Ordering::SeqCst);
    loader.fail.store(true, Ordering::SeqCst);
    let err = cache.refresh().await.unwrap_err();

    assert!(err.is_load_error());
    assert!(err.to_string().contains("source unreachable"));
    assert_eq!(cache.status(), CacheStatus::Ready);
    assert_eq!(cache.get("k0"), Some(1));
    assert_eq!(cache.size(), 2);
    assert_eq!(cache.refreshed_at(), refreshed);
}

// ============================================================================
// Concurrency
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn readers_never_see_a_partial_store() {
    let loader = VersionedLoader::new(50, Duration::ZERO);
    let cache = Arc::new(versioned_cache(&loader));
    cache.initialize().await.unwrap();

    let done = Arc::new(AtomicBool::new(false));
    let mut readers = Vec::new();
    for _ in 0..4 {
        let cache = Arc::clone(&cache);
        let done = Arc::clone(&done);
        readers.push(tokio::spawn(async move {
            let mut observed = HashSet::new();
            while !done.load(Ordering::SeqCst) {
                let snapshot = cache.snapshot();
                let versions: HashSet<i64> =
                    snapshot.entries().into_iter().map(|(_, v)| v).collect();
                assert_eq!(snapshot.size(), 50, "partial store observed");
                assert_eq!(versions.len(), 1, "mixed store observed: {versions:?}");
                observed.extend(versions);
                tokio::task::yield_now().await;
            }
            observed
        }));
    }

    for version in 2..=10 {
        loader.version.store(version, Ordering::SeqCst);
        assert!(cache.refresh().await.unwrap());
    }
    done.store(true, Ordering::SeqCst);

    for reader in readers {
        let observed = reader.await.unwrap();
        assert!(observed.iter().all(|v| (1..=10).contains(v)));
    }
    assert_eq!(cache.get("k49"), Some(10));
}

#[tokio::test]
async fn concurrent_refreshes_load_once() {
    let loader = VersionedLoader::new(5, Duration::from_millis(100));
    let cache = versioned_cache(&loader);
    cache.initialize().await.unwrap();
    loader.calls.store(0, Ordering::SeqCst);

    let results =
        futures_util::future::join_all((0..8).map(|_| cache.refresh())).await;

    let refreshed = results
        .iter()
        .filter(|r| matches!(r, Ok(true)))
        .count();
    let skipped = results
        .iter()
        .filter(|r| matches!(r, Ok(false)))
        .count();
    assert_eq!(refreshed, 1);
    assert_eq!(skipped, 7);
    assert_eq!(loader.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn status_is_refreshing_during_load() {
    let loader = VersionedLoader::new(1, Duration::from_millis(200));
    let cache = Arc::new(versioned_cache(&loader));
    cache.initialize().await.unwrap();

    let refreshing = {
        let cache = Arc::clone(&cache);
        tokio::spawn(async move { cache.refresh().await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(cache.status(), CacheStatus::Refreshing);
    // Reads are served from the previous store meanwhile.
    assert_eq!(cache.get("k0"), Some(1));

    assert!(refreshing.await.unwrap().unwrap());
    assert_eq!(cache.status(), CacheStatus::Ready);
}

#[tokio::test]
async fn cancelled_refresh_returns_to_ready() {
    let loader = VersionedLoader::new(1, Duration::ZERO);
    let cache = versioned_cache(&loader);
    cache.initialize().await.unwrap();

    loader.set_delay(Duration::from_secs(60));
    let timed_out = tokio::time::timeout(Duration::from_millis(50), cache.refresh()).await;
    assert!(timed_out.is_err(), "slow refresh should time out");
    assert_eq!(cache.status(), CacheStatus::Ready);
    assert_eq!(cache.get("k0"), Some(1));

    // The refresh lock was released with the dropped future.
    loader.set_delay(Duration::ZERO);
    loader.version.store(2, Ordering::SeqCst);
    assert!(cache.refresh().await.unwrap());
    assert_eq!(cache.get("k0"), Some(2));
}

#[tokio::test]
async fn repeated_reads_are_identical() {
    let cache = DataMapCache::builder("countries")
        .loader(CountryLoader)
        .build()
        .unwrap();
    cache.initialize().await.unwrap();

    let first = cache.get("SE");
    let second = cache.get("SE");
    assert!(first.is_some());
    assert_eq!(first, second);
}

// ============================================================================
// Renderings and mutations
// ============================================================================

#[tokio::test]
async fn renders_values_and_empty_on_miss() {
    let cache = DataMapCache::builder("countries")
        .loader(CountryLoader)
        .build()
        .unwrap();
    cache.initialize().await.unwrap();

    assert_eq!(
        cache.get_json("SE").unwrap(),
        r#"{"code":"SE","name":"Sweden","population":10500000}"#
    );
    let xml = cache.get_xml("SE").unwrap();
    assert!(xml.starts_with("<value>"), "{xml}");
    assert!(xml.contains("<name>Sweden</name>"), "{xml}");
    let yaml = cache.get_yaml("SE").unwrap();
    assert!(yaml.contains("name: Sweden"), "{yaml}");

    assert_eq!(cache.get_json("XX").unwrap(), "");
    assert_eq!(cache.get_xml("XX").unwrap(), "");
    assert_eq!(cache.get_yaml("XX").unwrap(), "");
}

#[tokio::test]
async fn custom_xml_root() {
    let cache = DataMapCache::builder("countries")
        .loader(CountryLoader)
        .xml_root("country")
        .build()
        .unwrap();
    cache.initialize().await.unwrap();
    assert!(cache.get_xml("SE").unwrap().starts_with("<country>"));
}

#[tokio::test]
async fn put_json_and_remove() {
    let cache = DataMapCache::builder("countries")
        .loader(CountryLoader)
        .build()
        .unwrap();
    cache.initialize().await.unwrap();

    cache
        .put_json("FI", r#"{"code":"FI","name":"Finland","population":5600000}"#)
        .unwrap();
    assert_eq!(cache.get("FI").map(|c| c.name), Some("Finland".into()));
    assert_eq!(cache.size(), 2);

    let err = cache.put_json("DK", "{not json").unwrap_err();
    assert!(matches!(err, MimirError::Json(_)));

    let removed = cache.remove("FI").unwrap();
    assert_eq!(removed.map(|c| c.code), Some("FI".into()));
    assert_eq!(cache.size(), 1);
}

#[tokio::test]
async fn put_before_initialize_is_illegal_state() {
    let cache = DataMapCache::builder("countries")
        .loader(CountryLoader)
        .build()
        .unwrap();
    let err = cache.put_json("FI", r#"{"code":"FI","name":"Finland","population":1}"#);
    assert!(matches!(err, Err(MimirError::IllegalState(_))));
}

// ============================================================================
// Expiration and introspection
// ============================================================================

#[tokio::test]
async fn expiration_can_be_changed_and_cleared() {
    let cache = DataMapCache::builder("basic")
        .loader(FixedLoader(vec![("k1", 1)]))
        .expiration("2.5 minutes")
        .build()
        .unwrap();
    assert_eq!(cache.expiration(), "2.5 minutes");
    assert_eq!(cache.expiry(), Some(Duration::from_secs(150)));

    cache.set_expiration("8 HOURS").unwrap();
    assert_eq!(cache.expiry(), Some(Duration::from_secs(8 * 3600)));

    let err = cache.set_expiration("8 FORTNIGHTS").unwrap_err();
    assert!(matches!(err, MimirError::Configuration(_)));
    assert_eq!(cache.expiration(), "8 HOURS");

    cache.set_expiration("").unwrap();
    assert_eq!(cache.expiration(), "");
    assert_eq!(cache.expiry(), None);
}

#[tokio::test]
async fn info_and_debug_string() {
    let cache = DataMapCache::builder("basic")
        .loader(FixedLoader(vec![("k1", 1), ("k2", 2)]))
        .expiration("1 HOURS")
        .build()
        .unwrap();
    let before = cache.info();
    assert_eq!(before.status, CacheStatus::New);
    assert!(before.initialized_at.is_none());

    cache.initialize().await.unwrap();
    let info = cache.info();
    assert_eq!(info.name, "basic");
    assert_eq!(info.status, CacheStatus::Ready);
    assert_eq!(info.source, SourceKind::Custom);
    assert_eq!(info.expiration, "1 HOURS");
    assert_eq!(info.size, 2);
    assert_eq!(info.age, "0 hours, 0 minutes, 0 seconds");
    assert!(info.profile.is_none());

    let debug: serde_json::Value = serde_json::from_str(&cache.to_debug_string().unwrap()).unwrap();
    assert_eq!(debug["name"], "basic");
    assert_eq!(debug["status"], "READY");
    assert_eq!(debug["source"], "CUSTOM");
}

#[tokio::test]
async fn works_through_managed_cache_trait() {
    let cache: Arc<dyn ManagedCache> = Arc::new(
        DataMapCache::builder("countries")
            .loader(CountryLoader)
            .build()
            .unwrap(),
    );
    cache.initialize().await.unwrap();

    assert_eq!(cache.name(), "countries");
    assert_eq!(cache.keys(), vec!["SE"]);
    let value = cache.get_value("SE").unwrap().unwrap();
    assert_eq!(value["population"], 10_500_000);
    assert_eq!(cache.get_value("XX").unwrap(), None);
    assert!(cache.get_yaml("SE").unwrap().contains("code: SE"));
    assert!(cache.refresh().await.unwrap());
}
