use std::sync::Arc;

use async_trait::async_trait;

use mimir::cache::KeyValueStore;
use mimir::source::CacheLoader;
use mimir::{CacheRegistry, CacheStatus, DataMapCache, LoadError, MimirError, SourceKind};

struct Letters(&'static [&'static str]);

#[async_trait]
impl CacheLoader<String> for Letters {
    async fn load(&self, store: &KeyValueStore<String>) -> Result<(), LoadError> {
        for letter in self.0 {
            store.put(*letter, letter.to_uppercase());
        }
        Ok(())
    }
}

fn letters(name: &str, content: &'static [&'static str]) -> Arc<DataMapCache<String>> {
    Arc::new(
        DataMapCache::builder(name)
            .loader(Letters(content))
            .expiration("8 HOURS")
            .build()
            .unwrap(),
    )
}

fn unsourced(name: &str) -> Arc<DataMapCache<String>> {
    Arc::new(DataMapCache::builder(name).build().unwrap())
}

#[test]
fn empty_registry() {
    let registry = CacheRegistry::new();
    assert!(registry.get("nonexistent").is_err());
    assert!(registry.list().is_empty());
    assert!(registry.is_empty());
    assert_eq!(registry.len(), 0);
}

#[test]
fn register_and_get() {
    let registry = CacheRegistry::new();
    registry.register(letters("abc", &["a", "b", "c"])).unwrap();

    let found = registry.get("abc").unwrap();
    assert_eq!(found.name(), "abc");
    assert_eq!(found.source_kind(), SourceKind::Custom);
    assert!(registry.contains("abc"));
    assert_eq!(registry.len(), 1);
}

#[test]
fn duplicate_name_is_rejected() {
    let registry = CacheRegistry::new();
    registry.register(letters("abc", &["a"])).unwrap();
    let err = registry.register(letters("abc", &["b"])).unwrap_err();
    assert!(matches!(err, MimirError::Configuration(_)));
    assert_eq!(registry.len(), 1);
}

#[test]
fn missing_cache_is_not_found() {
    let registry = CacheRegistry::new();
    let err = registry.get("ghost").err().unwrap();
    assert!(matches!(err, MimirError::CacheNotFound(ref name) if name == "ghost"));
}

#[test]
fn list_is_sorted_by_name() {
    let registry = CacheRegistry::new();
    registry.register(letters("zulu", &["z"])).unwrap();
    registry.register(letters("alpha", &["a"])).unwrap();
    registry.register(letters("mike", &["m"])).unwrap();

    assert_eq!(registry.names(), vec!["alpha", "mike", "zulu"]);
    let infos = registry.list();
    assert_eq!(infos.len(), 3);
    assert_eq!(infos[0].name, "alpha");
    assert_eq!(infos[0].status, CacheStatus::New);
    assert_eq!(infos[0].expiration, "8 HOURS");
}

#[test]
fn unregister_removes() {
    let registry = CacheRegistry::new();
    registry.register(letters("abc", &["a"])).unwrap();
    assert!(registry.unregister("abc").is_some());
    assert!(registry.unregister("abc").is_none());
    assert!(registry.is_empty());
}

#[tokio::test]
async fn initialize_all_loads_every_cache() {
    let registry = CacheRegistry::new();
    registry.register(letters("one", &["a", "b"])).unwrap();
    registry.register(letters("two", &["x"])).unwrap();

    registry.initialize_all().await.unwrap();

    for info in registry.list() {
        assert_eq!(info.status, CacheStatus::Ready);
        assert!(info.initialized_at.is_some());
    }
    let one = registry.get("one").unwrap();
    assert_eq!(one.size(), 2);
    assert_eq!(one.get_json("b").unwrap(), "\"B\"");
}

#[tokio::test]
async fn initialize_all_stops_at_first_failure() {
    let registry = CacheRegistry::new();
    registry.register(letters("a-good", &["a"])).unwrap();
    registry.register(unsourced("b-broken")).unwrap();
    registry.register(letters("c-never", &["c"])).unwrap();

    let err = registry.initialize_all().await.unwrap_err();
    assert!(err.is_load_error());

    assert_eq!(registry.get("a-good").unwrap().status(), CacheStatus::Ready);
    assert_eq!(registry.get("b-broken").unwrap().status(), CacheStatus::New);
    assert_eq!(registry.get("c-never").unwrap().status(), CacheStatus::New);
}

#[test]
fn debug_lists_names() {
    let registry = CacheRegistry::new();
    registry.register(letters("abc", &["a"])).unwrap();
    assert!(format!("{registry:?}").contains("abc"));
}
