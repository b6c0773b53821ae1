//! String-valued cache for application properties.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use super::data_map::DataMapCache;
use super::event::{CacheListener, CacheNotifier};
use super::store::KeyValueStore;
use crate::error::LoadError;
use crate::format::Format;
use crate::source::jdbc::column_string;
use crate::source::{
    CacheLoader, CacheSource, FileSource, JdbcSource, PropertyFormat, QueryExecutor,
    ResourceLoader,
};
use crate::{CacheInfo, CacheStatus, ManagedCache, Result, SourceKind};

const DEFAULT_KEY_COLUMN: &str = "KEY";
const DEFAULT_VALUE_COLUMN: &str = "VALUE";

/// A cache of string properties read from a properties or YAML file, with
/// an optional secondary source (typically a query) whose entries override
/// the file's.
///
/// With a profile set, only `<profile>.`-prefixed file keys are loaded and
/// the prefix is stripped, so lookups never mention the profile:
///
/// ```rust,no_run
/// # use mimir::PropertyCache;
/// # async fn example() -> mimir::Result<()> {
/// let props = PropertyCache::builder("app")
///     .config_url("classpath:app.properties")
///     .profile("dev")
///     .build()?;
/// props.initialize().await?;
/// let url = props.get(&["db", "url"]); // stored as "dev.db.url"
/// let hosts = props.get_property_list(&["cluster", "hosts"]);
/// # Ok(())
/// # }
/// ```
pub struct PropertyCache {
    cache: DataMapCache<String>,
    profile: Option<String>,
    config_url: Option<String>,
    format: PropertyFormat,
}

impl PropertyCache {
    pub fn builder(name: impl Into<String>) -> PropertyCacheBuilder {
        PropertyCacheBuilder::new(name)
    }

    /// The underlying cache.
    pub fn cache(&self) -> &DataMapCache<String> {
        &self.cache
    }

    pub async fn initialize(&self) -> Result<()> {
        self.cache.initialize_as(self).await
    }

    pub async fn refresh(&self) -> Result<bool> {
        self.cache.refresh_as(self).await
    }

    pub async fn check_refresh(&self) -> bool {
        self.cache.check_refresh_as(self).await
    }

    // ===== Lookups =====

    /// Look up the property at the dot-joined path.
    pub fn get(&self, path: &[&str]) -> Option<String> {
        self.cache.get(&path.join("."))
    }

    /// Comma-separated property as a list of trimmed items. Empty when the
    /// property is absent. Trailing empty items are dropped, inner ones kept.
    pub fn get_property_list(&self, path: &[&str]) -> Vec<String> {
        self.get(path).map(|value| split_list(&value)).unwrap_or_default()
    }

    /// Whether the property equals `"true"`.
    pub fn is_true(&self, path: &[&str]) -> bool {
        self.has_value("true", path)
    }

    /// Whether the property exists and equals `expected`.
    pub fn has_value(&self, expected: &str, path: &[&str]) -> bool {
        self.get(path).as_deref() == Some(expected)
    }

    // ===== Mutations =====

    pub fn put(&self, key: impl Into<String>, value: impl Into<String>) -> Result<Option<String>> {
        self.cache.put(key, value.into())
    }

    /// Store a JSON string literal as its content; any other text is stored
    /// verbatim.
    pub fn put_json(&self, key: &str, json: &str) -> Result<()> {
        let value = match serde_json::from_str::<Value>(json) {
            Ok(Value::String(s)) => s,
            _ => json.to_string(),
        };
        self.cache.put(key, value).map(|_| ())
    }

    pub fn remove(&self, key: &str) -> Result<Option<String>> {
        self.cache.remove(key)
    }

    pub fn set_expiration(&self, spec: &str) -> Result<()> {
        self.cache.set_expiration(spec)
    }

    pub fn add_listener(&self, listener: Arc<dyn CacheListener>) {
        self.cache.add_listener(listener);
    }

    // ===== Introspection =====

    pub fn name(&self) -> &str {
        self.cache.name()
    }

    pub fn status(&self) -> CacheStatus {
        self.cache.status()
    }

    pub fn size(&self) -> usize {
        self.cache.size()
    }

    pub fn keys(&self) -> Vec<String> {
        self.cache.keys()
    }

    pub fn profile(&self) -> Option<&str> {
        self.profile.as_deref()
    }

    pub fn config_url(&self) -> Option<&str> {
        self.config_url.as_deref()
    }

    pub fn format(&self) -> PropertyFormat {
        self.format
    }

    pub fn info(&self) -> CacheInfo {
        CacheInfo {
            profile: self.profile.clone(),
            config_url: self.config_url.clone(),
            ..self.cache.info()
        }
    }
}

#[async_trait]
impl ManagedCache for PropertyCache {
    fn name(&self) -> &str {
        self.cache.name()
    }

    fn status(&self) -> CacheStatus {
        self.cache.status()
    }

    fn source_kind(&self) -> SourceKind {
        self.cache.source_kind()
    }

    fn size(&self) -> usize {
        self.cache.size()
    }

    fn keys(&self) -> Vec<String> {
        self.cache.keys()
    }

    fn info(&self) -> CacheInfo {
        PropertyCache::info(self)
    }

    fn get_value(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.cache.get(key).map(Value::String))
    }

    fn render(&self, key: &str, format: Format) -> Result<String> {
        self.cache.render(key, format)
    }

    fn put_json(&self, key: &str, json: &str) -> Result<()> {
        PropertyCache::put_json(self, key, json)
    }

    fn set_expiration(&self, spec: &str) -> Result<()> {
        self.cache.set_expiration(spec)
    }

    async fn initialize(&self) -> Result<()> {
        PropertyCache::initialize(self).await
    }

    async fn refresh(&self) -> Result<bool> {
        PropertyCache::refresh(self).await
    }

    async fn check_refresh(&self) -> bool {
        PropertyCache::check_refresh(self).await
    }
}

impl std::fmt::Debug for PropertyCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PropertyCache")
            .field("cache", &self.cache)
            .field("profile", &self.profile)
            .field("config_url", &self.config_url)
            .field("format", &self.format)
            .finish()
    }
}

/// Reads the file, then the secondary source, into one store.
struct PropertyLoader {
    file: Option<FileSource>,
    secondary: Option<CacheSource<String>>,
}

#[async_trait]
impl CacheLoader<String> for PropertyLoader {
    async fn load(&self, store: &KeyValueStore<String>) -> std::result::Result<(), LoadError> {
        if let Some(file) = &self.file {
            file.load(store).await?;
        }
        if let Some(secondary) = &self.secondary {
            secondary.load(store).await?;
        }
        Ok(())
    }
}

struct PendingQuery {
    executor: Arc<dyn QueryExecutor>,
    sql: String,
    params: Vec<Value>,
}

/// Builder for [`PropertyCache`].
pub struct PropertyCacheBuilder {
    name: String,
    config_url: Option<String>,
    profile: Option<String>,
    format: Option<PropertyFormat>,
    resources: ResourceLoader,
    secondary: Option<CacheSource<String>>,
    query: Option<PendingQuery>,
    key_column: String,
    value_column: String,
    expiration: Option<String>,
    notifier: Option<Arc<CacheNotifier>>,
}

impl PropertyCacheBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            config_url: None,
            profile: None,
            format: None,
            resources: ResourceLoader::default(),
            secondary: None,
            query: None,
            key_column: DEFAULT_KEY_COLUMN.to_string(),
            value_column: DEFAULT_VALUE_COLUMN.to_string(),
            expiration: None,
            notifier: None,
        }
    }

    /// Property file to load, e.g. `classpath:app.properties`.
    pub fn config_url(mut self, url: impl Into<String>) -> Self {
        self.config_url = Some(url.into());
        self
    }

    pub fn profile(mut self, profile: impl Into<String>) -> Self {
        self.profile = Some(profile.into());
        self
    }

    /// File format. Default: guessed from the URL's extension.
    pub fn format(mut self, format: PropertyFormat) -> Self {
        self.format = Some(format);
        self
    }

    /// How `classpath:`, `file:` and HTTP URLs are read.
    pub fn resource_loader(mut self, resources: ResourceLoader) -> Self {
        self.resources = resources;
        self
    }

    /// Load key/value rows from a query, using the key and value column
    /// names (default `KEY` and `VALUE`).
    pub fn query_source(
        mut self,
        executor: Arc<dyn QueryExecutor>,
        sql: impl Into<String>,
        params: Vec<Value>,
    ) -> Self {
        self.secondary = None;
        self.query = Some(PendingQuery {
            executor,
            sql: sql.into(),
            params,
        });
        self
    }

    pub fn jdbc_source(mut self, source: JdbcSource<String>) -> Self {
        self.query = None;
        self.secondary = Some(source.into());
        self
    }

    pub fn loader(mut self, loader: impl CacheLoader<String> + 'static) -> Self {
        self.query = None;
        self.secondary = Some(CacheSource::custom(loader));
        self
    }

    pub fn key_column(mut self, column: impl Into<String>) -> Self {
        self.key_column = column.into();
        self
    }

    pub fn value_column(mut self, column: impl Into<String>) -> Self {
        self.value_column = column.into();
        self
    }

    pub fn expiration(mut self, spec: impl Into<String>) -> Self {
        self.expiration = Some(spec.into());
        self
    }

    pub fn notifier(mut self, notifier: Arc<CacheNotifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn build(self) -> Result<PropertyCache> {
        let profile = self
            .profile
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty());
        let config_url = self
            .config_url
            .map(|u| u.trim().to_string())
            .filter(|u| !u.is_empty());
        let format = self.format.unwrap_or_else(|| {
            config_url
                .as_deref()
                .map_or(PropertyFormat::Properties, PropertyFormat::from_url)
        });

        let file = config_url.as_ref().map(|url| {
            let source = FileSource::new(url.clone())
                .format(format)
                .resources(self.resources.clone());
            match &profile {
                Some(profile) => source.profile(profile.clone()),
                None => source,
            }
        });

        let secondary = match self.query {
            Some(query) => {
                let (key_column, value_column) = (self.key_column, self.value_column);
                Some(CacheSource::from(
                    JdbcSource::new(
                        query.executor,
                        query.sql,
                        move |row| column_string(row, &key_column),
                        move |row| column_string(row, &value_column),
                    )
                    .params(query.params),
                ))
            }
            None => self.secondary,
        };

        let source_kind = match (&file, &secondary) {
            (Some(_), _) => SourceKind::File,
            (None, Some(secondary)) => secondary.kind(),
            (None, None) => SourceKind::None,
        };

        let mut builder = DataMapCache::<String>::builder(self.name).source_kind(source_kind);
        if file.is_some() || secondary.is_some() {
            builder = builder.loader(PropertyLoader { file, secondary });
        }
        if let Some(spec) = self.expiration {
            builder = builder.expiration(spec);
        }
        if let Some(notifier) = self.notifier {
            builder = builder.notifier(notifier);
        }

        Ok(PropertyCache {
            cache: builder.build()?,
            profile,
            config_url,
            format,
        })
    }
}

fn split_list(value: &str) -> Vec<String> {
    let mut items: Vec<String> = value.split(',').map(|item| item.trim().to_string()).collect();
    while items.last().is_some_and(String::is_empty) {
        items.pop();
    }
    items
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Entries(&'static [(&'static str, &'static str)]);

    #[async_trait]
    impl CacheLoader<String> for Entries {
        async fn load(&self, store: &KeyValueStore<String>) -> std::result::Result<(), LoadError> {
            for (k, v) in self.0 {
                store.put(*k, v.to_string());
            }
            Ok(())
        }
    }

    #[test]
    fn format_guessed_from_url() {
        let cache = PropertyCache::builder("p")
            .config_url("classpath:app.yaml")
            .build()
            .unwrap();
        assert_eq!(cache.format(), PropertyFormat::Yaml);
        assert_eq!(cache.cache().source_kind(), SourceKind::File);
    }

    #[test]
    fn secondary_only_reports_its_kind() {
        let cache = PropertyCache::builder("p")
            .loader(Entries(&[]))
            .build()
            .unwrap();
        assert_eq!(cache.cache().source_kind(), SourceKind::Custom);
        assert_eq!(cache.config_url(), None);
    }

    #[tokio::test]
    async fn lookups() {
        let cache = PropertyCache::builder("p")
            .loader(Entries(&[
                ("a.b", "x"),
                ("flag", "true"),
                ("list", "one, two ,three"),
            ]))
            .build()
            .unwrap();
        cache.initialize().await.unwrap();

        assert_eq!(cache.get(&["a", "b"]).as_deref(), Some("x"));
        assert!(cache.is_true(&["flag"]));
        assert!(!cache.is_true(&["a", "b"]));
        assert!(cache.has_value("x", &["a.b"]));
        assert_eq!(cache.get_property_list(&["list"]), vec!["one", "two", "three"]);
        assert!(cache.get_property_list(&["missing"]).is_empty());
    }

    #[test]
    fn list_drops_trailing_empty_items() {
        assert_eq!(split_list("a,,"), vec!["a"]);
        assert_eq!(split_list("a, ,b"), vec!["a", "", "b"]);
        assert_eq!(split_list(",a"), vec!["", "a"]);
        assert_eq!(split_list(" x , y "), vec!["x", "y"]);
        assert!(split_list("").is_empty());
        assert!(split_list(" , ").is_empty());
    }

    #[tokio::test]
    async fn put_json_unwraps_string_literals() {
        let cache = PropertyCache::builder("p")
            .loader(Entries(&[]))
            .build()
            .unwrap();
        cache.initialize().await.unwrap();

        cache.put_json("quoted", "\"hello\"").unwrap();
        cache.put_json("raw", "plain text").unwrap();
        cache.put_json("number", "42").unwrap();
        assert_eq!(cache.get(&["quoted"]).as_deref(), Some("hello"));
        assert_eq!(cache.get(&["raw"]).as_deref(), Some("plain text"));
        assert_eq!(cache.get(&["number"]).as_deref(), Some("42"));
    }
}
