//! Data sources that (re)populate a cache.
//!
//! A cache has exactly one [`CacheSource`], chosen on its builder and fixed
//! for the cache's lifetime:
//!
//! - [`RestSource`]: GET a JSON array and key each element.
//! - [`JdbcSource`]: run a query through a [`QueryExecutor`] and map rows.
//! - [`CacheLoader`]: arbitrary caller code.
//!
//! Property caches additionally read a [`FileSource`] (properties or YAML,
//! from `classpath:`, `file:` or `http(s)://` URLs) before their optional
//! secondary source.
//!
//! Sources fill the store they are handed and report failures as
//! [`LoadError`]; they never see the cache itself.

pub mod file;
pub mod jdbc;
pub mod properties;
pub mod resource;
pub mod rest;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

pub use file::{FileSource, PropertyFormat};
pub use jdbc::{JdbcSource, QueryExecutor, Row};
pub use resource::ResourceLoader;
pub use rest::{RestSource, field_key};

use crate::cache::KeyValueStore;
use crate::error::LoadError;
use crate::types::SourceKind;
use crate::version;

/// HTTP client used when the caller does not supply one.
pub(crate) fn default_client() -> reqwest::Client {
    reqwest::Client::builder()
        .user_agent(version::user_agent())
        .build()
        .unwrap_or_default()
}

/// Caller-supplied load routine.
///
/// ```rust
/// # use mimir::source::CacheLoader;
/// # use mimir::cache::KeyValueStore;
/// # use mimir::error::LoadError;
/// struct Static;
///
/// #[async_trait::async_trait]
/// impl CacheLoader<i64> for Static {
///     async fn load(&self, store: &KeyValueStore<i64>) -> Result<(), LoadError> {
///         store.put("k1", 1);
///         store.put("k2", 2);
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait CacheLoader<V>: Send + Sync {
    /// Populate `store`. On error the store is discarded by the caller.
    async fn load(&self, store: &KeyValueStore<V>) -> Result<(), LoadError>;
}

/// How a cache is populated.
pub enum CacheSource<V> {
    Rest(RestSource<V>),
    Jdbc(JdbcSource<V>),
    Custom(Arc<dyn CacheLoader<V>>),
}

impl<V> CacheSource<V>
where
    V: serde::de::DeserializeOwned + Send + Sync,
{
    /// Wrap a custom loader.
    pub fn custom(loader: impl CacheLoader<V> + 'static) -> Self {
        CacheSource::Custom(Arc::new(loader))
    }

    pub fn kind(&self) -> SourceKind {
        match self {
            CacheSource::Rest(_) => SourceKind::Rest,
            CacheSource::Jdbc(_) => SourceKind::Jdbc,
            CacheSource::Custom(_) => SourceKind::Custom,
        }
    }

    /// Populate `store` from this source.
    pub async fn load(&self, store: &KeyValueStore<V>) -> Result<(), LoadError> {
        match self {
            CacheSource::Rest(source) => source.load(store).await,
            CacheSource::Jdbc(source) => source.load(store).await,
            CacheSource::Custom(loader) => loader.load(store).await,
        }
    }
}

impl<V> From<RestSource<V>> for CacheSource<V> {
    fn from(source: RestSource<V>) -> Self {
        CacheSource::Rest(source)
    }
}

impl<V> From<JdbcSource<V>> for CacheSource<V> {
    fn from(source: JdbcSource<V>) -> Self {
        CacheSource::Jdbc(source)
    }
}

impl<V> fmt::Debug for CacheSource<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheSource::Rest(source) => f.debug_tuple("Rest").field(&source.url()).finish(),
            CacheSource::Jdbc(source) => f.debug_tuple("Jdbc").field(&source.query()).finish(),
            CacheSource::Custom(_) => f.write_str("Custom"),
        }
    }
}
