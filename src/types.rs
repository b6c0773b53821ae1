//! Shared cache types: lifecycle status, source kinds and the info snapshot
//! used by management surfaces.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Bounds every cached value type must satisfy.
///
/// Values are cloned out of the store on lookup and must round-trip through
/// serde for the JSON/XML/YAML renderings and `put_json`.
pub trait CacheValue: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {}

impl<T> CacheValue for T where T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {}

/// Lifecycle state of a cache.
///
/// Transitions are strictly `New -> Ready -> (Refreshing -> Ready)*`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CacheStatus {
    /// Constructed, not yet loaded.
    New,
    /// Loaded and serving.
    Ready,
    /// Serving the previous data while a reload is in flight.
    Refreshing,
}

impl fmt::Display for CacheStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CacheStatus::New => "NEW",
            CacheStatus::Ready => "READY",
            CacheStatus::Refreshing => "REFRESHING",
        })
    }
}

/// Which kind of source populates a cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SourceKind {
    /// Nothing configured; loading fails.
    None,
    Rest,
    Jdbc,
    File,
    Custom,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SourceKind::None => "NONE",
            SourceKind::Rest => "REST",
            SourceKind::Jdbc => "JDBC",
            SourceKind::File => "FILE",
            SourceKind::Custom => "CUSTOM",
        })
    }
}

/// Point-in-time description of a cache, for management and debugging.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheInfo {
    pub name: String,
    pub status: CacheStatus,
    pub source: SourceKind,
    /// Expiration spec, empty when auto-refresh is disabled.
    pub expiration: String,
    pub size: usize,
    /// Time since the last successful load, human formatted.
    pub age: String,
    pub initialized_at: Option<DateTime<Utc>>,
    pub refreshed_at: Option<DateTime<Utc>>,
    /// Profile prefix, property caches only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<String>,
    /// Configuration file URL, property caches only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_url: Option<String>,
}
