//! Mimir - named, refreshable in-memory caches
//!
//! This crate provides key-value caches that load their contents from a
//! pluggable source (a REST endpoint, a query, a property file or caller
//! code), refresh themselves in the background when their data expires, and
//! announce every completed load to registered listeners.
//!
//! Reads never block on a refresh: each refresh fills a fresh store and swaps
//! it in atomically, so readers see either the old or the new data in full.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use mimir::source::RestSource;
//! use mimir::{DataMapCache, ManagedCache, RefreshScheduler, SchedulerConfig};
//!
//! #[derive(Clone, serde::Serialize, serde::Deserialize)]
//! struct Country {
//!     code: String,
//!     name: String,
//! }
//!
//! #[tokio::main]
//! async fn main() -> mimir::Result<()> {
//!     let countries = Arc::new(
//!         DataMapCache::<Country>::builder("countries")
//!             .rest_source(RestSource::new(
//!                 "https://api.example.com/countries",
//!                 |c: &Country| c.code.clone(),
//!             ))
//!             .expiration("8 HOURS")
//!             .build()?,
//!     );
//!     countries.initialize().await?;
//!
//!     let _scheduler = RefreshScheduler::spawn(countries.clone(), &SchedulerConfig::default());
//!
//!     if let Some(country) = countries.get("NO") {
//!         println!("{}", country.name);
//!     }
//!     println!("{}", countries.get_yaml("NO")?);
//!     Ok(())
//! }
//! ```
//!
//! # Properties Example
//!
//! ```rust,no_run
//! use mimir::PropertyCache;
//!
//! #[tokio::main]
//! async fn main() -> mimir::Result<()> {
//!     let props = PropertyCache::builder("settings")
//!         .config_url("classpath:application.properties")
//!         .profile("prod")
//!         .build()?;
//!     props.initialize().await?;
//!
//!     if props.is_true(&["feature", "enabled"]) {
//!         let hosts = props.get_property_list(&["cluster", "hosts"]);
//!         println!("{hosts:?}");
//!     }
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod error;
pub mod format;
pub mod registry;
pub mod scheduler;
#[cfg(feature = "server")]
pub mod server;
pub mod source;
pub mod telemetry;
pub mod traits;
pub mod types;
pub mod version;

// Re-export main types at crate root
pub use cache::{
    CacheEvent, CacheEventKind, CacheListener, CacheNotifier, DataMapCache, KeyValueStore,
    PropertyCache,
};
pub use error::{LoadError, MimirError, Result};
pub use format::Format;
pub use registry::CacheRegistry;
pub use scheduler::{RefreshScheduler, SchedulerConfig};
pub use traits::ManagedCache;
pub use types::{CacheInfo, CacheStatus, CacheValue, SourceKind};
