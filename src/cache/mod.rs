//! Caching subsystem.
//!
//! Two cache types share one lifecycle:
//!
//! - [`DataMapCache`]: a named map of `V` values populated from a REST
//!   endpoint, a query, or caller code. See [`source`](crate::source).
//!
//! - [`PropertyCache`]: string properties read from a properties or YAML
//!   file (optionally scoped to a profile), overlaid with an optional
//!   secondary source.
//!
//! Both go `NEW -> READY` on [`initialize()`](DataMapCache::initialize) and
//! `READY -> REFRESHING -> READY` on every refresh. Refreshes build a new
//! [`KeyValueStore`] and swap it in whole; readers are never blocked and
//! never see a half-loaded store. Completed loads are announced through a
//! [`CacheNotifier`].

pub mod data_map;
pub mod event;
pub mod expiry;
pub mod property;
pub mod store;

pub use data_map::{DataMapCache, DataMapCacheBuilder};
pub use event::{CacheEvent, CacheEventKind, CacheListener, CacheNotifier, ListenerError};
pub use expiry::{Expiration, TimeUnit, format_age};
pub use property::{PropertyCache, PropertyCacheBuilder};
pub use store::KeyValueStore;
