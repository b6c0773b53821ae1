//! Management daemon support.
//!
//! This module provides:
//! - TOML configuration for `mimird` and building caches from it (`config`)
//! - The axum management router over a [`CacheRegistry`](crate::CacheRegistry) (`routes`)

pub mod config;
pub mod routes;

pub use config::Config;
pub use routes::{ApiError, create_router};
