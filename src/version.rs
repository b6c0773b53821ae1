//! Version information.

/// Package version from Cargo.toml.
pub const PKG_VERSION: &str = env!("CARGO_PKG_VERSION");

/// `User-Agent` sent by the built-in HTTP sources: `mimir/{version}`.
pub fn user_agent() -> String {
    format!("mimir/{PKG_VERSION}")
}
