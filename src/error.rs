//! Mimir error types

use crate::format::Format;

/// Mimir error types
#[derive(Debug, thiserror::Error)]
pub enum MimirError {
    // Lifecycle errors
    /// An operation was invoked in a lifecycle state that does not allow it.
    #[error("illegal state: {0}")]
    IllegalState(String),

    // Load errors
    /// The configured source failed to produce data.
    #[error("failed to load cache [{cache}]: {source}")]
    CacheLoad {
        cache: String,
        #[source]
        source: LoadError,
    },

    // Data errors
    #[error("{format} serialization failed: {message}")]
    Serialization { format: Format, message: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Configuration errors
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("cache not found: {0}")]
    CacheNotFound(String),
}

impl MimirError {
    /// Wrap a source failure with the name of the cache it happened in.
    pub fn load(cache: impl Into<String>, source: LoadError) -> Self {
        MimirError::CacheLoad {
            cache: cache.into(),
            source,
        }
    }

    /// Whether this error came out of a source load.
    pub fn is_load_error(&self) -> bool {
        matches!(self, MimirError::CacheLoad { .. })
    }
}

/// Underlying cause of a failed cache load.
///
/// Sources report these without knowing which cache they feed; the cache
/// wraps them into [`MimirError::CacheLoad`] with its name attached.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("no cache source provided")]
    NoSource,

    // Remote sources
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },

    #[error("response is not a JSON array")]
    NotArray,

    #[error("invalid element at index {index}: {source}")]
    Element {
        index: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // Query sources
    #[error("query failed: {0}")]
    Query(String),

    #[error("failed to extract {what}: {message}")]
    Extract { what: &'static str, message: String },

    // File sources
    #[error("failed to read resource {url}: {message}")]
    Resource { url: String, message: String },

    #[error("failed to parse {url}: {message}")]
    Parse { url: String, message: String },

    /// Failure reported by a custom loader.
    #[error("{0}")]
    Custom(String),
}

impl LoadError {
    /// Build a [`LoadError::Custom`] from anything displayable.
    pub fn custom(message: impl std::fmt::Display) -> Self {
        LoadError::Custom(message.to_string())
    }
}

/// Result type alias for Mimir operations
pub type Result<T> = std::result::Result<T, MimirError>;
