//! Reading text resources addressed by URL.
//!
//! Supported forms:
//!
//! - `classpath:path/to/file`, relative to the loader's classpath root
//! - `file:///abs/path` or `file:relative/path`
//! - `http://...` and `https://...`
//! - a bare filesystem path

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::LoadError;

const CLASSPATH_PREFIX: &str = "classpath:";
const FILE_PREFIX: &str = "file:";

/// Where a resource URL points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    Path(PathBuf),
    Http(String),
}

/// Resolves and reads resource URLs.
#[derive(Debug, Clone)]
pub struct ResourceLoader {
    classpath_root: PathBuf,
    client: reqwest::Client,
}

impl Default for ResourceLoader {
    fn default() -> Self {
        Self {
            classpath_root: PathBuf::from("."),
            client: super::default_client(),
        }
    }
}

impl ResourceLoader {
    /// Loader with the current directory as classpath root.
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve `classpath:` URLs against `root`.
    pub fn with_classpath_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.classpath_root = root.into();
        self
    }

    /// Use a shared HTTP client.
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    pub fn classpath_root(&self) -> &Path {
        &self.classpath_root
    }

    /// Work out where `url` points without reading it.
    pub fn resolve(&self, url: &str) -> Result<Location, LoadError> {
        if let Some(rest) = url.strip_prefix(CLASSPATH_PREFIX) {
            return Ok(Location::Path(
                self.classpath_root.join(rest.trim_start_matches('/')),
            ));
        }
        if url.starts_with("http://") || url.starts_with("https://") {
            return Ok(Location::Http(url.to_string()));
        }
        if let Some(rest) = url.strip_prefix(FILE_PREFIX) {
            if !rest.starts_with("//") {
                return Ok(Location::Path(PathBuf::from(rest)));
            }
            let parsed = url::Url::parse(url).map_err(|e| LoadError::Resource {
                url: url.to_string(),
                message: e.to_string(),
            })?;
            return parsed
                .to_file_path()
                .map(Location::Path)
                .map_err(|()| LoadError::Resource {
                    url: url.to_string(),
                    message: "not a local file URL".into(),
                });
        }
        if let Some((scheme, _)) = url.split_once("://") {
            return Err(LoadError::Resource {
                url: url.to_string(),
                message: format!("unsupported scheme '{scheme}'"),
            });
        }
        Ok(Location::Path(PathBuf::from(url)))
    }

    /// Read the whole resource as UTF-8 text.
    pub async fn read_to_string(&self, url: &str) -> Result<String, LoadError> {
        let resource_error = |message: String| LoadError::Resource {
            url: url.to_string(),
            message,
        };

        match self.resolve(url)? {
            Location::Path(path) => {
                debug!(url, path = %path.display(), "reading resource file");
                tokio::fs::read_to_string(&path)
                    .await
                    .map_err(|e| resource_error(format!("{}: {e}", path.display())))
            }
            Location::Http(target) => {
                debug!(url, "fetching resource");
                let response = self
                    .client
                    .get(&target)
                    .send()
                    .await
                    .map_err(|e| resource_error(e.to_string()))?;
                if !response.status().is_success() {
                    return Err(resource_error(format!("HTTP {}", response.status())));
                }
                response
                    .text()
                    .await
                    .map_err(|e| resource_error(e.to_string()))
            }
        }
    }
}
