//! Property file source.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::properties;
use super::resource::ResourceLoader;
use crate::cache::KeyValueStore;
use crate::error::LoadError;

/// On-disk format of a property file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PropertyFormat {
    #[default]
    Properties,
    Yaml,
}

impl PropertyFormat {
    /// Guess the format from a URL's extension. Anything that is not
    /// `.yml`/`.yaml` is read as properties.
    pub fn from_url(url: &str) -> Self {
        let path = url.split(['?', '#']).next().unwrap_or(url).to_ascii_lowercase();
        if path.ends_with(".yml") || path.ends_with(".yaml") {
            PropertyFormat::Yaml
        } else {
            PropertyFormat::Properties
        }
    }
}

impl fmt::Display for PropertyFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PropertyFormat::Properties => "properties",
            PropertyFormat::Yaml => "yaml",
        })
    }
}

/// Reads key/value pairs from a properties or YAML resource.
///
/// With a profile set, only keys under `<profile>.` are kept and the prefix
/// is stripped; everything else in the file is ignored.
#[derive(Debug, Clone)]
pub struct FileSource {
    url: String,
    profile: Option<String>,
    format: Option<PropertyFormat>,
    resources: ResourceLoader,
}

impl FileSource {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            profile: None,
            format: None,
            resources: ResourceLoader::default(),
        }
    }

    pub fn profile(mut self, profile: impl Into<String>) -> Self {
        let profile = profile.into();
        self.profile = (!profile.trim().is_empty()).then(|| profile.trim().to_string());
        self
    }

    /// Force a format instead of guessing from the extension.
    pub fn format(mut self, format: PropertyFormat) -> Self {
        self.format = Some(format);
        self
    }

    pub fn resources(mut self, resources: ResourceLoader) -> Self {
        self.resources = resources;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn profile_name(&self) -> Option<&str> {
        self.profile.as_deref()
    }

    /// The format in effect for this source.
    pub fn effective_format(&self) -> PropertyFormat {
        self.format.unwrap_or_else(|| PropertyFormat::from_url(&self.url))
    }

    pub async fn load(&self, store: &KeyValueStore<String>) -> Result<(), LoadError> {
        let text = self.resources.read_to_string(&self.url).await?;
        let format = self.effective_format();

        let pairs = match format {
            PropertyFormat::Properties => properties::parse(&text),
            PropertyFormat::Yaml => {
                properties::flatten_yaml(&text).map_err(|e| LoadError::Parse {
                    url: self.url.clone(),
                    message: e.to_string(),
                })?
            }
        };

        let mut loaded = 0usize;
        for (key, value) in pairs {
            if let Some(key) = self.scoped_key(key) {
                store.put(key, value);
                loaded += 1;
            }
        }
        debug!(url = %self.url, %format, profile = ?self.profile, loaded, "read property file");
        Ok(())
    }

    fn scoped_key(&self, key: String) -> Option<String> {
        let Some(profile) = &self.profile else {
            return Some(key);
        };
        let stripped = key.strip_prefix(profile.as_str())?.strip_prefix('.')?;
        (!stripped.is_empty()).then(|| stripped.to_string())
    }
}
