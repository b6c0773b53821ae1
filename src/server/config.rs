//! Configuration loading for mimird.
//!
//! Configuration is loaded from TOML files with the following resolution order:
//! 1. `--config <path>` (CLI flag)
//! 2. `~/.mimir/config.toml` (user)
//! 3. `/etc/mimir/config.toml` (system)
//!
//! ```toml
//! [server]
//! address = "127.0.0.1:9750"
//!
//! [scheduler]
//! interval_secs = 60
//!
//! [resources]
//! classpath_root = "/opt/app/resources"
//!
//! [[property_cache]]
//! name = "settings"
//! url = "classpath:application.properties"
//! profile = "prod"
//! expiration = "30 MINUTES"
//!
//! [[rest_cache]]
//! name = "countries"
//! url = "https://api.example.com/countries"
//! key_field = "code"
//! expiration = "8 HOURS"
//! timeout_secs = 10
//! ```

use serde::Deserialize;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::cache::{CacheNotifier, DataMapCache, PropertyCache};
use crate::scheduler::SchedulerConfig;
use crate::source::{PropertyFormat, ResourceLoader, RestSource, field_key};
use crate::{CacheRegistry, MimirError, Result};

/// Daemon configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub scheduler: SchedulerSection,
    #[serde(default)]
    pub resources: ResourcesConfig,
    #[serde(default)]
    pub property_cache: Vec<PropertyCacheConfig>,
    #[serde(default)]
    pub rest_cache: Vec<RestCacheConfig>,
}

/// Server network configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Address to bind to (default: 127.0.0.1:9750).
    #[serde(default = "default_address")]
    pub address: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
        }
    }
}

fn default_address() -> String {
    "127.0.0.1:9750".to_string()
}

/// Refresh scheduler timing.
#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerSection {
    /// Seconds between expiry checks (default: 300).
    #[serde(default = "default_interval")]
    pub interval_secs: u64,
}

impl Default for SchedulerSection {
    fn default() -> Self {
        Self {
            interval_secs: default_interval(),
        }
    }
}

fn default_interval() -> u64 {
    300
}

impl SchedulerSection {
    pub fn to_scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig::new().interval(Duration::from_secs(self.interval_secs.max(1)))
    }
}

/// Where `classpath:` URLs are resolved.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResourcesConfig {
    /// Default: the working directory.
    #[serde(default)]
    pub classpath_root: Option<PathBuf>,
}

/// A property cache backed by a file.
#[derive(Debug, Clone, Deserialize)]
pub struct PropertyCacheConfig {
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub profile: Option<String>,
    /// `properties` or `yaml`. Default: from the file extension.
    #[serde(default)]
    pub format: Option<PropertyFormat>,
    #[serde(default)]
    pub expiration: Option<String>,
}

/// A cache of JSON objects fetched from a REST endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct RestCacheConfig {
    pub name: String,
    pub url: String,
    /// Field of each element used as its key.
    pub key_field: String,
    #[serde(default)]
    pub expiration: Option<String>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl Config {
    /// Load configuration from the standard locations.
    ///
    /// Resolution order:
    /// 1. Explicit path (if provided)
    /// 2. `~/.mimir/config.toml`
    /// 3. `/etc/mimir/config.toml`
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        let path = Self::resolve_config_path(explicit_path)?;
        let content = fs::read_to_string(&path).map_err(|e| {
            MimirError::Configuration(format!("Failed to read config file {path:?}: {e}"))
        })?;
        Self::parse(&content).map_err(|e| match e {
            MimirError::Configuration(msg) => {
                MimirError::Configuration(format!("Failed to parse config file {path:?}: {msg}"))
            }
            other => other,
        })
    }

    /// Parse configuration text.
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| MimirError::Configuration(e.to_string()))
    }

    /// Resolve the config file path.
    fn resolve_config_path(explicit: Option<&Path>) -> Result<PathBuf> {
        if let Some(path) = explicit {
            if path.exists() {
                return Ok(path.to_path_buf());
            }
            return Err(MimirError::Configuration(format!(
                "Config file not found: {path:?}"
            )));
        }

        // User config
        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".mimir").join("config.toml");
            if user_config.exists() {
                return Ok(user_config);
            }
        }

        // System config
        let system_config = PathBuf::from("/etc/mimir/config.toml");
        if system_config.exists() {
            return Ok(system_config);
        }

        Err(MimirError::Configuration(
            "No config file found. Create ~/.mimir/config.toml or /etc/mimir/config.toml"
                .to_string(),
        ))
    }

    /// Build every configured cache into a registry. Caches are left NEW.
    pub fn build_registry(&self, notifier: Arc<CacheNotifier>) -> Result<CacheRegistry> {
        let registry = CacheRegistry::new();
        let mut resources = ResourceLoader::new();
        if let Some(root) = &self.resources.classpath_root {
            resources = resources.with_classpath_root(root);
        }

        for entry in &self.property_cache {
            let mut builder = PropertyCache::builder(&entry.name)
                .config_url(&entry.url)
                .resource_loader(resources.clone())
                .notifier(Arc::clone(&notifier));
            if let Some(profile) = &entry.profile {
                builder = builder.profile(profile);
            }
            if let Some(format) = entry.format {
                builder = builder.format(format);
            }
            if let Some(expiration) = &entry.expiration {
                builder = builder.expiration(expiration);
            }
            registry.register(Arc::new(builder.build()?))?;
        }

        for entry in &self.rest_cache {
            let key_field = entry.key_field.clone();
            let mut source = RestSource::try_new(&entry.url, move |item: &Value| {
                field_key(item, &key_field)
            });
            if let Some(secs) = entry.timeout_secs {
                source = source.timeout(Duration::from_secs(secs));
            }
            let mut builder = DataMapCache::<Value>::builder(&entry.name)
                .rest_source(source)
                .notifier(Arc::clone(&notifier));
            if let Some(expiration) = &entry.expiration {
                builder = builder.expiration(expiration);
            }
            registry.register(Arc::new(builder.build()?))?;
        }

        Ok(registry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_expected_values() {
        let config = Config::default();
        assert_eq!(config.server.address, "127.0.0.1:9750");
        assert_eq!(config.scheduler.interval_secs, 300);
        assert!(config.property_cache.is_empty());
        assert!(config.rest_cache.is_empty());
    }

    #[test]
    fn parse_minimal_config() {
        let config = Config::parse(
            r#"
            [server]
            address = "0.0.0.0:9750"
        "#,
        )
        .unwrap();
        assert_eq!(config.server.address, "0.0.0.0:9750");
        // Defaults preserved
        assert_eq!(config.scheduler.interval_secs, 300);
    }

    #[test]
    fn parse_full_config() {
        let config = Config::parse(
            r#"
            [scheduler]
            interval_secs = 30

            [resources]
            classpath_root = "/opt/app"

            [[property_cache]]
            name = "settings"
            url = "classpath:app.yml"
            profile = "dev"
            format = "yaml"
            expiration = "5 MINUTES"

            [[rest_cache]]
            name = "users"
            url = "http://localhost/users"
            key_field = "id"
            timeout_secs = 5
        "#,
        )
        .unwrap();
        assert_eq!(config.scheduler.interval_secs, 30);
        assert_eq!(
            config.resources.classpath_root,
            Some(PathBuf::from("/opt/app"))
        );
        let props = &config.property_cache[0];
        assert_eq!(props.format, Some(PropertyFormat::Yaml));
        assert_eq!(props.profile.as_deref(), Some("dev"));
        assert_eq!(config.rest_cache[0].key_field, "id");
        assert_eq!(config.rest_cache[0].timeout_secs, Some(5));
    }

    #[test]
    fn invalid_toml_is_configuration_error() {
        let err = Config::parse("[server").unwrap_err();
        assert!(matches!(err, MimirError::Configuration(_)));
    }

    #[test]
    fn missing_explicit_path_is_error() {
        let err = Config::load(Some(Path::new("/nonexistent/mimir.toml"))).unwrap_err();
        assert!(err.to_string().contains("Config file not found"));
    }

    #[test]
    fn build_registry_registers_all_caches() {
        let config = Config::parse(
            r#"
            [[property_cache]]
            name = "settings"
            url = "classpath:app.properties"

            [[rest_cache]]
            name = "users"
            url = "http://localhost/users"
            key_field = "id"
            expiration = "1 HOURS"
        "#,
        )
        .unwrap();
        let registry = config.build_registry(Arc::new(CacheNotifier::new())).unwrap();
        assert_eq!(registry.names(), vec!["settings", "users"]);
    }

    #[test]
    fn duplicate_names_rejected() {
        let config = Config::parse(
            r#"
            [[property_cache]]
            name = "dup"
            url = "a.properties"

            [[property_cache]]
            name = "dup"
            url = "b.properties"
        "#,
        )
        .unwrap();
        assert!(config.build_registry(Arc::new(CacheNotifier::new())).is_err());
    }
}
