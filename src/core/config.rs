use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use serde::Deserialize;
use crate::core::error::{Error, ErrorKind, Result};

pub const ENV_ENGINE: &str = "TALLYDEX_ENGINE";
pub const ENV_ENGINE_URL: &str = "TALLYDEX_ENGINE_URL";
pub const ENV_BULK_MAX_DOCS: &str = "TALLYDEX_BULK_MAX_DOCS";
pub const ENV_MIGRATE_ON_STARTUP: &str = "TALLYDEX_MIGRATE_ON_STARTUP";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub engine: EngineConfig,
    pub bulk: BulkConfig,
    pub fan_in: FanInConfig,
    pub migrate_on_startup: bool,        // Run the migration sweep inside bootstrap
    pub registry_path: Option<PathBuf>,  // File-backed version registry, memory when unset
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    Http,
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub kind: EngineKind,
    pub url: String,
    pub request_timeout_secs: u64,
    pub legacy_mapping_types: bool,  // Send `_type` on bulk items and mapping calls
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BulkConfig {
    pub max_batch_docs: usize,  // Documents per bulk request
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FanInConfig {
    pub partition_queue_depth: usize,
    pub combined_queue_depth: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            engine: EngineConfig::default(),
            bulk: BulkConfig::default(),
            fan_in: FanInConfig::default(),
            migrate_on_startup: true,
            registry_path: None,
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            kind: EngineKind::Http,
            url: "http://localhost:9200".to_string(),
            request_timeout_secs: 30,
            legacy_mapping_types: false,
        }
    }
}

impl EngineConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for BulkConfig {
    fn default() -> Self {
        BulkConfig {
            max_batch_docs: 1000,
        }
    }
}

impl Default for FanInConfig {
    fn default() -> Self {
        FanInConfig {
            partition_queue_depth: 1,  // Producers hand records over one at a time
            combined_queue_depth: 1,
        }
    }
}

impl Config {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Applies process environment overrides on top of this configuration.
    pub fn apply_env(self) -> Result<Self> {
        self.apply_env_with(|key| std::env::var(key).ok())
    }

    /// Applies overrides from a custom lookup, used by tests.
    pub fn apply_env_with<F>(mut self, get_env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(kind) = get_env(ENV_ENGINE) {
            self.engine.kind = match kind.as_str() {
                "http" => EngineKind::Http,
                "memory" => EngineKind::Memory,
                other => {
                    return Err(Error::new(
                        ErrorKind::Config,
                        format!("{} must be 'http' or 'memory', got '{}'", ENV_ENGINE, other),
                    ));
                }
            };
        }
        if let Some(url) = get_env(ENV_ENGINE_URL) {
            self.engine.url = url;
        }
        if let Some(raw) = get_env(ENV_BULK_MAX_DOCS) {
            self.bulk.max_batch_docs = raw.parse().map_err(|_| {
                Error::new(
                    ErrorKind::Config,
                    format!("{} must be a positive integer, got '{}'", ENV_BULK_MAX_DOCS, raw),
                )
            })?;
        }
        if let Some(raw) = get_env(ENV_MIGRATE_ON_STARTUP) {
            self.migrate_on_startup = matches!(raw.as_str(), "1" | "true" | "yes");
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        if self.bulk.max_batch_docs == 0 {
            return Err(Error::new(ErrorKind::Config, "bulk.max_batch_docs must be at least 1".to_string()));
        }
        if self.fan_in.partition_queue_depth == 0 || self.fan_in.combined_queue_depth == 0 {
            return Err(Error::new(ErrorKind::Config, "fan-in queue depths must be at least 1".to_string()));
        }
        if self.engine.kind == EngineKind::Http && self.engine.url.is_empty() {
            return Err(Error::new(ErrorKind::Config, "engine.url is required for the http engine".to_string()));
        }
        Ok(())
    }
}
