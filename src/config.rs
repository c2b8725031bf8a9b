//! Configuration loader and validator for the article console.
use crate::cache::CachePolicy;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(&'static str),
}

/// Root configuration struct mirroring the YAML schema exactly.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    pub api: Api,
    pub cache: Cache,
}

/// Remote API settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Api {
    pub base_url: String,
    pub timeout_seconds: u64,
}

/// Query-cache freshness and retention settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Cache {
    pub default_window_seconds: u64,
    pub retention_seconds: u64,
    pub sweep_interval_seconds: u64,
    #[serde(default)]
    pub windows: BTreeMap<String, u64>,
}

impl Config {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.api.timeout_seconds)
    }

    /// Convert the cache section into the cache's typed policy.
    pub fn cache_policy(&self) -> CachePolicy {
        CachePolicy {
            default_window: Duration::from_secs(self.cache.default_window_seconds),
            retention: Duration::from_secs(self.cache.retention_seconds),
            windows: self
                .cache
                .windows
                .iter()
                .map(|(resource, secs)| (resource.clone(), Duration::from_secs(*secs)))
                .collect(),
        }
    }
}

/// Load configuration from a YAML file and validate it.
/// - If `path` is None, uses `config.yaml` in the current working directory.
pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = path.unwrap_or_else(|| Path::new("config.yaml"));
    let content = fs::read_to_string(path)?;
    let cfg: Config = serde_yaml::from_str(&content)?;
    validate(&cfg)?;
    Ok(cfg)
}

/// Validate a configuration instance.
fn validate(cfg: &Config) -> Result<(), ConfigError> {
    if cfg.api.base_url.trim().is_empty() {
        return Err(ConfigError::Invalid("api.base_url must be non-empty"));
    }
    if reqwest::Url::parse(&cfg.api.base_url).is_err() {
        return Err(ConfigError::Invalid("api.base_url must be a valid URL"));
    }
    if cfg.api.timeout_seconds == 0 {
        return Err(ConfigError::Invalid("api.timeout_seconds must be > 0"));
    }

    if cfg.cache.default_window_seconds == 0 {
        return Err(ConfigError::Invalid(
            "cache.default_window_seconds must be > 0",
        ));
    }
    if cfg.cache.retention_seconds == 0 {
        return Err(ConfigError::Invalid("cache.retention_seconds must be > 0"));
    }
    if cfg.cache.sweep_interval_seconds == 0 {
        return Err(ConfigError::Invalid(
            "cache.sweep_interval_seconds must be > 0",
        ));
    }
    if cfg.cache.windows.values().any(|secs| *secs == 0) {
        return Err(ConfigError::Invalid("cache.windows entries must be > 0"));
    }

    Ok(())
}

/// Returns a complete example configuration document.
pub fn example() -> &'static str {
    r#"api:
  base_url: "http://localhost:8000/api"
  timeout_seconds: 30

cache:
  default_window_seconds: 300
  retention_seconds: 600
  sweep_interval_seconds: 60
  windows:
    categories: 1800
    articles: 120
    article: 300
"#
}
