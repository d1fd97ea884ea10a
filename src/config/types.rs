//! Core configuration types and loading.

use serde::Deserialize;
use std::path::Path;

use super::validation::validate;
use crate::error::ConfigError;

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// The site delegates evaluate handlers against.
    pub site: SiteConfig,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load and validate configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate configuration from a TOML string.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        validate(&config).map_err(ConfigError::Invalid)?;
        Ok(config)
    }
}

/// Site identity and feature configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SiteConfig {
    /// Site identifier (e.g., "b3e1f2...").
    pub id: String,
    /// Site base URL (e.g., "https://school.example.org").
    #[serde(default)]
    pub url: Option<String>,
    /// Feature names disabled by the site administrator.
    ///
    /// Delegates match these against `feature_prefix + handler name`,
    /// e.g. `"UserProfileDelegate_picture"`.
    #[serde(default)]
    pub disabled_features: Vec<String>,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Default `EnvFilter` directive used when `RUST_LOG` is unset.
    #[serde(default = "default_filter")]
    pub filter: String,
    /// Emit JSON lines instead of the human-readable format.
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_filter(),
            json: false,
        }
    }
}

fn default_filter() -> String {
    "info".to_string()
}
