//! Configuration management
//!
//! This module handles loading the filer configuration file. The file is
//! stored in TOML format at ~/.config/filer/config.toml unless `FILER_CONFIG`
//! points elsewhere. The core only reads it.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Current configuration schema version
pub const SCHEMA_VERSION: u32 = 1;

/// Environment variable overriding the configuration file location
pub const CONFIG_PATH_ENV: &str = "FILER_CONFIG";

/// Google Cloud Storage XML interoperability endpoint
pub const DEFAULT_ENDPOINT: &str = "https://storage.googleapis.com";

const DEFAULT_REGION: &str = "auto";

/// Default multipart upload part size (8 MiB)
pub const DEFAULT_PART_SIZE: u64 = 8 * 1024 * 1024;

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Schema version for migration support
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,

    /// Object-store backend settings
    #[serde(default)]
    pub gs: ObjectStoreConfig,
}

/// Settings of the `gs` object-store backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectStoreConfig {
    /// S3-compatible endpoint URL
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_region")]
    pub region: String,

    /// HMAC access key; the SDK default credential chain is used when unset
    #[serde(default)]
    pub access_key: Option<String>,

    #[serde(default)]
    pub secret_key: Option<String>,

    /// Use path-style addressing (`endpoint/bucket/key`)
    #[serde(default = "default_true")]
    pub path_style: bool,

    /// Multipart upload part size in bytes
    #[serde(default = "default_part_size")]
    pub part_size: u64,
}

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}

fn default_region() -> String {
    DEFAULT_REGION.to_string()
}

fn default_true() -> bool {
    true
}

fn default_part_size() -> u64 {
    DEFAULT_PART_SIZE
}

impl Default for ObjectStoreConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            region: default_region(),
            access_key: None,
            secret_key: None,
            path_style: true,
            part_size: DEFAULT_PART_SIZE,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            gs: ObjectStoreConfig::default(),
        }
    }
}

impl ObjectStoreConfig {
    /// Apply `FILER_GS_*` overrides from a variable lookup
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(endpoint) = lookup("FILER_GS_ENDPOINT") {
            self.endpoint = endpoint;
        }
        if let Some(region) = lookup("FILER_GS_REGION") {
            self.region = region;
        }
        if let Some(access_key) = lookup("FILER_GS_ACCESS_KEY") {
            self.access_key = Some(access_key);
        }
        if let Some(secret_key) = lookup("FILER_GS_SECRET_KEY") {
            self.secret_key = Some(secret_key);
        }
    }

    /// Check that the endpoint is a usable URL and credentials come in pairs
    pub fn validate(&self) -> Result<()> {
        let url = url::Url::parse(&self.endpoint)?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(Error::Config(format!(
                "gs endpoint must be http or https, got '{}'",
                self.endpoint
            )));
        }
        if self.access_key.is_some() != self.secret_key.is_some() {
            return Err(Error::Config(
                "gs access_key and secret_key must be set together".into(),
            ));
        }
        Ok(())
    }
}

/// Configuration manager handles locating and loading config
#[derive(Debug)]
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// Create a new ConfigManager with the default config path
    pub fn new() -> Result<Self> {
        if let Some(path) = std::env::var_os(CONFIG_PATH_ENV) {
            return Ok(Self::with_path(PathBuf::from(path)));
        }
        let config_dir = dirs::config_dir()
            .ok_or_else(|| Error::Config("Could not determine config directory".into()))?;
        let config_path = config_dir.join("filer").join("config.toml");
        Ok(Self { config_path })
    }

    /// Create a ConfigManager with a custom path (useful for testing)
    pub fn with_path(path: PathBuf) -> Self {
        Self { config_path: path }
    }

    /// Get the configuration file path
    pub fn config_path(&self) -> &PathBuf {
        &self.config_path
    }

    /// Load configuration from disk
    ///
    /// If the configuration file doesn't exist, returns a default configuration.
    /// Environment overrides are not applied here. The object-store settings
    /// are checked by [`ObjectStoreConfig::validate`] when that backend
    /// connects, so commands that never touch it are unaffected by them.
    pub fn load(&self) -> Result<Config> {
        if !self.config_path.exists() {
            tracing::debug!(path = %self.config_path.display(), "no config file, using defaults");
            return Ok(Config::default());
        }

        let content = std::fs::read_to_string(&self.config_path)?;
        let config: Config = toml::from_str(&content)?;

        if config.schema_version > SCHEMA_VERSION {
            return Err(Error::Config(format!(
                "Configuration file version {} is newer than supported version {}. Please upgrade filer.",
                config.schema_version, SCHEMA_VERSION
            )));
        }

        Ok(config)
    }

    /// Load configuration and apply environment overrides
    pub fn load_with_env(&self) -> Result<Config> {
        let mut config = self.load()?;
        config.gs.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }
}
