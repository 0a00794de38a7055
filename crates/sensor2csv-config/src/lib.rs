// sensor2csv-config - Runtime configuration
//
// Supports configuration from multiple sources:
// 1. Environment variables (highest priority, SENSOR2CSV_ prefix)
// 2. Config file path from SENSOR2CSV_CONFIG env var
// 3. Config file contents from SENSOR2CSV_CONFIG_CONTENT env var
// 4. Default config file locations (./config.toml, ./.sensor2csv.toml)
// 5. Built-in defaults (lowest priority)

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

mod env_overrides;
mod sources;
mod validation;

pub use env_overrides::{
    apply_env_overrides, resolve_key, EnvSource, ENV_PREFIX, UNPREFIXED_KEYS,
};

/// Main runtime configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuntimeConfig {
    #[serde(default)]
    pub queue: QueueConfig,

    #[serde(default)]
    pub writer: WriterConfig,

    #[serde(default)]
    pub monitor: MonitorConfig,

    #[serde(default)]
    pub history: HistoryConfig,

    #[serde(default)]
    pub request: RequestConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub server: ServerConfig,
}

/// Bounded write queue configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    pub maxsize: usize,
}

impl QueueConfig {
    /// Occupancy at which the monitor starts warning (80% of maxsize, at least 1).
    pub fn warn_threshold(&self) -> usize {
        (self.maxsize.saturating_mul(4).div_ceil(5)).max(1)
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self { maxsize: 5000 }
    }
}

/// CSV writer retry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WriterConfig {
    /// Retries after the first failed append; a job is dropped once
    /// `retries + 1` appends have failed.
    pub retries: u32,
    pub backoff_base_ms: u64,
    /// How long queued jobs may keep draining after shutdown is requested.
    pub shutdown_grace_secs: u64,
}

impl WriterConfig {
    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            retries: 3,
            backoff_base_ms: 200,
            shutdown_grace_secs: 5,
        }
    }
}

/// Inactivity monitor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub inactivity_warn_secs: u64,
    pub interval_secs: u64,
}

impl MonitorConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            inactivity_warn_secs: 120,
            interval_secs: 30,
        }
    }
}

/// Ingestion history ring buffer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    pub max: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self { max: 1000 }
    }
}

/// Request handling configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestConfig {
    pub max_payload_bytes: usize,
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            max_payload_bytes: 64 * 1024,
        }
    }
}

/// CSV storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub data_dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: "./data".to_string(),
        }
    }
}

/// Server-specific configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_addr: String,
    pub log_level: String,
    pub log_format: LogFormat,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:5000".to_string(),
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Text,
    Json,
}

impl std::fmt::Display for LogFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogFormat::Text => write!(f, "text"),
            LogFormat::Json => write!(f, "json"),
        }
    }
}

impl RuntimeConfig {
    /// Load configuration from all sources with priority
    pub fn load() -> Result<Self> {
        sources::load_config()
    }

    /// Load configuration from an explicit file path, then apply env overrides
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        sources::load_from_file_path(path)
    }

    /// Parse a TOML document on top of the built-in defaults
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        validation::validate_config(self)
    }
}
