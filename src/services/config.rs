//! Configuration management for the aviary daemon.

use std::collections::BTreeMap;
use std::path::Path;

use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("rest API not configured (services.restapi) while accessing {0}")]
    RestApiNotConfigured(&'static str),
    #[error("invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),
    #[error("invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),
    #[error("registry database path cannot be empty")]
    EmptyDatabasePath,
    #[error("batch_system.max_age must be at least 1 second")]
    InvalidMaxAge,
    #[error("failed to load configuration: {0}")]
    Load(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub fleet: FleetConfig,
    pub services: ServicesConfig,
    pub batch_system: BatchSystemConfig,
    pub registry: RegistryConfig,
    pub logging: LoggingConfig,
}

/// Timing knobs for the drone actors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FleetConfig {
    /// Poll interval while a drone sits in Available, in seconds.
    pub availability_interval_secs: u64,
    /// Pause between consecutive state steps, in milliseconds. Zero in
    /// tests.
    pub pacing_millis: u64,
    /// Deadline applied to every site/batch agent call, in seconds.
    pub agent_timeout_secs: u64,
}

impl Default for FleetConfig {
    fn default() -> Self {
        Self {
            availability_interval_secs: 10,
            pacing_millis: 500,
            agent_timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServicesConfig {
    pub restapi: Option<RestApiConfig>,
}

fn default_algorithm() -> String {
    "HS256".to_string()
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

/// Settings of the observability REST API and its token signing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RestApiConfig {
    /// Symmetric secret used to sign and validate bearer tokens.
    pub secret_key: String,
    /// Signing algorithm name, announced to clients in error challenges.
    #[serde(default = "default_algorithm")]
    pub algorithm: String,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Batch-system adapter settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchSystemConfig {
    /// Freshness window for cached batch-system queries, in seconds.
    pub max_age: u64,
    /// Adapter-specific command-line options, forwarded opaquely
    /// (e.g. `partition: cloud` for Slurm).
    pub options: BTreeMap<String, String>,
}

impl Default for BatchSystemConfig {
    fn default() -> Self {
        Self {
            max_age: 60,
            options: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    pub database_path: String,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            database_path: ".aviary/registry.db".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl Config {
    /// Load configuration with hierarchical merging.
    ///
    /// Precedence (lowest to highest): programmatic defaults, the YAML file
    /// at `path` (skipped if absent), environment variables with the
    /// `AVIARY_` prefix and `__` as the nesting separator.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path.as_ref()))
            .merge(Env::prefixed("AVIARY_").split("__"))
            .extract()
            .map_err(|err| ConfigError::Load(err.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration after loading.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&self.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(self.logging.level.clone()));
        }

        let valid_log_formats = ["json", "pretty"];
        if !valid_log_formats.contains(&self.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(self.logging.format.clone()));
        }

        if self.registry.database_path.is_empty() {
            return Err(ConfigError::EmptyDatabasePath);
        }

        if self.batch_system.max_age == 0 {
            return Err(ConfigError::InvalidMaxAge);
        }

        Ok(())
    }
}
