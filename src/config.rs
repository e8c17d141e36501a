//! Service configuration.
//!
//! Loaded from the TOML file named by `COURIER_CONFIG`, or built from defaults when the
//! variable is unset. Every field has a default, so a partial file only overrides what it
//! names:
//!
//! ```toml
//! validation_code_length = 10
//!
//! [tracking]
//! average_speed_kmh = 25.0
//!
//! [store]
//! timeout_ms = 1500
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Environment variable holding the path of the configuration file.
pub const CONFIG_ENV: &str = "COURIER_CONFIG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub actor: ActorConfig,
    #[serde(default)]
    pub registry: RegistryConfig,
    #[serde(default)]
    pub tracking: TrackingConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Length of the code handed to the buyer for confirmation
    #[serde(default = "default_code_length")]
    pub validation_code_length: usize,
}

/// Per-delivery actor settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActorConfig {
    /// Capacity of the router channel
    #[serde(default = "default_actor_buffer")]
    pub buffer: usize,

    /// Idle time after which a per-delivery worker is reaped
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Outbound queue capacity of each live connection
    #[serde(default = "default_outbound_capacity")]
    pub outbound_capacity: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingConfig {
    /// Assumed courier speed used for ETA estimates
    #[serde(default = "default_average_speed")]
    pub average_speed_kmh: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Upper bound on a single store call
    #[serde(default = "default_store_timeout")]
    pub timeout_ms: u64,

    /// Total attempts for transient failures, including the first
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,

    #[serde(default = "default_backoff_base")]
    pub backoff_base_ms: u64,

    #[serde(default = "default_backoff_max")]
    pub backoff_max_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

// Defaults
fn default_code_length() -> usize {
    8
}

fn default_actor_buffer() -> usize {
    64
}

fn default_idle_timeout() -> u64 {
    30_000
}

fn default_outbound_capacity() -> usize {
    64
}

fn default_average_speed() -> f64 {
    30.0
}

fn default_store_timeout() -> u64 {
    2_000
}

fn default_retry_attempts() -> u32 {
    3
}

fn default_backoff_base() -> u64 {
    100
}

fn default_backoff_max() -> u64 {
    5_000
}

fn default_log_filter() -> String {
    "info".to_string()
}

impl Default for ActorConfig {
    fn default() -> Self {
        Self {
            buffer: default_actor_buffer(),
            idle_timeout_ms: default_idle_timeout(),
        }
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            outbound_capacity: default_outbound_capacity(),
        }
    }
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            average_speed_kmh: default_average_speed(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_store_timeout(),
            retry_attempts: default_retry_attempts(),
            backoff_base_ms: default_backoff_base(),
            backoff_max_ms: default_backoff_max(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            actor: ActorConfig::default(),
            registry: RegistryConfig::default(),
            tracking: TrackingConfig::default(),
            store: StoreConfig::default(),
            logging: LoggingConfig::default(),
            validation_code_length: default_code_length(),
        }
    }
}

impl ActorConfig {
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }
}

impl StoreConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Config {
    /// Loads from `COURIER_CONFIG` when set, otherwise returns the defaults.
    pub fn load() -> Result<Self, ConfigError> {
        match std::env::var_os(CONFIG_ENV) {
            Some(path) => Self::from_file(Path::new(&path)),
            None => Ok(Self::default()),
        }
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&raw)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.actor.buffer == 0 {
            return Err(ConfigError::Invalid("actor.buffer must be positive".into()));
        }
        if self.registry.outbound_capacity == 0 {
            return Err(ConfigError::Invalid(
                "registry.outbound_capacity must be positive".into(),
            ));
        }
        if !(self.tracking.average_speed_kmh.is_finite() && self.tracking.average_speed_kmh > 0.0) {
            return Err(ConfigError::Invalid(
                "tracking.average_speed_kmh must be a positive number".into(),
            ));
        }
        if self.store.retry_attempts == 0 {
            return Err(ConfigError::Invalid("store.retry_attempts must be at least 1".into()));
        }
        if self.validation_code_length < 4 {
            return Err(ConfigError::Invalid(
                "validation_code_length must be at least 4".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = Config::from_toml_str("").unwrap();
        assert_eq!(config.validation_code_length, 8);
        assert_eq!(config.tracking.average_speed_kmh, 30.0);
        assert_eq!(config.store.retry_attempts, 3);
        assert_eq!(config.actor.idle_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_partial_section_keeps_other_defaults() {
        let config = Config::from_toml_str(
            r#"
            [store]
            timeout_ms = 250

            [logging]
            filter = "courier_dispatch=debug"
            "#,
        )
        .unwrap();
        assert_eq!(config.store.timeout(), Duration::from_millis(250));
        assert_eq!(config.store.backoff_max_ms, 5_000);
        assert_eq!(config.logging.filter, "courier_dispatch=debug");
        assert_eq!(config.registry.outbound_capacity, 64);
    }

    #[test]
    fn test_rejects_non_positive_speed() {
        let err = Config::from_toml_str("[tracking]\naverage_speed_kmh = 0.0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_rejects_malformed_toml() {
        let err = Config::from_toml_str("validation_code_length = \"eight\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
