#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Configuration management for warden
//!
//! This crate handles loading and merging configuration from:
//! - Default values (hard-coded)
//! - Configuration file (`<data>/warden.toml` or an explicit path)
//! - Environment variables

pub mod layout;
pub use layout::DataLayout;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use warden_errors::{ConfigError, Error};

/// Default public artifact host, overridable for air-gapped registries
pub const DEFAULT_SOURCE_URI: &str = "https://artifacts.warden.dev/downloads";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub network: NetworkConfig,

    #[serde(default)]
    pub upgrade: UpgradeConfig,

    #[serde(default)]
    pub paths: PathConfig,
}

/// Network configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    #[serde(default = "default_timeout")]
    pub timeout: u64, // seconds
    #[serde(default = "default_retries")]
    pub retries: u32,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    /// Overall deadline for one artifact fetch, all retries included
    #[serde(default = "default_fetch_deadline")]
    pub fetch_deadline: u64, // seconds
}

/// Upgrade and watchdog configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpgradeConfig {
    #[serde(default = "default_source_uri")]
    pub source_uri: String,
    /// Optional URI serving a signing-key override for self-hosted registries
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signing_key_uri: Option<String>,
    #[serde(default = "default_grace_period")]
    pub grace_period_secs: u64,
    #[serde(default = "default_error_check_interval")]
    pub error_check_interval_secs: u64,
    /// Consecutive failed health reports before the watcher declares the
    /// upgrade unhealthy
    #[serde(default = "default_failure_debounce")]
    pub failure_debounce_checks: u32,
    /// Consecutive missed heartbeats before the agent counts as unobservable
    #[serde(default = "default_missing_debounce")]
    pub missing_debounce_checks: u32,
    /// Heartbeat age beyond which a watcher pid file counts as dead
    #[serde(default = "default_watcher_stale")]
    pub watcher_stale_secs: u64,
}

/// Path configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PathConfig {
    /// Base data directory; defaults to the directory of the running binary's
    /// installed tree
    pub data_dir: Option<PathBuf>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            timeout: default_timeout(),
            retries: default_retries(),
            retry_delay_ms: default_retry_delay_ms(),
            fetch_deadline: default_fetch_deadline(),
        }
    }
}

impl Default for UpgradeConfig {
    fn default() -> Self {
        Self {
            source_uri: default_source_uri(),
            signing_key_uri: None,
            grace_period_secs: default_grace_period(),
            error_check_interval_secs: default_error_check_interval(),
            failure_debounce_checks: default_failure_debounce(),
            missing_debounce_checks: default_missing_debounce(),
            watcher_stale_secs: default_watcher_stale(),
        }
    }
}

impl NetworkConfig {
    #[must_use]
    pub fn timeout_duration(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }

    #[must_use]
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    #[must_use]
    pub fn fetch_deadline_duration(&self) -> Duration {
        Duration::from_secs(self.fetch_deadline)
    }
}

impl UpgradeConfig {
    #[must_use]
    pub fn grace_period(&self) -> Duration {
        Duration::from_secs(self.grace_period_secs)
    }

    #[must_use]
    pub fn error_check_interval(&self) -> Duration {
        Duration::from_secs(self.error_check_interval_secs)
    }

    #[must_use]
    pub fn watcher_staleness(&self) -> Duration {
        Duration::from_secs(self.watcher_stale_secs)
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub async fn load(path: &Path) -> Result<Self, Error> {
        let content = fs::read_to_string(path).await.map_err(|_| {
            Error::Config(ConfigError::NotFound {
                path: path.display().to_string(),
            })
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| {
            Error::Config(ConfigError::ParseError {
                message: e.to_string(),
            })
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Load from a file if it exists, otherwise use defaults
    ///
    /// # Errors
    ///
    /// Returns an error only if the file exists and is invalid.
    pub async fn load_or_default(path: &Path) -> Result<Self, Error> {
        if fs::try_exists(path).await.unwrap_or(false) {
            Self::load(path).await
        } else {
            Ok(Self::default())
        }
    }

    /// Merge environment variable overrides
    ///
    /// `WARDEN_SOURCE_URI` and `WARDEN_DATA_DIR` override the file values.
    ///
    /// # Errors
    ///
    /// Returns an error if an override value is invalid.
    pub fn merge_env(&mut self) -> Result<(), Error> {
        if let Ok(uri) = std::env::var("WARDEN_SOURCE_URI") {
            if uri.is_empty() {
                return Err(Error::Config(ConfigError::InvalidValue {
                    field: "source_uri".to_string(),
                    value: uri,
                }));
            }
            self.upgrade.source_uri = uri;
        }
        if let Ok(dir) = std::env::var("WARDEN_DATA_DIR") {
            self.paths.data_dir = Some(PathBuf::from(dir));
        }
        Ok(())
    }

    fn validate(&self) -> Result<(), Error> {
        if self.upgrade.error_check_interval_secs == 0 {
            return Err(Error::Config(ConfigError::InvalidValue {
                field: "upgrade.error_check_interval_secs".to_string(),
                value: "0".to_string(),
            }));
        }
        if self.upgrade.grace_period_secs == 0 {
            return Err(Error::Config(ConfigError::InvalidValue {
                field: "upgrade.grace_period_secs".to_string(),
                value: "0".to_string(),
            }));
        }
        Ok(())
    }
}

// Default value functions

fn default_timeout() -> u64 {
    300 // 5 minutes for large downloads
}

fn default_retries() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    500
}

fn default_fetch_deadline() -> u64 {
    600
}

fn default_source_uri() -> String {
    DEFAULT_SOURCE_URI.to_string()
}

fn default_grace_period() -> u64 {
    600 // 10 minutes
}

fn default_error_check_interval() -> u64 {
    30
}

fn default_failure_debounce() -> u32 {
    2
}

fn default_missing_debounce() -> u32 {
    3
}

fn default_watcher_stale() -> u64 {
    90
}
