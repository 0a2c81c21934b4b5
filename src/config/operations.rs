//! Config loading, validation, and conversions.

use super::model::Config;
use crate::error::{LockError, Result};
use chrono::Duration;
use std::path::Path;
use tracing_subscriber::EnvFilter;

impl Config {
    /// Load config from a YAML file.
    ///
    /// # Returns
    ///
    /// * `Ok(Config)` - Successfully loaded and validated config
    /// * `Err(LockError::Config)` - Read error, parse error or validation failure
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path).map_err(|e| {
            LockError::Config(format!(
                "failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;

        Self::from_yaml(&content)
    }

    /// Parse config from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)
            .map_err(|e| LockError::Config(format!("failed to parse config YAML: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Serialize config to YAML string.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self)
            .map_err(|e| LockError::Config(format!("failed to serialize config to YAML: {}", e)))
    }

    /// Validate config values and return error on invalid values.
    ///
    /// Validation rules:
    /// - `store_dir` must be non-empty
    /// - `identity` must be non-empty
    /// - `guard_timeout_ms` must be positive
    /// - `guard_stale_secs` must be positive
    /// - `log_level` must be a valid tracing filter
    pub fn validate(&self) -> Result<()> {
        if self.store_dir.trim().is_empty() {
            return Err(LockError::Config(
                "config validation failed: store_dir must not be empty".to_string(),
            ));
        }

        if self.identity.trim().is_empty() {
            return Err(LockError::Config(
                "config validation failed: identity must not be empty".to_string(),
            ));
        }

        if self.guard_timeout_ms == 0 {
            return Err(LockError::Config(
                "config validation failed: guard_timeout_ms must be greater than 0".to_string(),
            ));
        }

        if self.guard_stale_secs == 0 {
            return Err(LockError::Config(
                "config validation failed: guard_stale_secs must be greater than 0".to_string(),
            ));
        }

        if let Err(e) = EnvFilter::try_new(&self.log_level) {
            return Err(LockError::Config(format!(
                "config validation failed: invalid log_level '{}': {}",
                self.log_level, e
            )));
        }

        Ok(())
    }

    /// `default_duration_secs` as a lock duration.
    pub fn default_duration(&self) -> Duration {
        i64::try_from(self.default_duration_secs)
            .ok()
            .and_then(Duration::try_seconds)
            .unwrap_or(Duration::MAX)
    }

    /// `guard_stale_secs` as the file store's abandoned-guard threshold.
    pub fn guard_stale(&self) -> Duration {
        i64::try_from(self.guard_stale_secs)
            .ok()
            .and_then(Duration::try_seconds)
            .unwrap_or(Duration::MAX)
    }

    /// `guard_timeout_ms` as a wait bound for the file store.
    pub fn guard_timeout(&self) -> Duration {
        i64::try_from(self.guard_timeout_ms)
            .ok()
            .and_then(Duration::try_milliseconds)
            .unwrap_or(Duration::MAX)
    }
}
