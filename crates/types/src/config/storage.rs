//! Storage file location and maintenance cadence.

use std::{path::PathBuf, time::Duration};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::{ConfigError, ensure_nonzero_duration};

/// Upper bound on entries reclaimed per TTL cycle.
const MAX_TTL_GC_BATCH_SIZE: usize = 100_000;

/// Storage layer configuration.
///
/// # Validation Rules
///
/// - `ttl_gc_interval` and `compact_interval` must be > 0
/// - `ttl_gc_batch_size` must be 1-100,000
///
/// # Example
///
/// ```no_run
/// # use cowallet_types::config::StorageConfig;
/// let config = StorageConfig::builder()
///     .path("/var/lib/cowallet/store.redb".into())
///     .ttl_gc_batch_size(500)
///     .build()
///     .expect("valid storage config");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct StorageConfig {
    /// Database file path.
    #[serde(default = "default_path")]
    pub path: PathBuf,
    /// Interval between expired-entry reclamation cycles.
    #[serde(default = "default_ttl_gc_interval")]
    #[serde(with = "super::humantime_serde")]
    #[schemars(with = "String")]
    pub ttl_gc_interval: Duration,
    /// Maximum expired entries deleted per cycle.
    #[serde(default = "default_ttl_gc_batch_size")]
    pub ttl_gc_batch_size: usize,
    /// Interval between best-effort file compactions.
    #[serde(default = "default_compact_interval")]
    #[serde(with = "super::humantime_serde")]
    #[schemars(with = "String")]
    pub compact_interval: Duration,
}

#[bon::bon]
impl StorageConfig {
    /// Creates a new storage configuration with validation.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] if any value is out of range.
    #[builder]
    pub fn new(
        #[builder(default = default_path())] path: PathBuf,
        #[builder(default = default_ttl_gc_interval())] ttl_gc_interval: Duration,
        #[builder(default = default_ttl_gc_batch_size())] ttl_gc_batch_size: usize,
        #[builder(default = default_compact_interval())] compact_interval: Duration,
    ) -> Result<Self, ConfigError> {
        let config = Self { path, ttl_gc_interval, ttl_gc_batch_size, compact_interval };
        config.validate()?;
        Ok(config)
    }
}

impl StorageConfig {
    /// Validates the configuration values.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] if any value is out of range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        ensure_nonzero_duration("ttl_gc_interval", self.ttl_gc_interval)?;
        ensure_nonzero_duration("compact_interval", self.compact_interval)?;
        if self.ttl_gc_batch_size == 0 || self.ttl_gc_batch_size > MAX_TTL_GC_BATCH_SIZE {
            return Err(ConfigError::Validation {
                message: format!(
                    "ttl_gc_batch_size must be 1-{}, got {}",
                    MAX_TTL_GC_BATCH_SIZE, self.ttl_gc_batch_size
                ),
            });
        }
        Ok(())
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: default_path(),
            ttl_gc_interval: default_ttl_gc_interval(),
            ttl_gc_batch_size: default_ttl_gc_batch_size(),
            compact_interval: default_compact_interval(),
        }
    }
}

fn default_path() -> PathBuf {
    PathBuf::from("cowallet.redb")
}

fn default_ttl_gc_interval() -> Duration {
    Duration::from_secs(60)
}

fn default_ttl_gc_batch_size() -> usize {
    1000
}

fn default_compact_interval() -> Duration {
    Duration::from_secs(3600)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::disallowed_methods)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_config_defaults_are_valid() {
        let config = StorageConfig::builder().build().expect("defaults should be valid");
        assert_eq!(config, StorageConfig::default());
        assert_eq!(config.ttl_gc_interval, Duration::from_secs(60));
    }

    #[test]
    fn test_storage_config_rejects_zero_batch() {
        let err = StorageConfig::builder().ttl_gc_batch_size(0).build().unwrap_err();
        assert!(err.to_string().contains("ttl_gc_batch_size"));
    }

    #[test]
    fn test_storage_config_rejects_zero_interval() {
        let err = StorageConfig::builder().compact_interval(Duration::ZERO).build().unwrap_err();
        assert!(err.to_string().contains("compact_interval"));
    }

    #[test]
    fn test_storage_config_humantime_serde() {
        let json = r#"{"path":"/tmp/x.redb","ttl_gc_interval":"30s","compact_interval":"2h"}"#;
        let config: StorageConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.ttl_gc_interval, Duration::from_secs(30));
        assert_eq!(config.compact_interval, Duration::from_secs(7200));
        assert_eq!(config.ttl_gc_batch_size, 1000);
        config.validate().unwrap();
    }
}
