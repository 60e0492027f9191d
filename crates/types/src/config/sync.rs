//! Sync engine and job runner configuration.

use std::time::Duration;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::{ConfigError, ensure_nonzero_duration};

/// Largest page the ledger serves per output listing.
pub const MAX_PAGE_SIZE: usize = 500;

/// Upper bound on concurrent vault syncs.
const MAX_CONCURRENCY: usize = 256;

/// Sync engine and job runner configuration.
///
/// # Validation Rules
///
/// - `tick` and `job_ttl` must be > 0
/// - `page_size` must be 1-500
/// - `concurrency` must be 1-256
/// - `job_drain_limit` must be > 0
/// - `max_backoff` must be >= `tick`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SyncConfig {
    /// Interval between job queue polls.
    #[serde(default = "default_tick")]
    #[serde(with = "super::humantime_serde")]
    #[schemars(with = "String")]
    pub tick: Duration,
    /// Outputs requested per ledger page.
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    /// Vaults synced concurrently.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Lifetime of a queued job, before capping to the vault's expiry.
    #[serde(default = "default_job_ttl")]
    #[serde(with = "super::humantime_serde")]
    #[schemars(with = "String")]
    pub job_ttl: Duration,
    /// Maximum jobs drained per tick.
    #[serde(default = "default_job_drain_limit")]
    pub job_drain_limit: usize,
    /// Longest delay between polls after repeated failures.
    #[serde(default = "default_max_backoff")]
    #[serde(with = "super::humantime_serde")]
    #[schemars(with = "String")]
    pub max_backoff: Duration,
}

#[bon::bon]
impl SyncConfig {
    /// Creates a new sync configuration with validation.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] if any value is out of range.
    #[builder]
    pub fn new(
        #[builder(default = default_tick())] tick: Duration,
        #[builder(default = default_page_size())] page_size: usize,
        #[builder(default = default_concurrency())] concurrency: usize,
        #[builder(default = default_job_ttl())] job_ttl: Duration,
        #[builder(default = default_job_drain_limit())] job_drain_limit: usize,
        #[builder(default = default_max_backoff())] max_backoff: Duration,
    ) -> Result<Self, ConfigError> {
        let config = Self { tick, page_size, concurrency, job_ttl, job_drain_limit, max_backoff };
        config.validate()?;
        Ok(config)
    }
}

impl SyncConfig {
    /// Validates the configuration values.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] if any value is out of range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        ensure_nonzero_duration("tick", self.tick)?;
        ensure_nonzero_duration("job_ttl", self.job_ttl)?;
        if self.page_size == 0 || self.page_size > MAX_PAGE_SIZE {
            return Err(ConfigError::Validation {
                message: format!("page_size must be 1-{}, got {}", MAX_PAGE_SIZE, self.page_size),
            });
        }
        if self.concurrency == 0 || self.concurrency > MAX_CONCURRENCY {
            return Err(ConfigError::Validation {
                message: format!(
                    "concurrency must be 1-{}, got {}",
                    MAX_CONCURRENCY, self.concurrency
                ),
            });
        }
        if self.job_drain_limit == 0 {
            return Err(ConfigError::Validation {
                message: "job_drain_limit must be > 0".to_string(),
            });
        }
        if self.max_backoff < self.tick {
            return Err(ConfigError::Validation {
                message: format!(
                    "max_backoff ({:?}) must be >= tick ({:?})",
                    self.max_backoff, self.tick
                ),
            });
        }
        Ok(())
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            tick: default_tick(),
            page_size: default_page_size(),
            concurrency: default_concurrency(),
            job_ttl: default_job_ttl(),
            job_drain_limit: default_job_drain_limit(),
            max_backoff: default_max_backoff(),
        }
    }
}

fn default_tick() -> Duration {
    Duration::from_secs(1)
}

fn default_page_size() -> usize {
    MAX_PAGE_SIZE
}

fn default_concurrency() -> usize {
    10
}

fn default_job_ttl() -> Duration {
    Duration::from_secs(5 * 60)
}

fn default_job_drain_limit() -> usize {
    1000
}

fn default_max_backoff() -> Duration {
    Duration::from_secs(60)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::disallowed_methods)]
mod tests {
    use super::*;

    #[test]
    fn test_sync_config_defaults() {
        let config = SyncConfig::builder().build().unwrap();
        assert_eq!(config.page_size, 500);
        assert_eq!(config.concurrency, 10);
        assert_eq!(config.job_ttl, Duration::from_secs(300));
    }

    #[test]
    fn test_sync_config_page_size_bounds() {
        assert!(SyncConfig::builder().page_size(1).build().is_ok());
        assert!(SyncConfig::builder().page_size(0).build().is_err());
        let err = SyncConfig::builder().page_size(501).build().unwrap_err();
        assert!(err.to_string().contains("page_size"));
    }

    #[test]
    fn test_sync_config_backoff_must_cover_tick() {
        let err = SyncConfig::builder()
            .tick(Duration::from_secs(10))
            .max_backoff(Duration::from_secs(5))
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("max_backoff"));
    }

    #[test]
    fn test_sync_config_rejects_zero_concurrency() {
        assert!(SyncConfig::builder().concurrency(0).build().is_err());
    }
}
