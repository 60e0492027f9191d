//! Top-level service configuration.

use std::time::Duration;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::{BillingConfig, ConfigError, OutboxConfig, StorageConfig, SyncConfig};

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable text.
    Text,
    /// One JSON object per event.
    Json,
    /// JSON when stdout is not a terminal, text otherwise.
    #[default]
    Auto,
}

/// Configuration for every background loop of the service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ServiceConfig {
    /// Storage file and maintenance.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Sync engine and job runner.
    #[serde(default)]
    pub sync: SyncConfig,
    /// Outbox poller and own-output watcher.
    #[serde(default)]
    pub outbox: OutboxConfig,
    /// Subscription pricing.
    pub billing: BillingConfig,
    /// Log output format.
    #[serde(default)]
    pub log_format: LogFormat,
}

#[bon::bon]
impl ServiceConfig {
    /// Creates a new service configuration with validation.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] if any section is invalid.
    #[builder]
    pub fn new(
        #[builder(default)] storage: StorageConfig,
        #[builder(default)] sync: SyncConfig,
        #[builder(default)] outbox: OutboxConfig,
        billing: BillingConfig,
        #[builder(default)] log_format: LogFormat,
    ) -> Result<Self, ConfigError> {
        let config = Self { storage, sync, outbox, billing, log_format };
        config.validate()?;
        Ok(config)
    }
}

impl ServiceConfig {
    /// Validates every section.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] for the first invalid section.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.storage.validate()?;
        self.sync.validate()?;
        self.outbox.validate()?;
        self.billing.validate()?;
        if self.sync.job_ttl < self.sync.tick {
            return Err(ConfigError::Validation {
                message: format!(
                    "sync.job_ttl ({:?}) shorter than sync.tick ({:?}) lets jobs expire unseen",
                    self.sync.job_ttl, self.sync.tick
                ),
            });
        }
        Ok(())
    }

    /// Period of the slowest loop, used to bound shutdown waits.
    pub fn slowest_tick(&self) -> Duration {
        self.sync.tick.max(self.outbox.tick).max(self.storage.ttl_gc_interval)
    }
}
