//! Outbox poller and own-output watcher configuration.

use std::time::Duration;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::{ConfigError, ensure_nonzero_duration};

/// Upper bound on outbox entries handled per pass.
const MAX_BATCH_SIZE: usize = 1000;

/// Outbox configuration.
///
/// The same tick drives the own-output watcher that turns incoming payments
/// and relayed commands into local state.
///
/// # Validation Rules
///
/// - `tick` must be > 0
/// - `batch_size` must be 1-1000
/// - `max_backoff` must be >= `tick`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct OutboxConfig {
    /// Interval between outbox passes.
    #[serde(default = "default_tick")]
    #[serde(with = "super::humantime_serde")]
    #[schemars(with = "String")]
    pub tick: Duration,
    /// Entries handled per pass.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Longest delay between passes after repeated failures.
    #[serde(default = "default_max_backoff")]
    #[serde(with = "super::humantime_serde")]
    #[schemars(with = "String")]
    pub max_backoff: Duration,
}

#[bon::bon]
impl OutboxConfig {
    /// Creates a new outbox configuration with validation.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] if any value is out of range.
    #[builder]
    pub fn new(
        #[builder(default = default_tick())] tick: Duration,
        #[builder(default = default_batch_size())] batch_size: usize,
        #[builder(default = default_max_backoff())] max_backoff: Duration,
    ) -> Result<Self, ConfigError> {
        let config = Self { tick, batch_size, max_backoff };
        config.validate()?;
        Ok(config)
    }
}

impl OutboxConfig {
    /// Validates the configuration values.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] if any value is out of range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        ensure_nonzero_duration("tick", self.tick)?;
        if self.batch_size == 0 || self.batch_size > MAX_BATCH_SIZE {
            return Err(ConfigError::Validation {
                message: format!("batch_size must be 1-{}, got {}", MAX_BATCH_SIZE, self.batch_size),
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

impl Default for OutboxConfig {
    fn default() -> Self {
        Self { tick: default_tick(), batch_size: default_batch_size(), max_backoff: default_max_backoff() }
    }
}

fn default_tick() -> Duration {
    Duration::from_secs(1)
}

fn default_batch_size() -> usize {
    100
}

fn default_max_backoff() -> Duration {
    Duration::from_secs(60)
}
