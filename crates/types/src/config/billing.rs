//! Subscription pricing.

use std::time::Duration;

use rust_decimal::Decimal;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::{ConfigError, ensure_nonzero_duration};
use crate::ids::AssetId;

/// Subscription pricing: `pay_amount` of `pay_asset_id` buys one `period`.
///
/// # Validation Rules
///
/// - `pay_amount` must be > 0
/// - `period` must be > 0
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct BillingConfig {
    /// Asset accepted for renewals.
    #[schemars(with = "String")]
    pub pay_asset_id: AssetId,
    /// Price of one period.
    #[schemars(with = "String")]
    pub pay_amount: Decimal,
    /// Length of one paid period.
    #[serde(default = "default_period")]
    #[serde(with = "super::humantime_serde")]
    #[schemars(with = "String")]
    pub period: Duration,
}

#[bon::bon]
impl BillingConfig {
    /// Creates a new billing configuration with validation.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] if any value is out of range.
    #[builder]
    pub fn new(
        pay_asset_id: AssetId,
        pay_amount: Decimal,
        #[builder(default = default_period())] period: Duration,
    ) -> Result<Self, ConfigError> {
        let config = Self { pay_asset_id, pay_amount, period };
        config.validate()?;
        Ok(config)
    }
}

impl BillingConfig {
    /// Validates the configuration values.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] if any value is out of range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pay_amount <= Decimal::ZERO {
            return Err(ConfigError::Validation {
                message: format!("pay_amount must be > 0, got {}", self.pay_amount),
            });
        }
        ensure_nonzero_duration("period", self.period)
    }

    /// Seconds of subscription bought by `amount`, rounded down.
    ///
    /// Returns 0 for non-positive amounts.
    pub fn period_for(&self, amount: Decimal) -> i64 {
        if amount <= Decimal::ZERO {
            return 0;
        }
        let seconds = Decimal::from(self.period.as_secs());
        amount
            .checked_mul(seconds)
            .and_then(|total| total.checked_div(self.pay_amount))
            .map(|period| period.floor())
            .and_then(|period| i64::try_from(period).ok())
            .unwrap_or(i64::MAX)
    }
}

fn default_period() -> Duration {
    Duration::from_secs(30 * 24 * 60 * 60)
}
