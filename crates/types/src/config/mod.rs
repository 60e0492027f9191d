//! Configuration types for the cowallet backend.
//!
//! Configuration is loaded by the host process from files or environment
//! variables. All config structs validate their values at construction time
//! via fallible builders. Post-deserialization validation is available via
//! the `validate()` method on each struct.

// The schemars `JsonSchema` derive macro internally uses `.unwrap()` in its
// expansions. Allow `disallowed_methods` at the module level since config
// types are declarative structs with minimal procedural code.
#![allow(clippy::disallowed_methods)]

mod billing;
mod outbox;
mod service;
mod storage;
mod sync;

pub use billing::*;
pub use outbox::*;
pub use service::*;
use snafu::Snafu;
pub use storage::*;
pub use sync::*;

/// Configuration validation error.
///
/// Returned when a configuration value is outside its valid range or
/// violates a cross-field constraint.
#[derive(Debug, Snafu)]
pub enum ConfigError {
    /// A configuration value is invalid.
    #[snafu(display("invalid config: {message}"))]
    Validation {
        /// Description of the validation failure.
        message: String,
    },
}

impl ConfigError {
    /// Error code for this error.
    pub fn code(&self) -> crate::ErrorCode {
        crate::ErrorCode::AppConfig
    }
}

fn ensure_nonzero_duration(
    name: &str,
    value: std::time::Duration,
) -> Result<(), ConfigError> {
    if value.is_zero() {
        return Err(ConfigError::Validation { message: format!("{name} must be > 0") });
    }
    Ok(())
}

/// Duration serialization using humantime format.
mod humantime_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&humantime::format_duration(*duration).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        humantime::parse_duration(&s).map_err(serde::de::Error::custom)
    }
}
