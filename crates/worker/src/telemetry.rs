//! Logging setup.

use std::io::IsTerminal;

use cowallet_types::config::LogFormat;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::SubscriberExt,
    util::{SubscriberInitExt, TryInitError},
};

/// Whether `format` resolves to JSON output.
pub fn use_json(format: LogFormat) -> bool {
    match format {
        LogFormat::Json => true,
        LogFormat::Text => false,
        LogFormat::Auto => !std::io::stdout().is_terminal(),
    }
}

/// Installs the global subscriber.
///
/// The filter comes from `RUST_LOG`, defaulting to `info`. JSON output is
/// flattened so structured fields sit at the top level of each line.
///
/// # Errors
///
/// Returns [`TryInitError`] if a global subscriber is already installed.
pub fn init_logging(format: LogFormat) -> Result<(), TryInitError> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    if use_json(format) {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().json().flatten_event(true).with_current_span(false))
            .try_init()
    } else {
        tracing_subscriber::registry().with(env_filter).with(fmt::layer()).try_init()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::disallowed_methods)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_formats() {
        assert!(use_json(LogFormat::Json));
        assert!(!use_json(LogFormat::Text));
    }

    #[test]
    fn test_second_init_fails() {
        let _ = init_logging(LogFormat::Text);
        assert!(init_logging(LogFormat::Text).is_err());
    }
}
