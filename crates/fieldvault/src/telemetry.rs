//! Tracing subscriber setup for applications embedding the vault.
//!
//! The library itself only emits `tracing` events. Key bytes, plaintexts,
//! ciphertexts and tokens never appear in any event field; key ids and
//! field names may.
//!
//! Host applications normally reach this through [`Settings::bootstrap`],
//! which installs the subscriber before the key registry is loaded so the
//! registry's own startup events are captured.
//!
//! [`Settings::bootstrap`]: crate::Settings::bootstrap

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing_subscriber::EnvFilter;

/// Line format of the installed subscriber.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// One JSON object per event.
    #[default]
    Json,
    /// Human-readable lines for local runs.
    Text,
}

/// Parse `log_level` as an event filter directive.
///
/// Accepts anything `RUST_LOG` accepts, e.g. `"info"` or
/// `"warn,fieldvault=debug"`.
///
/// # Errors
///
/// Returns an error naming `log_level` if it is not a valid directive.
pub fn parse_filter(log_level: &str) -> Result<EnvFilter> {
    EnvFilter::try_new(log_level).with_context(|| format!("invalid log level '{log_level}'"))
}

/// Install a global subscriber writing `format` lines at `log_level`.
///
/// A valid `RUST_LOG` takes precedence over `log_level`.
///
/// # Errors
///
/// Returns an error if `log_level` does not parse or a global subscriber
/// has already been set.
pub fn init(log_level: &str, format: LogFormat) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(from_env) => from_env,
        Err(_) => parse_filter(log_level)?,
    };

    let installed = match format {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .try_init(),
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).try_init(),
    };
    installed.map_err(|e| anyhow::anyhow!("failed to install fieldvault tracing subscriber: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_directives_parse() {
        assert!(parse_filter("info").is_ok());
        assert!(parse_filter("warn,fieldvault=debug").is_ok());
    }

    #[test]
    fn bad_level_is_named_in_the_error() {
        let err = parse_filter("fieldvault=loud").unwrap_err();
        assert!(format!("{err:#}").contains("invalid log level 'fieldvault=loud'"));
    }

    #[test]
    fn second_init_is_an_error() {
        assert!(init("debug", LogFormat::Json).is_ok());
        let err = init("debug", LogFormat::Text).unwrap_err();
        assert!(err.to_string().contains("failed to install"));
    }
}
