//! Key and runtime configuration.
//!
//! Keys come from one of two sources, loaded once at startup:
//!
//! - an explicit [`KeyConfig`] (deserialised, or built in code) naming its
//!   default key;
//! - `PREFIX_<N>` environment variables, where the numerically highest `N`
//!   becomes the default key.
//!
//! Either way the result is an immutable [`KeyRegistry`] that the
//! application passes around explicitly.

use std::collections::{BTreeMap, HashMap};

use anyhow::{Context, Result};
use common::KeyError;
use serde::Deserialize;
use tracing::{debug, info, warn};
use zeroize::Zeroize;

use crate::{
    crypto::CryptoEngine,
    handle::EngineHandle,
    keys::{KeyRegistry, SecretBytes, KEY_LEN},
    telemetry::{self, LogFormat},
};

/// Explicit key configuration.
///
/// In serialised form each key is standard base64:
///
/// ```json
/// { "keys": { "1": "<base64>", "2": "<base64>" }, "default_key_id": "2" }
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct KeyConfig {
    /// Key id → raw key bytes.
    pub keys: BTreeMap<String, SecretBytes>,
    /// Key used for new encryptions. Must be one of `keys`.
    pub default_key_id: String,
}

impl KeyConfig {
    pub fn new(keys: BTreeMap<String, SecretBytes>, default_key_id: impl Into<String>) -> Self {
        Self {
            keys,
            default_key_id: default_key_id.into(),
        }
    }

    /// Collect keys from the process environment. See [`KeyConfig::from_vars`].
    ///
    /// Variables whose name or value is not valid UTF-8 are ignored.
    ///
    /// # Errors
    ///
    /// As [`KeyConfig::from_vars`].
    pub fn from_env(prefix: &str) -> Result<Self, KeyError> {
        let vars = std::env::vars_os()
            .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)));
        Self::from_vars(prefix, vars)
    }

    /// Collect keys from `PREFIX_<N>` variables in `vars`.
    ///
    /// Matching is case-insensitive on the prefix. Each value is either the
    /// raw 32-byte key or its standard base64 encoding. Suffixes that are not
    /// numbers are skipped with a warning. The key with the numerically highest
    /// suffix is the default, so `PREFIX_10` wins over `PREFIX_9`.
    ///
    /// # Errors
    ///
    /// - [`KeyError::NoKeysProvided`] if no variable matches.
    /// - [`KeyError::Config`] if two suffixes name the same number, such as
    ///   `_7` and `_07`.
    /// - [`KeyError::Config`] if a value is neither 32 raw bytes nor base64.
    /// - [`KeyError::InvalidKeyLength`] if a value decodes to the wrong length.
    pub fn from_vars<I, K, V>(prefix: &str, vars: I) -> Result<Self, KeyError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let source: HashMap<String, String> = vars
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        let raw: HashMap<String, String> = config::Config::builder()
            .add_source(config::Environment::with_prefix(prefix).source(Some(source)))
            .build()
            .and_then(|cfg| cfg.try_deserialize())
            .map_err(|e| KeyError::Config(e.to_string()))?;

        let mut keys = BTreeMap::new();
        let mut by_number: BTreeMap<u64, String> = BTreeMap::new();
        for (suffix, mut value) in raw {
            let Ok(n) = suffix.parse::<u64>() else {
                warn!(
                    prefix = %prefix,
                    suffix = %suffix,
                    "ignoring key variable with non-numeric suffix"
                );
                continue;
            };
            if let Some(other) = by_number.get(&n) {
                let (a, b) = if *other < suffix {
                    (other.as_str(), suffix.as_str())
                } else {
                    (suffix.as_str(), other.as_str())
                };
                return Err(KeyError::Config(format!(
                    "key ids '{a}' and '{b}' both have number {n}"
                )));
            }
            let material = decode_env_key(&suffix, &value);
            value.zeroize();
            let material = material?;
            debug!(key_id = %suffix, "loaded key from environment");
            by_number.insert(n, suffix.clone());
            keys.insert(suffix, material);
        }

        let (_, default_key_id) = by_number.pop_last().ok_or(KeyError::NoKeysProvided)?;
        Ok(Self::new(keys, default_key_id))
    }

    /// Validate every key and build the registry.
    ///
    /// # Errors
    ///
    /// Any [`KeyRegistry::new`] error.
    pub fn registry(&self) -> Result<KeyRegistry, KeyError> {
        KeyRegistry::new(
            self.keys.iter().map(|(id, key)| (id.as_str(), key.expose())),
            &self.default_key_id,
        )
    }

    /// Validate every key and build an engine over them.
    ///
    /// # Errors
    ///
    /// Any [`KeyRegistry::new`] error.
    pub fn engine(&self) -> Result<CryptoEngine, KeyError> {
        self.registry().map(CryptoEngine::new)
    }
}

fn decode_env_key(key_id: &str, value: &str) -> Result<SecretBytes, KeyError> {
    if value.len() == KEY_LEN {
        return Ok(SecretBytes::from(value.as_bytes()));
    }
    SecretBytes::from_base64(value)
        .map_err(|_| KeyError::Config(format!("key '{key_id}' is neither 32 raw bytes nor base64")))
}

/// Runtime settings for a host application, read from `FIELDVAULT_*`
/// environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Prefix of the `PREFIX_<N>` key variables.
    #[serde(default = "default_keys_env_prefix")]
    pub keys_env_prefix: String,

    /// Tracing log level (e.g. `"info"`, `"debug"`).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// `json` (default) or `text`.
    #[serde(default)]
    pub log_format: LogFormat,
}

fn default_keys_env_prefix() -> String {
    "FIELDVAULT_KEY".into()
}
fn default_log_level() -> String {
    "info".into()
}

impl Settings {
    /// Load and validate settings from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable cannot be parsed, is blank, or the log
    /// level is not a valid filter directive.
    pub fn from_env() -> Result<Self> {
        let cfg = config::Config::builder()
            .add_source(config::Environment::with_prefix("FIELDVAULT"))
            .build()
            .context("failed to build fieldvault settings from environment")?;

        let s: Settings = cfg
            .try_deserialize()
            .context("failed to deserialise fieldvault settings")?;

        s.validate()?;
        Ok(s)
    }

    /// Load the key registry named by these settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the key variables are missing or invalid.
    pub fn load_registry(&self) -> Result<KeyRegistry> {
        KeyConfig::from_env(&self.keys_env_prefix)
            .and_then(|c| c.registry())
            .with_context(|| format!("failed to load keys from {}_<N>", self.keys_env_prefix))
    }

    /// Install the tracing subscriber, then load the key registry behind a
    /// fresh [`EngineHandle`].
    ///
    /// Call once at startup.
    ///
    /// # Errors
    ///
    /// Returns an error if a subscriber is already installed or the keys
    /// cannot be loaded.
    pub fn bootstrap(&self) -> Result<EngineHandle> {
        telemetry::init(&self.log_level, self.log_format)?;
        let registry = self.load_registry()?;
        info!(
            key_count = registry.len(),
            default_key_id = %registry.default_key_id(),
            keys_env_prefix = %self.keys_env_prefix,
            "fieldvault ready"
        );
        Ok(EngineHandle::from(registry))
    }

    fn validate(&self) -> Result<()> {
        ensure_non_empty(&self.keys_env_prefix, "FIELDVAULT_KEYS_ENV_PREFIX")?;
        ensure_non_empty(&self.log_level, "FIELDVAULT_LOG_LEVEL")?;
        telemetry::parse_filter(&self.log_level).context("FIELDVAULT_LOG_LEVEL")?;
        Ok(())
    }
}

fn ensure_non_empty(value: &str, name: &str) -> Result<()> {
    if value.trim().is_empty() {
        anyhow::bail!("{name} must not be empty");
    }
    Ok(())
}
