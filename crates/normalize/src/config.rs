//! Normalization rule toggles.
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration errors surfaced by [`NormalizeConfig::validate`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConfigError {
    /// The config version is not supported by this build.
    #[error("unsupported normalize config version {0}, expected {CONFIG_VERSION}")]
    UnsupportedVersion(u32),
}

/// Current normalize config schema version.
pub const CONFIG_VERSION: u32 = 1;

/// Toggles for the individual normalization rules.
///
/// All rules default to enabled. Disabling a rule leaves the corresponding
/// payload fields untouched; it never changes framing or item order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NormalizeConfig {
    /// Config schema version, for forward-compatible config files.
    pub version: u32,

    /// Lowercase every key under `contexts.measures.measurements`.
    pub fold_measurement_keys: bool,

    /// Delete `contexts.measures` from payloads that are not
    /// transaction-kinded.
    pub strip_non_transaction_measures: bool,

    /// Rewrite a top-level string `message` into
    /// `logentry: {"formatted": ...}`.
    pub derive_log_entry: bool,
}

impl Default for NormalizeConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            fold_measurement_keys: true,
            strip_non_transaction_measures: true,
            derive_log_entry: true,
        }
    }
}

impl NormalizeConfig {
    /// Checks the config for values that could never work.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version != CONFIG_VERSION {
            return Err(ConfigError::UnsupportedVersion(self.version));
        }
        Ok(())
    }
}
