//! Parser limits and codec configuration.
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration errors surfaced by [`CodecConfig::validate`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConfigError {
    /// The config version is not supported by this build.
    #[error("unsupported codec config version {0}, expected {CONFIG_VERSION}")]
    UnsupportedVersion(u32),

    /// A limit was set to zero, which would reject every envelope.
    #[error("limit `{0}` must be greater than zero when set")]
    ZeroLimit(&'static str),
}

/// Current codec config schema version.
pub const CONFIG_VERSION: u32 = 1;

/// Limits applied while parsing an envelope.
///
/// Both limits default to `None` (unlimited): the codec itself is
/// policy-free, and deployments opt into limits where untrusted input
/// arrives. Declared payload lengths are checked against
/// `max_payload_bytes` before any allocation.
///
/// # Example
///
/// ```rust
/// use envelope::CodecConfig;
///
/// let cfg = CodecConfig {
///     max_items: Some(100),
///     max_payload_bytes: Some(20 * 1024 * 1024),
///     ..CodecConfig::default()
/// };
/// assert!(cfg.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CodecConfig {
    /// Config schema version, for forward-compatible config files.
    pub version: u32,

    /// Maximum number of items accepted per envelope.
    pub max_items: Option<usize>,

    /// Maximum declared payload size accepted per item, in bytes.
    pub max_payload_bytes: Option<usize>,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            max_items: None,
            max_payload_bytes: None,
        }
    }
}

impl CodecConfig {
    /// Checks the config for values that could never work.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version != CONFIG_VERSION {
            return Err(ConfigError::UnsupportedVersion(self.version));
        }
        if self.max_items == Some(0) {
            return Err(ConfigError::ZeroLimit("max_items"));
        }
        if self.max_payload_bytes == Some(0) {
            return Err(ConfigError::ZeroLimit("max_payload_bytes"));
        }
        Ok(())
    }
}
