//! YAML configuration file support for the tern pipeline.
//!
//! Bundles the per-stage configs into a single file loaded at startup:
//!
//! ```yaml
//! version: "1.0"
//! name: "edge ingest"
//!
//! codec:
//!   version: 1
//!   max_items: 100
//!   max_payload_bytes: 20971520
//!
//! normalize:
//!   version: 1
//!   fold_measurement_keys: true
//!   strip_non_transaction_measures: true
//!   derive_log_entry: true
//! ```
//!
//! Every stage section is optional and falls back to its defaults, so an
//! empty file apart from `version` is a valid config.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use envelope::CodecConfig;
use normalize::NormalizeConfig;

/// Errors that can occur when loading a pipeline configuration file.
#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("unsupported config version: {0}")]
    UnsupportedVersion(String),
}

/// Top-level configuration for the whole pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct PipelineConfig {
    /// Configuration format version.
    pub version: String,

    /// Optional configuration name/description.
    #[serde(default)]
    pub name: Option<String>,

    /// Codec stage configuration (parse limits).
    #[serde(default)]
    pub codec: CodecConfig,

    /// Normalization stage configuration (rule toggles).
    #[serde(default)]
    pub normalize: NormalizeConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            name: None,
            codec: CodecConfig::default(),
            normalize: NormalizeConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Loads and validates a configuration from a YAML file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigLoadError> {
        let raw = fs::read_to_string(path)?;
        Self::from_yaml(&raw)
    }

    /// Parses and validates a configuration from YAML text.
    pub fn from_yaml(raw: &str) -> Result<Self, ConfigLoadError> {
        let cfg: PipelineConfig = serde_yaml::from_str(raw)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Checks the config version and every stage section.
    pub fn validate(&self) -> Result<(), ConfigLoadError> {
        if self.version != "1.0" {
            return Err(ConfigLoadError::UnsupportedVersion(self.version.clone()));
        }
        self.codec
            .validate()
            .map_err(|err| ConfigLoadError::Validation(err.to_string()))?;
        self.normalize
            .validate()
            .map_err(|err| ConfigLoadError::Validation(err.to_string()))?;
        Ok(())
    }
}
