//! Configuration, loaded from TOML. Every section falls back to defaults.

mod cache_config;
pub mod defaults;
mod observability_config;
mod prediction_config;

use std::path::Path;

use serde::{Deserialize, Serialize};

pub use cache_config::CacheConfig;
pub use observability_config::ObservabilityConfig;
pub use prediction_config::PredictionConfig;

use crate::errors::{ConfigError, LexisResult};

/// Top-level configuration for the embedding cache engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LexisConfig {
    pub cache: CacheConfig,
    pub prediction: PredictionConfig,
    pub observability: ObservabilityConfig,
}

impl LexisConfig {
    /// Parse configuration from a TOML document.
    pub fn from_toml(source: &str) -> LexisResult<Self> {
        let config = toml::from_str(source).map_err(|e| ConfigError::InvalidToml {
            reason: e.to_string(),
        })?;
        Ok(config)
    }

    /// Read and parse a TOML configuration file.
    pub fn from_file(path: &Path) -> LexisResult<Self> {
        let source = std::fs::read_to_string(path).map_err(|e| ConfigError::Unreadable {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::from_toml(&source)
    }

    /// Serialize back to TOML.
    pub fn to_toml(&self) -> LexisResult<String> {
        let text = toml::to_string(self).map_err(|e| ConfigError::InvalidToml {
            reason: e.to_string(),
        })?;
        Ok(text)
    }
}
