//! Runtime configuration (`modseq.toml`)
//!
//! ```toml
//! [loader]
//! base_url = "https://app.example.com/index.html"
//! default_cross_origin = "use-credentials"
//! log_transitions = true
//!
//! [logging]
//! filter = "info,modseq_engine=debug"
//! format = "json"
//! ```
//!
//! Every key is optional.

use crate::error::ConfigError;
use crate::logging::LoggingConfig;
use modseq_engine::{LoaderOptions, StandardUrlResolver, UrlResolver};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Cross-origin policies a module fetch can use
const CROSS_ORIGIN_POLICIES: &[&str] = &["anonymous", "use-credentials"];

/// Complete runtime configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RuntimeConfig {
    /// Loader options (`[loader]`)
    pub loader: LoaderOptions,
    /// Tracing setup (`[logging]`)
    pub logging: LoggingConfig,
}

impl RuntimeConfig {
    /// Load and validate a config file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate a config from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: RuntimeConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check values serde cannot
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Err(err) = StandardUrlResolver.canonicalize(&self.loader.base_url) {
            return Err(ConfigError::Invalid(format!("loader.base_url: {err}")));
        }

        if !CROSS_ORIGIN_POLICIES.contains(&self.loader.default_cross_origin.as_str()) {
            return Err(ConfigError::Invalid(format!(
                "loader.default_cross_origin: expected one of {}, got {:?}",
                CROSS_ORIGIN_POLICIES.join(", "),
                self.loader.default_cross_origin
            )));
        }

        Ok(())
    }
}
