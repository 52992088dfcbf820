//! Loader options

use serde::{Deserialize, Serialize};

/// Options for a [`Loader`](crate::Loader)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoaderOptions {
    /// Document URL used when a top-level registration does not name one
    pub base_url: String,

    /// Cross-origin policy for top-level units that do not specify one
    ///
    /// Native module scripts default to `anonymous`.
    pub default_cross_origin: String,

    /// Log every state transition at debug level instead of trace
    pub log_transitions: bool,
}

impl Default for LoaderOptions {
    fn default() -> Self {
        Self {
            base_url: "http://localhost/".to_string(),
            default_cross_origin: "anonymous".to_string(),
            log_transitions: false,
        }
    }
}
