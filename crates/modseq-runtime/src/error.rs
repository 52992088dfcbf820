//! Runtime error types.

use modseq_engine::{LoaderError, UrlError};

/// Errors reading or validating a runtime configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the config file
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to parse TOML
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// Parsed, but the values make no sense
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Errors that can occur while hosting units
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    /// The loader rejected an operation
    #[error("Loader error: {0}")]
    Loader(#[from] LoaderError),

    /// Configuration error
    #[error("{0}")]
    Config(#[from] ConfigError),

    /// A source URL could not be canonicalized
    #[error("{0}")]
    Url(#[from] UrlError),

    /// A global tracing subscriber is already installed
    #[error("Failed to initialize tracing: {0}")]
    Logging(#[from] tracing_subscriber::util::TryInitError),

    /// `deliver` named a URL with no fetch in flight
    #[error("No fetch in flight for {0}")]
    NotRequested(String),
}
