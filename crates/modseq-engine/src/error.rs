//! Error types for the loader
//!
//! Two families live here:
//! - [`UnitError`] is the payload a unit carries once it has failed. It is
//!   cloned into every dependent that fails because of it.
//! - [`LoaderError`] reports misuse of the loader API by the host, or a
//!   broken internal invariant.

use crate::unit::UnitStatus;
use crate::url::UrlError;
use thiserror::Error;

/// Why a unit reached the `Failed` state
///
/// A dependent that fails because one of its dependencies failed carries the
/// dependency's error unchanged, so every unit on a failing path compares
/// equal to the original error.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum UnitError {
    /// The loader collaborator could not obtain or evaluate the source
    #[error("Failed to load {url}: {reason}")]
    Load {
        /// URL of the unit that failed to load
        url: String,
        /// Reason reported by the host
        reason: String,
    },

    /// The unit body returned an error
    #[error("Error executing {url}: {message}")]
    Execution {
        /// URL of the unit whose body failed
        url: String,
        /// Rendered error chain
        message: String,
    },
}

impl UnitError {
    /// URL of the unit where the failure originated
    pub fn origin(&self) -> &str {
        match self {
            UnitError::Load { url, .. } | UnitError::Execution { url, .. } => url,
        }
    }
}

/// Errors returned by the [`Loader`](crate::Loader) API
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LoaderError {
    /// A state change that the unit lifecycle does not allow
    #[error("Illegal transition for {url}: {from} -> {to}")]
    IllegalTransition {
        /// Unit URL
        url: String,
        /// State before the attempted transition
        from: UnitStatus,
        /// Requested state
        to: UnitStatus,
    },

    /// A fetch result was delivered for a unit that is not loading
    #[error("Unexpected fetch result for {url} (unit is {status})")]
    UnexpectedFetchResult {
        /// Unit URL
        url: String,
        /// Current state of the unit
        status: UnitStatus,
    },

    /// A ticket that was never issued by this loader
    #[error("Unknown fetch ticket: {0}")]
    UnknownTicket(u32),

    /// The URL of a registering document could not be canonicalized
    #[error("Invalid document URL: {0}")]
    InvalidDocumentUrl(#[source] UrlError),

    /// A dependency was waited on before anything started loading it
    #[error("Dependency {0} was awaited before it started loading")]
    DependencyNotLoading(String),
}

/// Loader result type
pub type LoaderResult<T> = Result<T, LoaderError>;
