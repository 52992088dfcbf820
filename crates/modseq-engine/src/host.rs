//! Host collaborators
//!
//! The loader never fetches or evaluates source itself. It asks the host to
//! fetch through [`Fetch`], and the host reports back with
//! [`Loader::complete_fetch`](crate::Loader::complete_fetch) or
//! [`Loader::define`](crate::Loader::define) once the source has run.

use crate::error::UnitError;
use crate::unit::{Definition, UnitId};
use std::fmt;

/// Handle tying a fetch result back to the unit that requested it
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct FetchTicket(u32);

impl FetchTicket {
    pub(crate) fn for_unit(id: UnitId) -> Self {
        FetchTicket(id.as_u32())
    }

    /// Rebuild a ticket from its numeric value
    pub fn from_u32(value: u32) -> Self {
        FetchTicket(value)
    }

    /// Get the numeric ticket value
    pub fn as_u32(self) -> u32 {
        self.0
    }

    pub(crate) fn unit(self) -> UnitId {
        UnitId::from_u32(self.0)
    }
}

impl fmt::Display for FetchTicket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ticket {}", self.0)
    }
}

/// A request for the host to fetch and evaluate one unit's source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    /// Ticket to report the result with
    pub ticket: FetchTicket,
    /// Canonical URL to fetch
    pub url: String,
    /// Cross-origin policy to fetch with
    pub cross_origin: String,
}

/// Loader collaborator: starts fetching a unit's source
///
/// Called at most once per unit. Implementations must not call back into the
/// loader from inside `fetch`; results are reported later.
pub trait Fetch {
    /// Start fetching `request.url`
    fn fetch(&mut self, request: FetchRequest);
}

impl<F> Fetch for F
where
    F: FnMut(FetchRequest),
{
    fn fetch(&mut self, request: FetchRequest) {
        self(request)
    }
}

/// Result of fetching and evaluating a unit's source
pub enum FetchOutcome {
    /// The source registered a definition
    Defined(Definition),
    /// The source ran but never registered: no dependencies and no body
    Undefined,
    /// The source could not be obtained or evaluated
    Failed(String),
}

impl fmt::Debug for FetchOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchOutcome::Defined(definition) => f.debug_tuple("Defined").field(definition).finish(),
            FetchOutcome::Undefined => f.write_str("Undefined"),
            FetchOutcome::Failed(reason) => f.debug_tuple("Failed").field(reason).finish(),
        }
    }
}

/// Where a top-level registration came from
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentContext {
    /// URL of the hosting document or import; the loader's base URL if absent
    pub url: Option<String>,
    /// Cross-origin attribute of the registering script
    pub cross_origin: Option<String>,
}

impl DocumentContext {
    /// Context for a script in the document at `url`
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            cross_origin: None,
        }
    }

    /// Set the cross-origin policy
    pub fn with_cross_origin(mut self, cross_origin: impl Into<String>) -> Self {
        self.cross_origin = Some(cross_origin.into());
        self
    }
}

/// Who is registering a definition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Origin {
    /// Source fetched as a dependency, answering the ticket's request
    Fetched(FetchTicket),
    /// Source embedded directly in a document
    Document(DocumentContext),
}

/// A failed top-level unit, reported on the turn after it failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UncaughtError {
    /// URL of the top-level unit
    pub url: String,
    /// The failure it carries
    pub error: UnitError,
}

/// Receives failures that no dependent can observe
pub trait UncaughtHandler {
    /// Handle one uncaught failure
    fn uncaught(&mut self, error: &UncaughtError);
}

impl<F> UncaughtHandler for F
where
    F: FnMut(&UncaughtError),
{
    fn uncaught(&mut self, error: &UncaughtError) {
        self(error)
    }
}

/// Default handler: log at error level
#[derive(Debug, Default, Clone, Copy)]
pub struct LogUncaught;

impl UncaughtHandler for LogUncaught {
    fn uncaught(&mut self, error: &UncaughtError) {
        tracing::error!(url = %error.url, error = %error.error, "uncaught error in top-level unit");
    }
}
