//! The loader: registration entry point and scheduler
//!
//! A [`Loader`] owns every piece of process-wide state: the registry, the
//! top-level ordering queue, live sequences, the work stack and the queue of
//! deferred tasks. Create one per document (or per test) and keep it for the
//! document's lifetime; units are never torn down.
//!
//! All work triggered by a call into the loader finishes before the call
//! returns. The only thing deferred to a later turn is reporting uncaught
//! top-level failures, which [`Loader::run_until_idle`] delivers.

use crate::error::{LoaderError, LoaderResult, UnitError};
use crate::host::{
    DocumentContext, Fetch, FetchOutcome, FetchRequest, FetchTicket, LogUncaught, Origin,
    UncaughtError, UncaughtHandler,
};
use crate::options::LoaderOptions;
use crate::registry::Registry;
use crate::resolver::RequireInbox;
use crate::sequencer::{SequenceTable, Work};
use crate::top_level::TopLevelQueue;
use crate::unit::{Definition, Exports, Pending, Unit, UnitId, UnitState, UnitStatus};
use crate::url::{StandardUrlResolver, UrlResolver};
use serde::Serialize;
use std::collections::VecDeque;

/// Work deferred to a later scheduling turn
#[derive(Debug)]
enum Task {
    ReportUncaught(UncaughtError),
}

/// Point-in-time view of one unit, for diagnostics
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnitSnapshot {
    /// Canonical URL
    pub url: String,
    /// Lifecycle state
    pub status: UnitStatus,
    /// Registered directly by a document
    pub is_top_level: bool,
    /// Cross-origin policy
    pub cross_origin: String,
    /// Current exports
    pub exports: serde_json::Value,
    /// Failure message, if failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Module loader and execution scheduler
pub struct Loader {
    pub(crate) registry: Registry,
    pub(crate) options: LoaderOptions,
    pub(crate) urls: Box<dyn UrlResolver>,
    fetcher: Box<dyn Fetch>,
    uncaught: Box<dyn UncaughtHandler>,
    pub(crate) top_level: TopLevelQueue,
    pub(crate) sequences: SequenceTable,
    pub(crate) work: Vec<Work>,
    pub(crate) inbox: RequireInbox,
    tasks: VecDeque<Task>,
}

impl Loader {
    /// Create a loader with default options
    pub fn new(fetcher: impl Fetch + 'static) -> Self {
        Self::with_options(LoaderOptions::default(), fetcher)
    }

    /// Create a loader with the given options
    pub fn with_options(options: LoaderOptions, fetcher: impl Fetch + 'static) -> Self {
        Self {
            registry: Registry::new(),
            options,
            urls: Box::new(StandardUrlResolver),
            fetcher: Box::new(fetcher),
            uncaught: Box::new(LogUncaught),
            top_level: TopLevelQueue::default(),
            sequences: SequenceTable::default(),
            work: Vec::new(),
            inbox: RequireInbox::default(),
            tasks: VecDeque::new(),
        }
    }

    /// Replace the URL resolver
    pub fn set_url_resolver(&mut self, resolver: impl UrlResolver + 'static) {
        self.urls = Box::new(resolver);
    }

    /// Replace the handler for uncaught top-level failures
    pub fn set_uncaught_handler(&mut self, handler: impl UncaughtHandler + 'static) {
        self.uncaught = Box::new(handler);
    }

    /// Loader options
    pub fn options(&self) -> &LoaderOptions {
        &self.options
    }

    /// Register a definition
    ///
    /// `Origin::Fetched` answers a fetch this loader requested: the unit
    /// resolves its dependencies and waits for a dependent to pull it.
    /// `Origin::Document` registers a new top-level unit, which runs after
    /// every previously registered top-level unit has terminated.
    pub fn define(&mut self, origin: Origin, definition: Definition) -> LoaderResult<UnitId> {
        match origin {
            Origin::Fetched(ticket) => {
                self.complete_fetch(ticket, FetchOutcome::Defined(definition))?;
                Ok(ticket.unit())
            }
            Origin::Document(context) => self.define_top_level(context, definition),
        }
    }

    /// Shorthand for a top-level registration from `context`
    pub fn define_in_document(
        &mut self,
        context: DocumentContext,
        definition: Definition,
    ) -> LoaderResult<UnitId> {
        self.define(Origin::Document(context), definition)
    }

    /// Report the result of a fetch this loader requested
    pub fn complete_fetch(&mut self, ticket: FetchTicket, outcome: FetchOutcome) -> LoaderResult<()> {
        let id = ticket.unit();
        let unit = self
            .registry
            .get(id)
            .ok_or(LoaderError::UnknownTicket(ticket.as_u32()))?;
        if unit.status() != UnitStatus::Loading {
            return Err(LoaderError::UnexpectedFetchResult {
                url: unit.url.clone(),
                status: unit.status(),
            });
        }

        tracing::debug!(url = %unit.url, outcome = ?outcome, "fetch completed");
        match outcome {
            FetchOutcome::Defined(definition) => self.begin_waiting_for_turn(id, definition)?,
            FetchOutcome::Undefined => self.begin_waiting_for_turn(id, Definition::empty())?,
            FetchOutcome::Failed(reason) => {
                let error = UnitError::Load {
                    url: self.registry[id].url.clone(),
                    reason,
                };
                self.fail(id, error)?;
            }
        }

        self.drain()
    }

    /// Run deferred turns until nothing is left to do
    ///
    /// Also picks up `require` calls made outside of any unit body. Returns
    /// the number of turns processed.
    pub fn run_until_idle(&mut self) -> LoaderResult<usize> {
        self.drain()?;

        let mut turns = 0;
        while let Some(task) = self.tasks.pop_front() {
            turns += 1;
            match task {
                Task::ReportUncaught(error) => self.uncaught.uncaught(&error),
            }
            self.drain()?;
        }
        Ok(turns)
    }

    /// Whether deferred turns are waiting for [`run_until_idle`](Self::run_until_idle)
    pub fn has_pending_tasks(&self) -> bool {
        !self.tasks.is_empty() || !self.inbox.borrow().is_empty()
    }

    /// The unit registry
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Get a unit by ID
    pub fn unit(&self, id: UnitId) -> Option<&Unit> {
        self.registry.get(id)
    }

    /// Look up a unit by canonical URL
    pub fn lookup(&self, url: &str) -> Option<&Unit> {
        self.registry.lookup(url).map(|id| &self.registry[id])
    }

    /// State of the unit at `url`
    pub fn status(&self, url: &str) -> Option<UnitStatus> {
        self.lookup(url).map(Unit::status)
    }

    /// Export store of the unit at `url`
    pub fn exports(&self, url: &str) -> Option<Exports> {
        self.lookup(url).map(|unit| unit.exports.clone())
    }

    /// Snapshot of every unit, in creation order
    pub fn snapshot(&self) -> Vec<UnitSnapshot> {
        self.registry
            .iter()
            .map(|(_, unit)| UnitSnapshot {
                url: unit.url.clone(),
                status: unit.status(),
                is_top_level: unit.is_top_level,
                cross_origin: unit.cross_origin.clone(),
                exports: unit.exports.to_json(),
                error: unit.error().map(ToString::to_string),
            })
            .collect()
    }

    /// Transition a unit and queue everything waiting on it
    pub(crate) fn transition(&mut self, id: UnitId, state: UnitState) -> LoaderResult<()> {
        let unit = &mut self.registry[id];
        let from = unit.status();
        let to = state.status();
        let waiters = unit.transition(state)?;

        if self.options.log_transitions {
            tracing::debug!(url = %unit.url, ?from, ?to, waiters = waiters.len(), "state transition");
        } else {
            tracing::trace!(url = %unit.url, ?from, ?to, waiters = waiters.len(), "state transition");
        }

        // Reversed so the first registered waiter is popped first.
        self.work.extend(waiters.into_iter().rev().map(Work::from));
        Ok(())
    }

    /// Ask the host to fetch a unit
    pub(crate) fn begin_loading(&mut self, id: UnitId) -> LoaderResult<()> {
        self.transition(id, UnitState::Loading)?;

        let unit = &self.registry[id];
        let request = FetchRequest {
            ticket: FetchTicket::for_unit(id),
            url: unit.url.clone(),
            cross_origin: unit.cross_origin.clone(),
        };
        tracing::debug!(url = %request.url, cross_origin = %request.cross_origin, "fetch requested");
        self.fetcher.fetch(request);
        Ok(())
    }

    /// Resolve a definition's dependencies and wait to be pulled
    pub(crate) fn begin_waiting_for_turn(
        &mut self,
        id: UnitId,
        definition: Definition,
    ) -> LoaderResult<()> {
        let (args, deps) = self.resolve_specifiers(id, &definition.deps)?;
        self.transition(
            id,
            UnitState::WaitingForTurn(Pending {
                args,
                deps,
                body: definition.body,
            }),
        )
    }

    /// Mark a unit failed
    ///
    /// A top-level unit has nobody to report to, so its error is also
    /// queued for the uncaught handler on the next turn.
    pub(crate) fn fail(&mut self, id: UnitId, error: UnitError) -> LoaderResult<()> {
        let unit = &self.registry[id];
        if unit.is_top_level {
            self.tasks.push_back(Task::ReportUncaught(UncaughtError {
                url: unit.url.clone(),
                error: error.clone(),
            }));
        }
        self.transition(id, UnitState::Failed(error))
    }

    /// Process the work stack until it is empty
    pub(crate) fn drain(&mut self) -> LoaderResult<()> {
        self.collect_requires();
        while let Some(work) = self.work.pop() {
            match work {
                Work::Advance(sequence) => self.advance(sequence)?,
                Work::AwaitPrevious { unit, previous } => self.await_previous(unit, previous)?,
                Work::Require(request) => self.start_require(request)?,
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for Loader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Loader")
            .field("options", &self.options)
            .field("units", &self.registry.len())
            .field("live_sequences", &self.sequences.len())
            .field("pending_tasks", &self.tasks.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn loader() -> (Loader, Rc<RefCell<Vec<FetchRequest>>>) {
        let requests = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&requests);
        let loader = Loader::new(move |request: FetchRequest| sink.borrow_mut().push(request));
        (loader, requests)
    }

    #[test]
    fn test_complete_fetch_unknown_ticket() {
        let (mut loader, _) = loader();
        let result = loader.complete_fetch(FetchTicket::from_u32(7), FetchOutcome::Undefined);
        assert_eq!(result, Err(LoaderError::UnknownTicket(7)));
    }

    #[test]
    fn test_complete_fetch_twice_is_rejected() {
        let (mut loader, requests) = loader();
        loader
            .define_in_document(
                DocumentContext::new("http://example.com/index.html"),
                Definition::new(["./a.js"]),
            )
            .unwrap();

        let ticket = requests.borrow()[0].ticket;
        loader.complete_fetch(ticket, FetchOutcome::Undefined).unwrap();
        let result = loader.complete_fetch(ticket, FetchOutcome::Undefined);
        assert!(matches!(
            result,
            Err(LoaderError::UnexpectedFetchResult {
                status: UnitStatus::Executed,
                ..
            })
        ));
    }

    #[test]
    fn test_document_url_defaults_to_base_url() {
        let options = LoaderOptions {
            base_url: "https://app.example.com/page.html".to_string(),
            ..LoaderOptions::default()
        };
        let mut loader = Loader::with_options(options, |_: FetchRequest| {});
        let id = loader
            .define_in_document(DocumentContext::default(), Definition::empty())
            .unwrap();

        let unit = loader.unit(id).unwrap();
        assert_eq!(unit.url(), "https://app.example.com/page.html#0");
        assert_eq!(unit.cross_origin(), "anonymous");
        assert!(unit.is_top_level());
        assert_eq!(unit.status(), UnitStatus::Executed);
    }

    #[test]
    fn test_invalid_document_url() {
        let (mut loader, _) = loader();
        let result = loader.define_in_document(DocumentContext::new("::nope"), Definition::empty());
        assert!(matches!(result, Err(LoaderError::InvalidDocumentUrl(_))));
    }

    #[test]
    fn test_snapshot_serializes() {
        let (mut loader, _) = loader();
        loader
            .define_in_document(
                DocumentContext::new("http://example.com/index.html"),
                Definition::new(["exports"]).with_body(|args| {
                    args[0].as_exports().unwrap().set("ready", true);
                    Ok(())
                }),
            )
            .unwrap();

        let snapshot = loader.snapshot();
        assert_eq!(snapshot.len(), 1);
        let json = serde_json::to_value(&snapshot[0]).unwrap();
        assert_eq!(json["status"], "Executed");
        assert_eq!(json["exports"]["ready"], true);
        assert!(json.get("error").is_none());
    }
}
