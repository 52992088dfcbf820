//! In-process host: a source table standing in for the network and a fetch
//! queue the embedder settles in whatever order it likes.

use modseq_engine::{Definition, Fetch, FetchOutcome, FetchRequest};
use rustc_hash::FxHashMap;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

/// What evaluating a URL's source does
pub enum Source {
    /// Registers a definition
    Module(Definition),
    /// Runs without registering anything
    Script,
    /// Cannot be fetched
    Failure(String),
}

impl std::fmt::Debug for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Source::Module(definition) => f.debug_tuple("Module").field(definition).finish(),
            Source::Script => f.write_str("Script"),
            Source::Failure(reason) => f.debug_tuple("Failure").field(reason).finish(),
        }
    }
}

/// Sources keyed by canonical URL
///
/// Each source is consumed by the fetch that evaluates it; a URL is only
/// ever fetched once per loader.
#[derive(Debug, Default)]
pub struct SourceTable {
    sources: FxHashMap<String, Source>,
}

impl SourceTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace the source at `url`
    pub fn insert(&mut self, url: String, source: Source) -> Option<Source> {
        self.sources.insert(url, source)
    }

    /// Whether `url` has a source that has not been evaluated yet
    pub fn contains(&self, url: &str) -> bool {
        self.sources.contains_key(url)
    }

    /// Number of sources not yet evaluated
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    /// Whether every source has been evaluated
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Evaluate the source at `url`
    pub fn evaluate(&mut self, url: &str) -> FetchOutcome {
        match self.sources.remove(url) {
            Some(Source::Module(definition)) => FetchOutcome::Defined(definition),
            Some(Source::Script) => FetchOutcome::Undefined,
            Some(Source::Failure(reason)) => FetchOutcome::Failed(reason),
            None => FetchOutcome::Failed(format!("Failed to fetch {url}")),
        }
    }
}

/// [`Fetch`] implementation that queues requests for later delivery
#[derive(Debug, Clone, Default)]
pub struct FetchQueue {
    requests: Rc<RefCell<VecDeque<FetchRequest>>>,
}

impl FetchQueue {
    /// Create an empty queue
    pub fn new() -> Self {
        Self::default()
    }

    /// URLs with a fetch in flight, oldest first
    pub fn pending(&self) -> Vec<String> {
        self.requests
            .borrow()
            .iter()
            .map(|request| request.url.clone())
            .collect()
    }

    /// Number of fetches in flight
    pub fn len(&self) -> usize {
        self.requests.borrow().len()
    }

    /// Whether nothing is in flight
    pub fn is_empty(&self) -> bool {
        self.requests.borrow().is_empty()
    }

    /// Take the oldest request
    pub fn pop(&self) -> Option<FetchRequest> {
        self.requests.borrow_mut().pop_front()
    }

    /// Take the request for `url`, wherever it sits in the queue
    pub fn take(&self, url: &str) -> Option<FetchRequest> {
        let mut requests = self.requests.borrow_mut();
        let index = requests.iter().position(|request| request.url == url)?;
        requests.remove(index)
    }
}

impl Fetch for FetchQueue {
    fn fetch(&mut self, request: FetchRequest) {
        tracing::trace!(url = %request.url, "fetch queued");
        self.requests.borrow_mut().push_back(request);
    }
}
