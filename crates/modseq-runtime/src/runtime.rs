//! Runtime: a loader wired to the in-process host

use crate::config::RuntimeConfig;
use crate::error::RuntimeError;
use crate::host::{FetchQueue, Source, SourceTable};
use modseq_engine::{
    Definition, DocumentContext, Loader, LoaderOptions, StandardUrlResolver, UnitId, UrlResolver,
};

/// Loader plus the host it fetches from
///
/// Sources are registered up front with [`add_module`](Self::add_module)
/// and friends. Fetches the loader starts stay in flight until
/// [`deliver`](Self::deliver) or [`run`](Self::run) settles them, which
/// lets callers replay any network completion order.
pub struct Runtime {
    loader: Loader,
    sources: SourceTable,
    queue: FetchQueue,
}

impl Runtime {
    /// Create a runtime with default options
    pub fn new() -> Self {
        Self::with_options(LoaderOptions::default())
    }

    /// Create a runtime with the given loader options
    pub fn with_options(options: LoaderOptions) -> Self {
        let queue = FetchQueue::new();
        Self {
            loader: Loader::with_options(options, queue.clone()),
            sources: SourceTable::new(),
            queue,
        }
    }

    /// Create a runtime from a validated config
    pub fn from_config(config: &RuntimeConfig) -> Result<Self, RuntimeError> {
        config.validate()?;
        Ok(Self::with_options(config.loader.clone()))
    }

    /// Register a source that defines `definition` when fetched
    pub fn add_module(&mut self, url: &str, definition: Definition) -> Result<(), RuntimeError> {
        self.add_source(url, Source::Module(definition))
    }

    /// Register a source that runs without defining anything
    pub fn add_script(&mut self, url: &str) -> Result<(), RuntimeError> {
        self.add_source(url, Source::Script)
    }

    /// Register a source whose fetch fails with `reason`
    pub fn add_failure(&mut self, url: &str, reason: impl Into<String>) -> Result<(), RuntimeError> {
        self.add_source(url, Source::Failure(reason.into()))
    }

    fn add_source(&mut self, url: &str, source: Source) -> Result<(), RuntimeError> {
        let url = StandardUrlResolver.canonicalize(url)?;
        tracing::debug!(url = %url, source = ?source, "source registered");
        self.sources.insert(url, source);
        Ok(())
    }

    /// Run an inline module script in the document at `document_url`
    pub fn run_script(
        &mut self,
        document_url: &str,
        definition: Definition,
    ) -> Result<UnitId, RuntimeError> {
        self.run_script_in(DocumentContext::new(document_url), definition)
    }

    /// Run an inline module script with a full document context
    pub fn run_script_in(
        &mut self,
        context: DocumentContext,
        definition: Definition,
    ) -> Result<UnitId, RuntimeError> {
        Ok(self.loader.define_in_document(context, definition)?)
    }

    /// URLs with a fetch in flight, oldest first
    pub fn pending_fetches(&self) -> Vec<String> {
        self.queue.pending()
    }

    /// Settle the in-flight fetch for `url`
    pub fn deliver(&mut self, url: &str) -> Result<(), RuntimeError> {
        let url = StandardUrlResolver.canonicalize(url)?;
        let request = self
            .queue
            .take(&url)
            .ok_or_else(|| RuntimeError::NotRequested(url.clone()))?;

        let outcome = self.sources.evaluate(&request.url);
        self.loader.complete_fetch(request.ticket, outcome)?;
        Ok(())
    }

    /// Settle every fetch, oldest first, then run deferred turns
    ///
    /// Fetches started along the way are settled too. Returns the number of
    /// fetches settled.
    pub fn run(&mut self) -> Result<usize, RuntimeError> {
        let mut settled = 0;
        loop {
            while let Some(request) = self.queue.pop() {
                let outcome = self.sources.evaluate(&request.url);
                self.loader.complete_fetch(request.ticket, outcome)?;
                settled += 1;
            }

            // Deferred turns can start new fetches through `require`.
            self.loader.run_until_idle()?;
            if self.queue.is_empty() {
                break;
            }
        }
        Ok(settled)
    }

    /// The loader
    pub fn loader(&self) -> &Loader {
        &self.loader
    }

    /// The loader, for hooks such as the uncaught handler
    pub fn loader_mut(&mut self) -> &mut Loader {
        &mut self.loader
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("loader", &self.loader)
            .field("sources", &self.sources.len())
            .field("in_flight", &self.queue.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use modseq_engine::UnitStatus;

    #[test]
    fn test_deliver_unrequested_url() {
        let mut runtime = Runtime::new();
        runtime.add_script("http://example.com/a.js").unwrap();
        let result = runtime.deliver("http://example.com/a.js");
        assert!(matches!(result, Err(RuntimeError::NotRequested(url)) if url == "http://example.com/a.js"));
    }

    #[test]
    fn test_missing_source_fails_to_fetch() {
        let mut runtime = Runtime::new();
        let id = runtime
            .run_script("http://example.com/", Definition::new(["./nope.js"]))
            .unwrap();
        runtime.run().unwrap();

        let unit = runtime.loader().unit(id).unwrap();
        assert_eq!(unit.status(), UnitStatus::Failed);
        assert_eq!(
            unit.error().unwrap().to_string(),
            "Failed to load http://example.com/nope.js: Failed to fetch http://example.com/nope.js"
        );
    }

    #[test]
    fn test_from_config_uses_loader_options() {
        let config = RuntimeConfig::from_toml_str(
            "[loader]\nbase_url = \"https://app.example.com/main.html\"\n",
        )
        .unwrap();
        let mut runtime = Runtime::from_config(&config).unwrap();
        let id = runtime
            .run_script_in(DocumentContext::default(), Definition::empty())
            .unwrap();
        assert_eq!(
            runtime.loader().unit(id).unwrap().url(),
            "https://app.example.com/main.html#0"
        );
    }
}
