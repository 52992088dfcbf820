//! Top-level ordering
//!
//! Units registered directly by a document run in registration order, like
//! successive module scripts, whatever order their dependencies arrive in.
//! Each one waits for the previous top-level unit to reach a terminal state;
//! a failure terminates just as well as success does.

use crate::error::{LoaderError, LoaderResult};
use crate::host::DocumentContext;
use crate::loader::Loader;
use crate::sequencer::{Waiter, Work};
use crate::unit::{Definition, UnitId};

/// Ordering state shared by all top-level registrations
#[derive(Debug, Default)]
pub(crate) struct TopLevelQueue {
    /// Most recently registered top-level unit
    previous: Option<UnitId>,
    /// Suffix for the next synthetic top-level URL
    next_ordinal: usize,
}

impl TopLevelQueue {
    fn next_ordinal(&mut self) -> usize {
        let ordinal = self.next_ordinal;
        self.next_ordinal += 1;
        ordinal
    }
}

impl Loader {
    /// Register a unit embedded in a document
    pub(crate) fn define_top_level(
        &mut self,
        context: DocumentContext,
        definition: Definition,
    ) -> LoaderResult<UnitId> {
        let document_url = context
            .url
            .unwrap_or_else(|| self.options.base_url.clone());
        let document_url = self
            .urls
            .canonicalize(&document_url)
            .map_err(LoaderError::InvalidDocumentUrl)?;
        let document_url = match document_url.split_once('#') {
            Some((without_fragment, _)) => without_fragment.to_string(),
            None => document_url,
        };

        let url = format!("{}#{}", document_url, self.top_level.next_ordinal());
        let cross_origin = context
            .cross_origin
            .unwrap_or_else(|| self.options.default_cross_origin.clone());

        let id = self.registry.get_or_create(&url, &cross_origin);
        self.registry[id].is_top_level = true;
        self.begin_waiting_for_turn(id, definition)?;

        // Recorded now, so the next registration waits on this one.
        match self.top_level.previous.replace(id) {
            Some(previous) => {
                tracing::debug!(
                    url = %url,
                    previous = %self.registry[previous].url,
                    "top-level unit queued"
                );
                self.work.push(Work::AwaitPrevious { unit: id, previous });
            }
            None => self.begin_waiting_on_deps(id)?,
        }

        self.drain()?;
        Ok(id)
    }

    /// Start `unit` if `previous` has terminated, otherwise keep waiting
    pub(crate) fn await_previous(&mut self, unit: UnitId, previous: UnitId) -> LoaderResult<()> {
        if self.registry[previous].status().is_terminal() {
            tracing::debug!(url = %self.registry[unit].url, "top-level unit's turn");
            return self.begin_waiting_on_deps(unit);
        }
        self.registry[previous].wait(Waiter::TopLevel { unit, previous });
        Ok(())
    }
}
