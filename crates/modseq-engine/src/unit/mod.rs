//! Units and the values bound into unit bodies
//!
//! A [`Unit`] is the scheduling record for one loadable source, keyed by its
//! canonical URL. Units are never removed; once terminal they keep serving
//! their [`Exports`] to later dependents.

mod state;

pub use state::UnitStatus;
pub(crate) use state::{Armed, Pending, UnitState};

use crate::error::{LoaderError, LoaderResult, UnitError};
use crate::resolver::Require;
use crate::sequencer::Waiter;
use rustc_hash::FxHashMap;
use serde_json::Value;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// Index of a unit in the registry
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UnitId(u32);

impl UnitId {
    /// ID for the unit at `index`
    ///
    /// # Panics
    ///
    /// If `index` does not fit in a `u32`.
    pub(crate) fn new(index: usize) -> Self {
        match u32::try_from(index) {
            Ok(value) => UnitId(value),
            Err(_) => panic!("unit registry is limited to {} units", u32::MAX),
        }
    }

    pub(crate) fn from_u32(value: u32) -> Self {
        UnitId(value)
    }

    /// Position in the registry
    pub fn index(self) -> usize {
        self.0 as usize
    }

    /// Get the numeric ID value
    pub fn as_u32(self) -> u32 {
        self.0
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Export store of a unit
///
/// Cloning an `Exports` clones the handle, not the contents: every dependent
/// that imports a unit sees the same store, and writes made by the owning
/// body are visible to all of them.
#[derive(Clone, Default)]
pub struct Exports {
    values: Rc<RefCell<FxHashMap<String, Value>>>,
}

impl Exports {
    /// Create a new empty export store
    pub fn new() -> Self {
        Self::default()
    }

    /// Get an export by name
    pub fn get(&self, name: &str) -> Option<Value> {
        self.values.borrow().get(name).cloned()
    }

    /// Set an export, returning the previous value
    pub fn set(&self, name: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.values.borrow_mut().insert(name.into(), value.into())
    }

    /// Check if an export exists
    pub fn has(&self, name: &str) -> bool {
        self.values.borrow().contains_key(name)
    }

    /// Export names, sorted
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.values.borrow().keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Number of exports
    pub fn len(&self) -> usize {
        self.values.borrow().len()
    }

    /// Check if nothing has been exported yet
    pub fn is_empty(&self) -> bool {
        self.values.borrow().is_empty()
    }

    /// Whether two handles refer to the same store
    pub fn ptr_eq(&self, other: &Exports) -> bool {
        Rc::ptr_eq(&self.values, &other.values)
    }

    /// Copy the current contents into a JSON object
    pub fn to_json(&self) -> Value {
        let map: serde_json::Map<String, Value> = self
            .values
            .borrow()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        Value::Object(map)
    }
}

impl fmt::Debug for Exports {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Exports").field(&self.keys()).finish()
    }
}

/// Static description bound for the reserved `meta` specifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleMeta {
    /// Unit URL without the synthetic top-level ordinal
    pub url: String,
}

/// A value bound to one declared specifier
#[derive(Debug, Clone)]
pub enum Binding {
    /// The export store of a dependency, or the unit's own for `exports`
    Exports(Exports),
    /// Runtime loader for `require`
    Require(Require),
    /// Descriptor for `meta`
    Meta(ModuleMeta),
}

impl Binding {
    /// The bound export store, if this is one
    pub fn as_exports(&self) -> Option<&Exports> {
        match self {
            Binding::Exports(exports) => Some(exports),
            _ => None,
        }
    }

    /// The bound `require` handle, if this is one
    pub fn as_require(&self) -> Option<&Require> {
        match self {
            Binding::Require(require) => Some(require),
            _ => None,
        }
    }

    /// The bound `meta` descriptor, if this is one
    pub fn as_meta(&self) -> Option<&ModuleMeta> {
        match self {
            Binding::Meta(meta) => Some(meta),
            _ => None,
        }
    }
}

/// A unit body, called once with the bindings of its declared specifiers
pub type Body = Box<dyn FnOnce(Vec<Binding>) -> anyhow::Result<()>>;

/// What a unit's source declared: its dependency specifiers and its body
pub struct Definition {
    /// Dependency specifiers, in declared order
    pub deps: Vec<String>,
    /// Body to run once the dependencies are done
    pub body: Option<Body>,
}

impl Definition {
    /// A definition with dependencies but no body
    pub fn new<I, S>(deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            deps: deps.into_iter().map(Into::into).collect(),
            body: None,
        }
    }

    /// A definition with no dependencies and no body
    pub fn empty() -> Self {
        Self {
            deps: Vec::new(),
            body: None,
        }
    }

    /// Attach a body
    pub fn with_body<F>(mut self, body: F) -> Self
    where
        F: FnOnce(Vec<Binding>) -> anyhow::Result<()> + 'static,
    {
        self.body = Some(Box::new(body));
        self
    }
}

impl fmt::Debug for Definition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Definition")
            .field("deps", &self.deps)
            .field("has_body", &self.body.is_some())
            .finish()
    }
}

/// Scheduling record for one loadable source
pub struct Unit {
    pub(crate) url: String,
    pub(crate) url_base: String,
    pub(crate) exports: Exports,
    pub(crate) state: UnitState,
    pub(crate) is_top_level: bool,
    pub(crate) cross_origin: String,
    pub(crate) waiters: Vec<Waiter>,
}

impl Unit {
    pub(crate) fn new(url: String, url_base: String, cross_origin: String) -> Self {
        Self {
            url,
            url_base,
            exports: Exports::new(),
            state: UnitState::Initialized,
            is_top_level: false,
            cross_origin,
            waiters: Vec::new(),
        }
    }

    /// Canonical URL (registry key)
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Prefix used to resolve relative specifiers
    pub fn url_base(&self) -> &str {
        &self.url_base
    }

    /// The unit's export store
    pub fn exports(&self) -> &Exports {
        &self.exports
    }

    /// Current lifecycle state
    pub fn status(&self) -> UnitStatus {
        self.state.status()
    }

    /// Whether the unit was registered directly by a document
    pub fn is_top_level(&self) -> bool {
        self.is_top_level
    }

    /// Cross-origin policy passed to the loader collaborator
    pub fn cross_origin(&self) -> &str {
        &self.cross_origin
    }

    /// Error payload, if the unit failed
    pub fn error(&self) -> Option<&UnitError> {
        match &self.state {
            UnitState::Failed(err) => Some(err),
            _ => None,
        }
    }

    /// URL with the synthetic top-level ordinal removed
    pub fn meta_url(&self) -> &str {
        if self.is_top_level {
            if let Some(pos) = self.url.rfind('#') {
                return &self.url[..pos];
            }
        }
        &self.url
    }

    /// Move to `next`, returning the waiters registered for this transition
    ///
    /// The returned list is the snapshot taken at transition time; waiters
    /// added while the caller processes it belong to the next transition.
    pub(crate) fn transition(&mut self, next: UnitState) -> LoaderResult<Vec<Waiter>> {
        let from = self.state.status();
        let to = next.status();
        if !from.can_transition_to(to) {
            return Err(LoaderError::IllegalTransition {
                url: self.url.clone(),
                from,
                to,
            });
        }
        self.state = next;
        Ok(std::mem::take(&mut self.waiters))
    }

    /// Register a waiter for the next transition
    pub(crate) fn wait(&mut self, waiter: Waiter) {
        self.waiters.push(waiter);
    }

    /// Take the resolved dependency data out of a `WaitingForTurn` unit
    pub(crate) fn take_pending(&mut self) -> Option<Pending> {
        match &mut self.state {
            UnitState::WaitingForTurn(pending) => Some(std::mem::take(pending)),
            _ => None,
        }
    }

    /// Take the arguments and body out of a `WaitingOnDeps` unit
    pub(crate) fn take_armed(&mut self) -> Option<Armed> {
        match &mut self.state {
            UnitState::WaitingOnDeps(armed) => Some(std::mem::take(armed)),
            _ => None,
        }
    }
}

impl fmt::Debug for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Unit")
            .field("url", &self.url)
            .field("status", &self.status())
            .field("is_top_level", &self.is_top_level)
            .field("cross_origin", &self.cross_origin)
            .field("waiters", &self.waiters.len())
            .finish()
    }
}
