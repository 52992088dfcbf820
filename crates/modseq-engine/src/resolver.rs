//! Dependency resolution
//!
//! Turns a unit's declared specifiers into bound arguments and dependency
//! units. Reserved specifiers bind values owned by the declaring unit:
//!
//! - `exports` => the unit's own export store
//! - `require` => a [`Require`] handle resolving relative to the unit
//! - `meta` => `{ url }` with the top-level ordinal removed
//!
//! Any other specifier is a URL. Its unit is created on first reference and
//! starts loading right away; fetches overlap, execution does not.

use crate::error::{LoaderResult, UnitError};
use crate::loader::Loader;
use crate::sequencer::{Continuation, Sequence, Work};
use crate::unit::{Binding, ModuleMeta, UnitId, UnitStatus};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;

/// Reserved specifier binding the unit's own export store
pub const EXPORTS: &str = "exports";
/// Reserved specifier binding a [`Require`] handle
pub const REQUIRE: &str = "require";
/// Reserved specifier binding a [`ModuleMeta`]
pub const META: &str = "meta";

/// Callback receiving the bindings of a completed `require`
pub type OnDone = Box<dyn FnOnce(Vec<Binding>)>;
/// Callback receiving the failure of a `require`
pub type OnError = Box<dyn FnOnce(UnitError)>;

pub(crate) type RequireInbox = Rc<RefCell<VecDeque<RequireRequest>>>;

pub(crate) struct RequireRequest {
    caller: UnitId,
    deps: Vec<String>,
    on_done: Option<OnDone>,
    on_error: Option<OnError>,
}

/// Runtime loader bound for the `require` specifier
///
/// Requests are queued and picked up by the loader as soon as the code that
/// made them returns control, so a body can call `require` freely while it
/// runs. Relative specifiers resolve against the unit that declared
/// `require`, not the one calling it.
#[derive(Clone)]
pub struct Require {
    caller: UnitId,
    inbox: RequireInbox,
}

impl Require {
    /// Load `deps`, then call `on_done` with their bindings or `on_error`
    /// with the first failure
    pub fn call<I, S, D, E>(&self, deps: I, on_done: D, on_error: E)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        D: FnOnce(Vec<Binding>) + 'static,
        E: FnOnce(UnitError) + 'static,
    {
        self.enqueue(deps, Some(Box::new(on_done)), Some(Box::new(on_error)));
    }

    /// Load `deps` and call `on_done` on success; failures are only logged
    pub fn load<I, S, D>(&self, deps: I, on_done: D)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        D: FnOnce(Vec<Binding>) + 'static,
    {
        self.enqueue(deps, Some(Box::new(on_done)), None);
    }

    /// Unit that declared this handle
    pub fn caller(&self) -> UnitId {
        self.caller
    }

    fn enqueue<I, S>(&self, deps: I, on_done: Option<OnDone>, on_error: Option<OnError>)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.inbox.borrow_mut().push_back(RequireRequest {
            caller: self.caller,
            deps: deps.into_iter().map(Into::into).collect(),
            on_done,
            on_error,
        });
    }
}

impl fmt::Debug for Require {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Require").field("caller", &self.caller).finish()
    }
}

impl Loader {
    /// Bind `specifiers` for `id`, starting loads for new dependencies
    ///
    /// Returns the bound arguments (one per specifier) and the real
    /// dependency units, both in declared order.
    pub(crate) fn resolve_specifiers(
        &mut self,
        id: UnitId,
        specifiers: &[String],
    ) -> LoaderResult<(Vec<Binding>, Vec<UnitId>)> {
        let mut args = Vec::with_capacity(specifiers.len());
        let mut deps = Vec::new();

        for specifier in specifiers {
            let unit = &self.registry[id];
            match specifier.as_str() {
                EXPORTS => args.push(Binding::Exports(unit.exports.clone())),
                REQUIRE => args.push(Binding::Require(Require {
                    caller: id,
                    inbox: Rc::clone(&self.inbox),
                })),
                META => args.push(Binding::Meta(ModuleMeta {
                    url: unit.meta_url().to_string(),
                })),
                _ => {
                    let dep = self.dependency(id, specifier)?;
                    args.push(Binding::Exports(self.registry[dep].exports.clone()));
                    deps.push(dep);
                }
            }
        }

        Ok((args, deps))
    }

    /// Get or create the unit `specifier` names from `id`, loading it if new
    fn dependency(&mut self, id: UnitId, specifier: &str) -> LoaderResult<UnitId> {
        let unit = &self.registry[id];
        let cross_origin = unit.cross_origin.clone();

        match self.urls.resolve(&unit.url_base, specifier) {
            Ok(url) => {
                let dep = self.registry.get_or_create(&url, &cross_origin);
                if self.registry[dep].status() == UnitStatus::Initialized {
                    self.begin_loading(dep)?;
                }
                Ok(dep)
            }
            Err(err) => {
                // Keyed by the raw specifier; it can never be fetched.
                let dep = self.registry.get_or_create(specifier, &cross_origin);
                if self.registry[dep].status() == UnitStatus::Initialized {
                    let error = UnitError::Load {
                        url: specifier.to_string(),
                        reason: err.to_string(),
                    };
                    self.fail(dep, error)?;
                }
                Ok(dep)
            }
        }
    }

    /// Move queued `require` calls onto the work stack
    pub(crate) fn collect_requires(&mut self) {
        let requests: Vec<RequireRequest> = self.inbox.borrow_mut().drain(..).collect();
        for request in requests.into_iter().rev() {
            self.work.push(Work::Require(request));
        }
    }

    /// Resolve a `require` call and start driving its dependencies
    pub(crate) fn start_require(&mut self, request: RequireRequest) -> LoaderResult<()> {
        let RequireRequest {
            caller,
            deps,
            on_done,
            on_error,
        } = request;

        tracing::debug!(caller = %self.registry[caller].url, deps = ?deps, "require");
        let (args, deps) = self.resolve_specifiers(caller, &deps)?;
        let sequence = self.sequences.insert(Sequence::new(
            deps,
            Continuation::Require {
                args,
                on_done,
                on_error,
            },
        ));
        self.work.push(Work::Advance(sequence));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::FetchRequest;

    fn loader() -> (Loader, Rc<RefCell<Vec<FetchRequest>>>) {
        let requests = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&requests);
        let loader = Loader::new(move |request: FetchRequest| sink.borrow_mut().push(request));
        (loader, requests)
    }

    #[test]
    fn test_reserved_specifiers() {
        let (mut loader, requests) = loader();
        let id = loader
            .registry
            .get_or_create("http://example.com/app/main.js", "anonymous");

        let specifiers: Vec<String> = ["exports", "require", "meta"].map(String::from).to_vec();
        let (args, deps) = loader.resolve_specifiers(id, &specifiers).unwrap();

        assert!(deps.is_empty());
        assert!(requests.borrow().is_empty());
        assert!(args[0]
            .as_exports()
            .unwrap()
            .ptr_eq(&loader.registry[id].exports));
        assert_eq!(args[1].as_require().unwrap().caller(), id);
        assert_eq!(
            args[2].as_meta().unwrap().url,
            "http://example.com/app/main.js"
        );
    }

    #[test]
    fn test_url_specifiers_start_loading_once() {
        let (mut loader, requests) = loader();
        let id = loader
            .registry
            .get_or_create("http://example.com/app/main.js", "use-credentials");

        let specifiers: Vec<String> = ["./a.js", "../b.js", "./a.js"].map(String::from).to_vec();
        let (args, deps) = loader.resolve_specifiers(id, &specifiers).unwrap();

        assert_eq!(args.len(), 3);
        assert_eq!(deps.len(), 3);
        assert_eq!(deps[0], deps[2]);

        let requests = requests.borrow();
        let urls: Vec<&str> = requests.iter().map(|r| r.url.as_str()).collect();
        assert_eq!(
            urls,
            vec!["http://example.com/app/a.js", "http://example.com/b.js"]
        );
        assert!(requests.iter().all(|r| r.cross_origin == "use-credentials"));
        assert_eq!(loader.registry[deps[0]].status(), UnitStatus::Loading);
    }

    #[test]
    fn test_invalid_specifier_fails_without_fetch() {
        let (mut loader, requests) = loader();
        let id = loader
            .registry
            .get_or_create("http://example.com/main.js", "anonymous");

        let specifiers = vec!["http://[::1".to_string()];
        let (_, deps) = loader.resolve_specifiers(id, &specifiers).unwrap();

        assert!(requests.borrow().is_empty());
        assert_eq!(loader.registry[deps[0]].status(), UnitStatus::Failed);
        assert!(matches!(
            loader.registry[deps[0]].error(),
            Some(UnitError::Load { .. })
        ));
    }
}
