//! Shared test harness: a loader whose fetches are recorded and completed by
//! hand, plus an execution log written by unit bodies.

#![allow(dead_code)]

use modseq_engine::{
    Binding, Definition, DocumentContext, FetchOutcome, FetchRequest, FetchTicket, Loader,
    UncaughtError, UnitId, UnitStatus,
};
use std::cell::RefCell;
use std::rc::Rc;

pub const DOC: &str = "http://example.com/index.html";

pub struct Harness {
    pub loader: Loader,
    requests: Rc<RefCell<Vec<FetchRequest>>>,
    log: Rc<RefCell<Vec<String>>>,
    uncaught: Rc<RefCell<Vec<UncaughtError>>>,
}

impl Harness {
    pub fn new() -> Self {
        let requests = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&requests);
        let mut loader = Loader::new(move |request: FetchRequest| sink.borrow_mut().push(request));

        let uncaught = Rc::new(RefCell::new(Vec::new()));
        let uncaught_sink = Rc::clone(&uncaught);
        loader.set_uncaught_handler(move |error: &UncaughtError| {
            uncaught_sink.borrow_mut().push(error.clone())
        });

        Self {
            loader,
            requests,
            log: Rc::new(RefCell::new(Vec::new())),
            uncaught,
        }
    }

    /// Definition whose body appends `name` to the execution log
    pub fn module(&self, name: &str, deps: &[&str]) -> Definition {
        let log = Rc::clone(&self.log);
        let name = name.to_string();
        Definition::new(deps.iter().copied()).with_body(move |_| {
            log.borrow_mut().push(name);
            Ok(())
        })
    }

    /// Definition with a custom body that also logs `name` first
    pub fn module_with<F>(&self, name: &str, deps: &[&str], body: F) -> Definition
    where
        F: FnOnce(Vec<Binding>) -> anyhow::Result<()> + 'static,
    {
        let log = Rc::clone(&self.log);
        let name = name.to_string();
        Definition::new(deps.iter().copied()).with_body(move |args| {
            log.borrow_mut().push(name);
            body(args)
        })
    }

    /// Register a top-level unit in the test document
    pub fn top_level(&mut self, name: &str, deps: &[&str]) -> UnitId {
        let definition = self.module(name, deps);
        self.loader
            .define_in_document(DocumentContext::new(DOC), definition)
            .unwrap()
    }

    pub fn ticket(&self, url: &str) -> FetchTicket {
        self.requests
            .borrow()
            .iter()
            .find(|request| request.url == url)
            .unwrap_or_else(|| panic!("{url} was never requested"))
            .ticket
    }

    /// URLs requested so far, in request order
    pub fn requested(&self) -> Vec<String> {
        self.requests.borrow().iter().map(|r| r.url.clone()).collect()
    }

    pub fn request(&self, url: &str) -> FetchRequest {
        self.requests
            .borrow()
            .iter()
            .find(|request| request.url == url)
            .cloned()
            .unwrap_or_else(|| panic!("{url} was never requested"))
    }

    pub fn deliver(&mut self, url: &str, definition: Definition) {
        let ticket = self.ticket(url);
        self.loader
            .complete_fetch(ticket, FetchOutcome::Defined(definition))
            .unwrap();
    }

    pub fn deliver_undefined(&mut self, url: &str) {
        let ticket = self.ticket(url);
        self.loader
            .complete_fetch(ticket, FetchOutcome::Undefined)
            .unwrap();
    }

    pub fn fail_fetch(&mut self, url: &str) {
        let ticket = self.ticket(url);
        self.loader
            .complete_fetch(ticket, FetchOutcome::Failed(format!("Failed to fetch {url}")))
            .unwrap();
    }

    pub fn status(&self, url: &str) -> UnitStatus {
        self.loader
            .status(url)
            .unwrap_or_else(|| panic!("no unit for {url}"))
    }

    pub fn status_of(&self, id: UnitId) -> UnitStatus {
        self.loader.unit(id).unwrap().status()
    }

    pub fn log(&self) -> Vec<String> {
        self.log.borrow().clone()
    }

    pub fn log_handle(&self) -> Rc<RefCell<Vec<String>>> {
        Rc::clone(&self.log)
    }

    pub fn uncaught(&self) -> Vec<UncaughtError> {
        self.uncaught.borrow().clone()
    }
}

pub fn url(path: &str) -> String {
    format!("http://example.com/{path}")
}
