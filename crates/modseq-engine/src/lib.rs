//! Modseq Engine
//!
//! ES-module execution semantics on top of a "declare my dependencies and
//! body" registration call:
//! - **Registry**: one [`Unit`] per canonical URL, never removed
//! - **State machine**: six lifecycle states with checked transitions
//! - **Resolver**: specifiers to bindings, starting loads as needed
//! - **Sequencer**: dependencies run before bodies, each body exactly once,
//!   cycles broken by skipping the back edge
//! - **Top-level ordering**: document-registered units run in registration
//!   order regardless of fetch completion order
//!
//! Fetching and evaluating source is the host's job; see [`host`].
//!
//! # Example
//!
//! ```rust,ignore
//! use modseq_engine::{DocumentContext, Definition, FetchOutcome, Loader};
//!
//! let mut loader = Loader::new(|request| queue.push(request));
//! loader.define_in_document(
//!     DocumentContext::new("https://example.com/index.html"),
//!     Definition::new(["./app.js"]).with_body(|args| {
//!         let app = args[0].as_exports().unwrap();
//!         println!("{:?}", app.get("version"));
//!         Ok(())
//!     }),
//! )?;
//!
//! // later, when the host has evaluated app.js
//! loader.complete_fetch(ticket, FetchOutcome::Defined(app_definition))?;
//! loader.run_until_idle()?;
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod error;
pub mod host;
pub mod loader;
pub mod options;
pub mod registry;
pub mod resolver;
pub mod unit;
pub mod url;

mod sequencer;
mod top_level;

pub use error::{LoaderError, LoaderResult, UnitError};
pub use host::{
    DocumentContext, Fetch, FetchOutcome, FetchRequest, FetchTicket, LogUncaught, Origin,
    UncaughtError, UncaughtHandler,
};
pub use loader::{Loader, UnitSnapshot};
pub use options::LoaderOptions;
pub use registry::Registry;
pub use resolver::{OnDone, OnError, Require, EXPORTS, META, REQUIRE};
pub use unit::{Binding, Body, Definition, Exports, ModuleMeta, Unit, UnitId, UnitStatus};
pub use self::url::{StandardUrlResolver, UrlError, UrlResolver};
