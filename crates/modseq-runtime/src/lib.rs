//! Modseq Runtime
//!
//! Binds the sequencing engine to an in-process host: a source table that
//! plays the network, a fetch queue settled in caller-chosen order, TOML
//! configuration and tracing setup.

pub mod config;
pub mod error;
pub mod host;
pub mod logging;
pub mod runtime;

pub use config::RuntimeConfig;
pub use error::{ConfigError, RuntimeError};
pub use host::{FetchQueue, Source, SourceTable};
pub use logging::{init_tracing, LogFormat, LoggingConfig};
pub use runtime::Runtime;

pub use modseq_engine::{
    Binding, Definition, DocumentContext, Exports, UncaughtError, UnitError, UnitStatus,
};
