//! Unit lifecycle states
//!
//! ```text
//! Initialized -> Loading -> WaitingForTurn -> WaitingOnDeps -> Executed
//!      |            |                              |
//!      |            +--------> Failed <------------+
//!      +-----------------------^
//! ```
//!
//! Top-level units skip `Loading`: their source is already in the document.

use super::{Binding, Body, UnitId};
use crate::error::UnitError;
use serde::Serialize;
use std::fmt;

/// The six lifecycle states, without payload
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum UnitStatus {
    /// Created, nothing requested yet
    Initialized,
    /// Source requested from the loader collaborator
    Loading,
    /// Dependencies resolved and requested, waiting to be pulled by a dependent
    WaitingForTurn,
    /// Driving its dependencies, body not yet run
    WaitingOnDeps,
    /// Body ran successfully
    Executed,
    /// Load, execution or a dependency failed
    Failed,
}

impl UnitStatus {
    /// Executed or Failed
    pub fn is_terminal(self) -> bool {
        matches!(self, UnitStatus::Executed | UnitStatus::Failed)
    }

    /// Whether the lifecycle allows moving from `self` to `next`
    pub fn can_transition_to(self, next: UnitStatus) -> bool {
        use UnitStatus::*;
        matches!(
            (self, next),
            (Initialized, Loading)
                | (Initialized, WaitingForTurn)
                | (Initialized, Failed)
                | (Loading, WaitingForTurn)
                | (Loading, Failed)
                | (WaitingForTurn, WaitingOnDeps)
                | (WaitingOnDeps, Executed)
                | (WaitingOnDeps, Failed)
        )
    }
}

impl fmt::Display for UnitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Resolved dependency data held while a unit waits for its turn
#[derive(Default)]
pub(crate) struct Pending {
    pub(crate) args: Vec<Binding>,
    pub(crate) deps: Vec<UnitId>,
    pub(crate) body: Option<Body>,
}

/// Arguments and body held while a unit drives its dependencies
#[derive(Default)]
pub(crate) struct Armed {
    pub(crate) args: Vec<Binding>,
    pub(crate) body: Option<Body>,
}

/// Lifecycle state with the payload legal for it
pub(crate) enum UnitState {
    Initialized,
    Loading,
    WaitingForTurn(Pending),
    WaitingOnDeps(Armed),
    Executed,
    Failed(UnitError),
}

impl UnitState {
    pub(crate) fn status(&self) -> UnitStatus {
        match self {
            UnitState::Initialized => UnitStatus::Initialized,
            UnitState::Loading => UnitStatus::Loading,
            UnitState::WaitingForTurn(_) => UnitStatus::WaitingForTurn,
            UnitState::WaitingOnDeps(_) => UnitStatus::WaitingOnDeps,
            UnitState::Executed => UnitStatus::Executed,
            UnitState::Failed(_) => UnitStatus::Failed,
        }
    }
}
