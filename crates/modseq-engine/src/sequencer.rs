//! Execution sequencing
//!
//! A [`Sequence`] walks an ordered list of dependency units, pulling each one
//! to a terminal state before moving to the next, then runs its
//! continuation: the owning unit's body, or a `require` callback.
//!
//! Sequences are driven from the loader's work stack rather than by
//! recursion. A sequence that cannot make progress parks itself on the
//! dependency it is blocked on; the dependency's next transition pushes it
//! back onto the stack. The stack is LIFO, so everything a transition wakes
//! runs before older work, the same depth-first order nested callbacks
//! would produce.
//!
//! Cycles: a dependency found in `WaitingOnDeps` when first reached is only
//! skipped if it is, directly or through the units it is itself blocked on,
//! waiting for the unit that reached it. Waiting on it would deadlock, so
//! the edge is dropped and the unit may run before that dependency has
//! executed. Any other `WaitingOnDeps` dependency, such as one promoted by
//! a `require` call, is waited on like a loading one.
//!
//! Bodies and `require` callbacks run under `catch_unwind`: a panic fails
//! the unit like a returned error and the loader keeps going.

use crate::error::{LoaderError, LoaderResult, UnitError};
use crate::loader::Loader;
use crate::resolver::{OnDone, OnError, RequireRequest};
use crate::unit::{Armed, Binding, UnitId, UnitState, UnitStatus};
use rustc_hash::{FxHashMap, FxHashSet};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

/// Identifier of a live sequence
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub(crate) struct SequenceId(u64);

#[cfg(test)]
impl SequenceId {
    pub(crate) fn new(value: u64) -> Self {
        SequenceId(value)
    }
}

/// Something parked on a unit until its next transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Waiter {
    /// A sequence blocked on the unit
    Sequence(SequenceId),
    /// A top-level unit waiting for the previous one to terminate
    TopLevel { unit: UnitId, previous: UnitId },
}

/// One item on the loader's work stack
pub(crate) enum Work {
    Advance(SequenceId),
    AwaitPrevious { unit: UnitId, previous: UnitId },
    Require(RequireRequest),
}

impl From<Waiter> for Work {
    fn from(waiter: Waiter) -> Self {
        match waiter {
            Waiter::Sequence(id) => Work::Advance(id),
            Waiter::TopLevel { unit, previous } => Work::AwaitPrevious { unit, previous },
        }
    }
}

/// What to do once every dependency is done
pub(crate) enum Continuation {
    /// Run the unit's body
    Execute(UnitId),
    /// Hand the bindings to a `require` caller
    Require {
        args: Vec<Binding>,
        on_done: Option<OnDone>,
        on_error: Option<OnError>,
    },
}

/// Progress through one ordered dependency list
pub(crate) struct Sequence {
    deps: Vec<UnitId>,
    cursor: usize,
    /// Whether the dependency at `cursor` has passed the cycle check
    entered: bool,
    then: Continuation,
}

impl Sequence {
    pub(crate) fn new(deps: Vec<UnitId>, then: Continuation) -> Self {
        Self {
            deps,
            cursor: 0,
            entered: false,
            then,
        }
    }

    fn next(&mut self) {
        self.cursor += 1;
        self.entered = false;
    }

    /// Unit whose body runs when this sequence finishes
    fn owner(&self) -> Option<UnitId> {
        match self.then {
            Continuation::Execute(id) => Some(id),
            Continuation::Require { .. } => None,
        }
    }
}

/// Live sequences
#[derive(Default)]
pub(crate) struct SequenceTable {
    next_id: u64,
    live: FxHashMap<SequenceId, Sequence>,
    /// Sequence driving each unit in `WaitingOnDeps`
    owned: FxHashMap<UnitId, SequenceId>,
}

impl SequenceTable {
    pub(crate) fn insert(&mut self, sequence: Sequence) -> SequenceId {
        let id = SequenceId(self.next_id);
        self.next_id += 1;
        if let Some(owner) = sequence.owner() {
            self.owned.insert(owner, id);
        }
        self.live.insert(id, sequence);
        id
    }

    fn get(&self, id: SequenceId) -> Option<&Sequence> {
        self.live.get(&id)
    }

    fn get_mut(&mut self, id: SequenceId) -> Option<&mut Sequence> {
        self.live.get_mut(&id)
    }

    fn remove(&mut self, id: SequenceId) -> Option<Sequence> {
        let sequence = self.live.remove(&id)?;
        if let Some(owner) = sequence.owner() {
            self.owned.remove(&owner);
        }
        Some(sequence)
    }

    /// The dependency `unit`'s own sequence is currently stopped at
    fn blocked_on(&self, unit: UnitId) -> Option<UnitId> {
        let sequence = self.live.get(self.owned.get(&unit)?)?;
        sequence.deps.get(sequence.cursor).copied()
    }

    pub(crate) fn len(&self) -> usize {
        self.live.len()
    }
}

impl Loader {
    /// Promote a `WaitingForTurn` unit and start driving its dependencies
    pub(crate) fn begin_waiting_on_deps(&mut self, id: UnitId) -> LoaderResult<()> {
        let unit = &mut self.registry[id];
        let Some(pending) = unit.take_pending() else {
            return Err(LoaderError::IllegalTransition {
                url: unit.url.clone(),
                from: unit.status(),
                to: UnitStatus::WaitingOnDeps,
            });
        };

        let sequence = self
            .sequences
            .insert(Sequence::new(pending.deps, Continuation::Execute(id)));
        self.work.push(Work::Advance(sequence));

        self.transition(
            id,
            UnitState::WaitingOnDeps(Armed {
                args: pending.args,
                body: pending.body,
            }),
        )
    }

    /// Drive a sequence as far as it can go without waiting
    pub(crate) fn advance(&mut self, id: SequenceId) -> LoaderResult<()> {
        loop {
            // Finished sequences can still have a stale wakeup queued.
            let Some(sequence) = self.sequences.get(id) else {
                return Ok(());
            };
            let Some(&dep) = sequence.deps.get(sequence.cursor) else {
                return match self.sequences.remove(id) {
                    Some(sequence) => self.finish(sequence),
                    None => Ok(()),
                };
            };
            let first_visit = !sequence.entered;
            let owner = sequence.owner();

            if first_visit {
                if self.closes_cycle(owner, dep) {
                    tracing::trace!(url = %self.registry[dep].url, "cycle detected, skipping dependency");
                    self.step(id);
                    continue;
                }
                if let Some(sequence) = self.sequences.get_mut(id) {
                    sequence.entered = true;
                }
            }

            match &self.registry[dep].state {
                UnitState::Executed => self.step(id),
                UnitState::Failed(error) => {
                    let error = error.clone();
                    return match self.sequences.remove(id) {
                        Some(sequence) => self.abort(sequence, error),
                        None => Ok(()),
                    };
                }
                UnitState::WaitingForTurn(_) => {
                    // Come back once the promoted dependency has run as far as it can.
                    self.work.push(Work::Advance(id));
                    return self.begin_waiting_on_deps(dep);
                }
                UnitState::Loading | UnitState::WaitingOnDeps(_) => {
                    self.registry[dep].wait(Waiter::Sequence(id));
                    return Ok(());
                }
                UnitState::Initialized => {
                    return Err(LoaderError::DependencyNotLoading(
                        self.registry[dep].url.clone(),
                    ));
                }
            }
        }
    }

    fn step(&mut self, id: SequenceId) {
        if let Some(sequence) = self.sequences.get_mut(id) {
            sequence.next();
        }
    }

    /// Whether waiting on `dep` would leave `owner` waiting on itself
    ///
    /// Follows the chain of `WaitingOnDeps` units each stopped at the next.
    /// Sequences without an owner feed a `require` callback that nothing
    /// waits on, so they never close a cycle.
    fn closes_cycle(&self, owner: Option<UnitId>, dep: UnitId) -> bool {
        let Some(owner) = owner else {
            return false;
        };
        let mut seen = FxHashSet::default();
        let mut current = dep;
        loop {
            if current == owner {
                return true;
            }
            if self.registry[current].status() != UnitStatus::WaitingOnDeps
                || !seen.insert(current)
            {
                return false;
            }
            match self.sequences.blocked_on(current) {
                Some(next) => current = next,
                None => return false,
            }
        }
    }

    /// Every dependency is done: run the continuation
    fn finish(&mut self, sequence: Sequence) -> LoaderResult<()> {
        match sequence.then {
            Continuation::Execute(id) => self.execute(id),
            Continuation::Require { args, on_done, .. } => {
                if let Some(on_done) = on_done {
                    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| on_done(args))) {
                        tracing::error!(
                            panic = %panic_message(&*payload),
                            "require callback panicked"
                        );
                    }
                }
                self.collect_requires();
                Ok(())
            }
        }
    }

    /// A dependency failed: fail the continuation with the same error
    fn abort(&mut self, sequence: Sequence, error: UnitError) -> LoaderResult<()> {
        match sequence.then {
            Continuation::Execute(id) => {
                tracing::warn!(
                    url = %self.registry[id].url,
                    origin = %error.origin(),
                    "dependency failed"
                );
                self.fail(id, error)
            }
            Continuation::Require { on_error, .. } => {
                match on_error {
                    Some(on_error) => {
                        if let Err(payload) =
                            panic::catch_unwind(AssertUnwindSafe(|| on_error(error)))
                        {
                            tracing::error!(
                                panic = %panic_message(&*payload),
                                "require error callback panicked"
                            );
                        }
                    }
                    None => tracing::warn!(error = %error, "require failed with no error callback"),
                }
                self.collect_requires();
                Ok(())
            }
        }
    }

    /// Run a unit's body and record the outcome
    fn execute(&mut self, id: UnitId) -> LoaderResult<()> {
        let unit = &mut self.registry[id];
        let Some(armed) = unit.take_armed() else {
            return Err(LoaderError::IllegalTransition {
                url: unit.url.clone(),
                from: unit.status(),
                to: UnitStatus::Executed,
            });
        };

        let result = match armed.body {
            Some(body) => {
                let args = armed.args;
                panic::catch_unwind(AssertUnwindSafe(move || body(args)))
            }
            None => Ok(Ok(())),
        };

        let message = match result {
            Ok(Ok(())) => None,
            Ok(Err(err)) => Some(format!("{err:#}")),
            Err(payload) => Some(format!("panicked: {}", panic_message(&*payload))),
        };

        match message {
            None => self.transition(id, UnitState::Executed)?,
            Some(message) => {
                let error = UnitError::Execution {
                    url: self.registry[id].url.clone(),
                    message,
                };
                self.fail(id, error)?;
            }
        }

        self.collect_requires();
        Ok(())
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
