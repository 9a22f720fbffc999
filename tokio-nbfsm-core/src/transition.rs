//! Modeled transitions and the three callback kinds the engine invokes.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use crate::context::ExecutionContext;
use crate::error::Rollback;
use crate::event::Event;
use crate::instruction::Instruction;
use crate::state::State;

/// Action run between a state's exit and the next state's entry.
///
/// Returning `Err` rolls the transition back: the state does not change and
/// no entry action runs. The exit action of the current state has already
/// run by then and is not undone.
pub trait TransitionAction<S: State>: Send + Sync {
    fn on_transition(
        &self,
        name: &str,
        from: S,
        to: S,
        event: &dyn Event<S>,
        ctx: &ExecutionContext,
    ) -> Result<(), Rollback>;
}

impl<S, F> TransitionAction<S> for F
where
    S: State,
    F: Fn(&str, S, S, &dyn Event<S>, &ExecutionContext) -> Result<(), Rollback> + Send + Sync,
{
    fn on_transition(
        &self,
        name: &str,
        from: S,
        to: S,
        event: &dyn Event<S>,
        ctx: &ExecutionContext,
    ) -> Result<(), Rollback> {
        self(name, from, to, event, ctx)
    }
}

/// Action run right after a state becomes current.
pub trait StateEntryAction<S: State>: Send + Sync {
    fn on_entry(
        &self,
        previous: S,
        entered: S,
        event: &dyn Event<S>,
        ctx: &ExecutionContext,
    ) -> Instruction<S>;
}

impl<S, F> StateEntryAction<S> for F
where
    S: State,
    F: Fn(S, S, &dyn Event<S>, &ExecutionContext) -> Instruction<S> + Send + Sync,
{
    fn on_entry(
        &self,
        previous: S,
        entered: S,
        event: &dyn Event<S>,
        ctx: &ExecutionContext,
    ) -> Instruction<S> {
        self(previous, entered, event, ctx)
    }
}

/// Action run right before a state is left.
pub trait StateExitAction<S: State>: Send + Sync {
    fn on_exit(
        &self,
        exiting: S,
        next: S,
        event: &dyn Event<S>,
        ctx: &ExecutionContext,
    ) -> Instruction<S>;
}

impl<S, F> StateExitAction<S> for F
where
    S: State,
    F: Fn(S, S, &dyn Event<S>, &ExecutionContext) -> Instruction<S> + Send + Sync,
{
    fn on_exit(
        &self,
        exiting: S,
        next: S,
        event: &dyn Event<S>,
        ctx: &ExecutionContext,
    ) -> Instruction<S> {
        self(exiting, next, event, ctx)
    }
}

struct NoAction;

impl<S: State> TransitionAction<S> for NoAction {
    fn on_transition(
        &self,
        _name: &str,
        _from: S,
        _to: S,
        _event: &dyn Event<S>,
        _ctx: &ExecutionContext,
    ) -> Result<(), Rollback> {
        Ok(())
    }
}

/// A named edge from a set of source states to one target state.
///
/// # Example
///
/// ```rust
/// # use tokio_nbfsm_core::{State, Transition};
/// # #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
/// # enum Power { Off, On, Broken }
/// # impl State for Power {
/// #     const ALL: &'static [Self] = &[Power::Off, Power::On, Power::Broken];
/// #     fn name(&self) -> &'static str { "" }
/// # }
/// let smash = Transition::new("smash", [Power::Off, Power::On], Power::Broken)
///     .on_transition(|_name, _from, _to, _event, _ctx| Ok(()));
/// assert!(smash.leads_from(Power::On));
/// ```
#[derive(Clone)]
pub struct Transition<S: State> {
    name: Arc<str>,
    from: BTreeSet<S>,
    to: S,
    action: Arc<dyn TransitionAction<S>>,
}

impl<S: State> Transition<S> {
    /// A transition with a no-op action.
    pub fn new(name: impl Into<Arc<str>>, from: impl IntoIterator<Item = S>, to: S) -> Self {
        Self {
            name: name.into(),
            from: from.into_iter().collect(),
            to,
            action: Arc::new(NoAction),
        }
    }

    /// Replaces the action with a closure.
    #[must_use]
    pub fn on_transition<F>(self, action: F) -> Self
    where
        F: Fn(&str, S, S, &dyn Event<S>, &ExecutionContext) -> Result<(), Rollback>
            + Send
            + Sync
            + 'static,
    {
        self.with_action(Arc::new(action))
    }

    /// Replaces the action with a shared action object.
    #[must_use]
    pub fn with_action(mut self, action: Arc<dyn TransitionAction<S>>) -> Self {
        self.action = action;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn from_states(&self) -> &BTreeSet<S> {
        &self.from
    }

    pub fn to_state(&self) -> S {
        self.to
    }

    /// Whether `state` is one of the source states.
    pub fn leads_from(&self, state: S) -> bool {
        self.from.contains(&state)
    }

    /// Whether the transition loops back onto one of its sources.
    pub fn is_self_loop(&self) -> bool {
        self.from.contains(&self.to)
    }

    pub(crate) fn action(&self) -> &dyn TransitionAction<S> {
        self.action.as_ref()
    }
}

impl<S: State> fmt::Debug for Transition<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transition")
            .field("name", &self.name)
            .field("from", &self.from)
            .field("to", &self.to)
            .finish_non_exhaustive()
    }
}
