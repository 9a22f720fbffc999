//! Events and their optional lifecycle hooks.

use std::any::TypeId;

use crate::context::ExecutionContext;
use crate::error::Rollback;
use crate::state::State;

/// A stimulus proposing the next state.
///
/// [`Event::desired_state`] is evaluated when the engine dequeues the event,
/// not when it is submitted, so the answer may depend on whatever state is
/// current at that moment. It must not try to change engine state.
///
/// # Example
///
/// ```rust
/// # use tokio_nbfsm_core::{Event, ExecutionContext, State};
/// # #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
/// # enum Power { Off, On }
/// # impl State for Power {
/// #     const ALL: &'static [Self] = &[Power::Off, Power::On];
/// #     fn name(&self) -> &'static str { match self { Power::Off => "Off", Power::On => "On" } }
/// # }
/// struct Toggle;
///
/// impl Event<Power> for Toggle {
///     fn desired_state(&self, current: Power, _ctx: &ExecutionContext) -> Power {
///         match current {
///             Power::Off => Power::On,
///             Power::On => Power::Off,
///         }
///     }
/// }
/// ```
pub trait Event<S: State>: Send + 'static {
    /// The state this event wants the machine to be in, given `current`.
    fn desired_state(&self, current: S, ctx: &ExecutionContext) -> S;

    /// Lifecycle hooks of this event, if it has any.
    ///
    /// Events that care about being accepted, processed or rolled back return
    /// `Some(self)` here and implement [`LifecycleAware`].
    fn lifecycle(&self) -> Option<&dyn LifecycleAware<S>> {
        None
    }

    /// Key under which coalesced submissions of this event compete.
    ///
    /// Defaults to the concrete type of the event.
    fn coalescing_key(&self) -> TypeId {
        TypeId::of::<Self>()
    }
}

/// Optional hooks fired by the engine while it processes an event.
///
/// All hooks run on the engine's worker, one event at a time.
pub trait LifecycleAware<S: State> {
    /// Gate run before the event is evaluated. Returning `false` drops it.
    fn on_accept(&self, _ctx: &ExecutionContext) -> bool {
        true
    }

    /// A matching transition out of `exiting` was found and is about to run.
    fn on_processing(&self, _exiting: S, _ctx: &ExecutionContext) {}

    /// The transition committed and `entered` is now current.
    fn on_processed(&self, _entered: S, _ctx: &ExecutionContext) {}

    /// The transition action rolled back; `current` is unchanged.
    fn on_failure(&self, _current: S, _ctx: &ExecutionContext, _error: &Rollback) {}
}

impl<S: State> Event<S> for Box<dyn Event<S>> {
    fn desired_state(&self, current: S, ctx: &ExecutionContext) -> S {
        (**self).desired_state(current, ctx)
    }

    fn lifecycle(&self) -> Option<&dyn LifecycleAware<S>> {
        (**self).lifecycle()
    }

    fn coalescing_key(&self) -> TypeId {
        (**self).coalescing_key()
    }
}

/// An event that always asks for one fixed state.
///
/// The engine uses it for transitions chained from entry and exit actions;
/// callers can submit it directly when they already know the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionRequest<S> {
    target: S,
}

impl<S: State> TransitionRequest<S> {
    /// Requests a transition to `target`.
    pub fn new(target: S) -> Self {
        Self { target }
    }

    /// The requested state.
    pub fn target(&self) -> S {
        self.target
    }
}

impl<S: State> Event<S> for TransitionRequest<S> {
    fn desired_state(&self, _current: S, _ctx: &ExecutionContext) -> S {
        self.target
    }
}
