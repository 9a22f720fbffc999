//! The immutable transition table consulted by the engine.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::context::ExecutionContext;
use crate::error::{ActionKind, ModelError};
use crate::event::Event;
use crate::instruction::Instruction;
use crate::state::State;
use crate::transition::{StateEntryAction, StateExitAction, Transition};

/// Transitions plus per-state entry and exit actions.
///
/// Built once through [`Model::builder`] or [`Model::declarative`] and then
/// shared read-only, usually behind an `Arc`, by any number of engines.
pub struct Model<S: State> {
    transitions: Vec<Transition<S>>,
    by_target: HashMap<S, Vec<usize>>,
    entry: HashMap<S, Arc<dyn StateEntryAction<S>>>,
    exit: HashMap<S, Arc<dyn StateExitAction<S>>>,
}

impl<S: State> Model<S> {
    pub fn builder() -> ModelBuilder<S> {
        ModelBuilder::new()
    }

    /// The transition that moves `from` to `to`, if one is modeled.
    pub fn find(&self, from: S, to: S) -> Option<&Transition<S>> {
        self.by_target
            .get(&to)?
            .iter()
            .map(|&index| &self.transitions[index])
            .find(|transition| transition.leads_from(from))
    }

    pub fn entry_action(&self, state: S) -> Option<&dyn StateEntryAction<S>> {
        self.entry.get(&state).map(|action| action.as_ref())
    }

    pub fn exit_action(&self, state: S) -> Option<&dyn StateExitAction<S>> {
        self.exit.get(&state).map(|action| action.as_ref())
    }

    /// All transitions in declaration order.
    pub fn transitions(&self) -> impl Iterator<Item = &Transition<S>> {
        self.transitions.iter()
    }

    /// States reachable from `state` in one transition, in declaration order.
    pub fn targets_from(&self, state: S) -> Vec<S> {
        let mut targets = Vec::new();
        for transition in self.transitions.iter().filter(|t| t.leads_from(state)) {
            if !targets.contains(&transition.to_state()) {
                targets.push(transition.to_state());
            }
        }
        targets
    }
}

impl<S: State> fmt::Debug for Model<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut entry: Vec<_> = self.entry.keys().collect();
        entry.sort();
        let mut exit: Vec<_> = self.exit.keys().collect();
        exit.sort();
        f.debug_struct("Model")
            .field("transitions", &self.transitions)
            .field("entry_actions", &entry)
            .field("exit_actions", &exit)
            .finish()
    }
}

/// Imperative construction of a [`Model`].
///
/// # Example
///
/// ```rust
/// # use tokio_nbfsm_core::{Instruction, Model, State, Transition};
/// # #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
/// # enum Power { Off, On }
/// # impl State for Power {
/// #     const ALL: &'static [Self] = &[Power::Off, Power::On];
/// #     fn name(&self) -> &'static str { match self { Power::Off => "Off", Power::On => "On" } }
/// # }
/// let model = Model::builder()
///     .transition(Transition::new("on", [Power::Off], Power::On))
///     .transition(Transition::new("off", [Power::On], Power::Off))
///     .on_entry(Power::On, |_prev, _next, _event, _ctx| Instruction::Nothing)
///     .build()
///     .unwrap();
///
/// assert!(model.find(Power::Off, Power::On).is_some());
/// assert!(model.find(Power::Off, Power::Off).is_none());
/// ```
pub struct ModelBuilder<S: State> {
    transitions: Vec<Transition<S>>,
    entry: Vec<(S, Arc<dyn StateEntryAction<S>>)>,
    exit: Vec<(S, Arc<dyn StateExitAction<S>>)>,
}

impl<S: State> ModelBuilder<S> {
    pub fn new() -> Self {
        Self {
            transitions: Vec::new(),
            entry: Vec::new(),
            exit: Vec::new(),
        }
    }

    /// Adds a transition. Names need not be unique.
    pub fn transition(mut self, transition: Transition<S>) -> Self {
        self.transitions.push(transition);
        self
    }

    /// Registers the entry action of `state` as a closure.
    pub fn on_entry<F>(self, state: S, action: F) -> Self
    where
        F: Fn(S, S, &dyn Event<S>, &ExecutionContext) -> Instruction<S> + Send + Sync + 'static,
    {
        self.entry_action(state, Arc::new(action))
    }

    /// Registers the exit action of `state` as a closure.
    pub fn on_exit<F>(self, state: S, action: F) -> Self
    where
        F: Fn(S, S, &dyn Event<S>, &ExecutionContext) -> Instruction<S> + Send + Sync + 'static,
    {
        self.exit_action(state, Arc::new(action))
    }

    pub fn entry_action(mut self, state: S, action: Arc<dyn StateEntryAction<S>>) -> Self {
        self.entry.push((state, action));
        self
    }

    pub fn exit_action(mut self, state: S, action: Arc<dyn StateExitAction<S>>) -> Self {
        self.exit.push((state, action));
        self
    }

    /// Validates and freezes the model.
    pub fn build(self) -> Result<Model<S>, ModelError> {
        for transition in &self.transitions {
            if transition.from_states().is_empty() {
                return Err(ModelError::EmptySourceStates {
                    transition: transition.name().to_owned(),
                });
            }
        }

        let mut by_target: HashMap<S, Vec<usize>> = HashMap::new();
        for (index, transition) in self.transitions.iter().enumerate() {
            let siblings = by_target.entry(transition.to_state()).or_default();
            for &other in siblings.iter() {
                let earlier = &self.transitions[other];
                if let Some(&from) = earlier.from_states().intersection(transition.from_states()).next() {
                    return Err(ModelError::AmbiguousTransition {
                        first: earlier.name().to_owned(),
                        second: transition.name().to_owned(),
                        from: from.name().to_owned(),
                        to: transition.to_state().name().to_owned(),
                    });
                }
            }
            siblings.push(index);
        }

        let entry = unique_actions(self.entry, ActionKind::Entry)?;
        let exit = unique_actions(self.exit, ActionKind::Exit)?;

        Ok(Model {
            transitions: self.transitions,
            by_target,
            entry,
            exit,
        })
    }
}

impl<S: State> Default for ModelBuilder<S> {
    fn default() -> Self {
        Self::new()
    }
}

fn unique_actions<S: State, A: ?Sized>(
    actions: Vec<(S, Arc<A>)>,
    kind: ActionKind,
) -> Result<HashMap<S, Arc<A>>, ModelError> {
    let mut unique = HashMap::with_capacity(actions.len());
    for (state, action) in actions {
        if unique.insert(state, action).is_some() {
            return Err(ModelError::DuplicateStateAction {
                kind,
                state: state.name().to_owned(),
            });
        }
    }
    Ok(unique)
}
