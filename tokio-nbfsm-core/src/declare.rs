//! Declarative model construction.
//!
//! A type implementing [`Declared`] describes its transitions by state *name*
//! and binds its methods to roles (transition action, entry action, exit
//! action). [`Model::declarative`] resolves every name against the state type,
//! checks every binding and only then builds the model. Any problem aborts the
//! whole construction.
//!
//! `#[state_machine]` from the macros crate generates [`Declared`] for an impl
//! block; implementing it by hand is equally valid.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use crate::context::ExecutionContext;
use crate::error::{ModelError, Rollback};
use crate::event::Event;
use crate::instruction::Instruction;
use crate::model::Model;
use crate::state::State;
use crate::transition::{Transition, TransitionAction};

/// Shape of entry and exit callbacks: `(previous, next, event, context)`.
pub type StateCallback<S> =
    dyn Fn(S, S, &dyn Event<S>, &ExecutionContext) -> Instruction<S> + Send + Sync;

/// An object that carries its own model declarations.
pub trait Declared: Send + Sync + 'static {
    type State: State;

    /// Declarations of this object, with callbacks bound to `self`.
    fn declarations(self: Arc<Self>) -> Declarations<Self::State>;
}

/// A transition declared by state names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionDecl {
    pub name: &'static str,
    pub from: Vec<&'static str>,
    pub to: &'static str,
}

/// What a bound method is for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Role {
    /// Action of the declared transition with exactly these sources and target.
    Transition {
        from: Vec<&'static str>,
        to: &'static str,
    },
    /// Entry action of the named state.
    Entry(&'static str),
    /// Exit action of the named state.
    Exit(&'static str),
}

/// The callable side of a bound method.
pub enum Callback<S: State> {
    /// `(from, to, event, context) -> Result<(), Rollback>`.
    Transition(Arc<dyn TransitionAction<S>>),
    /// `(previous, next, event, context) -> Instruction<S>`.
    State(Arc<StateCallback<S>>),
    /// The method could not be bound; the reason is reported at build time.
    Malformed(&'static str),
}

impl<S: State> Callback<S> {
    /// Binds a transition-shaped callable. The transition name is not passed.
    pub fn transition<F>(action: F) -> Self
    where
        F: Fn(S, S, &dyn Event<S>, &ExecutionContext) -> Result<(), Rollback>
            + Send
            + Sync
            + 'static,
    {
        Self::Transition(Arc::new(Unnamed(action)))
    }

    /// Binds an entry/exit-shaped callable.
    pub fn state<F>(action: F) -> Self
    where
        F: Fn(S, S, &dyn Event<S>, &ExecutionContext) -> Instruction<S> + Send + Sync + 'static,
    {
        Self::State(Arc::new(action))
    }

    fn shape(&self) -> &'static str {
        match self {
            Self::Transition(_) => "a transition action",
            Self::State(_) => "a state action",
            Self::Malformed(_) => "malformed",
        }
    }
}

impl<S: State> fmt::Debug for Callback<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Malformed(reason) => f.debug_tuple("Malformed").field(reason).finish(),
            other => f.write_str(other.shape()),
        }
    }
}

struct Unnamed<F>(F);

impl<S, F> TransitionAction<S> for Unnamed<F>
where
    S: State,
    F: Fn(S, S, &dyn Event<S>, &ExecutionContext) -> Result<(), Rollback> + Send + Sync,
{
    fn on_transition(
        &self,
        _name: &str,
        from: S,
        to: S,
        event: &dyn Event<S>,
        ctx: &ExecutionContext,
    ) -> Result<(), Rollback> {
        (self.0)(from, to, event, ctx)
    }
}

/// A method bound to a role.
#[derive(Debug)]
pub struct MethodDecl<S: State> {
    pub method: &'static str,
    pub role: Role,
    pub callback: Callback<S>,
}

/// Everything a [`Declared`] object says about its model.
#[derive(Debug)]
pub struct Declarations<S: State> {
    pub transitions: Vec<TransitionDecl>,
    pub methods: Vec<MethodDecl<S>>,
}

impl<S: State> Declarations<S> {
    pub fn new() -> Self {
        Self {
            transitions: Vec::new(),
            methods: Vec::new(),
        }
    }

    /// Declares a transition by state names.
    pub fn transition(
        &mut self,
        name: &'static str,
        from: &[&'static str],
        to: &'static str,
    ) -> &mut Self {
        self.transitions.push(TransitionDecl {
            name,
            from: from.to_vec(),
            to,
        });
        self
    }

    /// Binds `method` to `role`.
    pub fn bind(&mut self, method: &'static str, role: Role, callback: Callback<S>) -> &mut Self {
        self.methods.push(MethodDecl {
            method,
            role,
            callback,
        });
        self
    }
}

impl<S: State> Default for Declarations<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: State> Model<S> {
    /// Builds a model from the declarations carried by `object`.
    ///
    /// Fails with a [`ModelError`] when a state name does not resolve, a
    /// method's callback shape does not fit its role, a transition-role method
    /// matches no declared transition or two methods claim one transition.
    pub fn declarative<T>(object: Arc<T>) -> Result<Self, ModelError>
    where
        T: Declared<State = S>,
    {
        let declarations = object.declarations();

        let mut transitions = Vec::with_capacity(declarations.transitions.len());
        for decl in &declarations.transitions {
            let referenced_by = format!("transition `{}`", decl.name);
            transitions.push(Resolved {
                name: decl.name,
                from: resolve_all::<S>(&decl.from, &referenced_by)?,
                to: resolve::<S>(decl.to, &referenced_by)?,
                bound: None,
            });
        }

        let mut entry = Vec::new();
        let mut exit = Vec::new();
        for decl in declarations.methods {
            let referenced_by = format!("method `{}`", decl.method);
            match (decl.role, decl.callback) {
                (_, Callback::Malformed(reason)) => {
                    return Err(invalid_signature(decl.method, reason));
                }
                (Role::Transition { from, to }, Callback::Transition(action)) => {
                    let from_states = resolve_all::<S>(&from, &referenced_by)?;
                    let to_state = resolve::<S>(to, &referenced_by)?;
                    let slot = transitions
                        .iter_mut()
                        .find(|resolved| resolved.from == from_states && resolved.to == to_state)
                        .ok_or_else(|| ModelError::UnboundTransitionAction {
                            method: decl.method.to_owned(),
                            from: from.iter().map(|s| (*s).to_owned()).collect(),
                            to: to.to_owned(),
                        })?;
                    if let Some((first, _)) = &slot.bound {
                        return Err(ModelError::DuplicateTransitionAction {
                            transition: slot.name.to_owned(),
                            first: (*first).to_owned(),
                            second: decl.method.to_owned(),
                        });
                    }
                    slot.bound = Some((decl.method, action));
                }
                (Role::Entry(state), Callback::State(action)) => {
                    entry.push((resolve::<S>(state, &referenced_by)?, action));
                }
                (Role::Exit(state), Callback::State(action)) => {
                    exit.push((resolve::<S>(state, &referenced_by)?, action));
                }
                (Role::Transition { .. }, callback) => {
                    return Err(ModelError::InvalidSignature {
                        method: decl.method.to_owned(),
                        reason: format!(
                            "transition actions take (from, to, event, context) and return \
                             Result<(), Rollback>, found {}",
                            callback.shape()
                        ),
                    });
                }
                (Role::Entry(_) | Role::Exit(_), callback) => {
                    return Err(ModelError::InvalidSignature {
                        method: decl.method.to_owned(),
                        reason: format!(
                            "entry and exit actions take (previous, next, event, context) and \
                             return Instruction, found {}",
                            callback.shape()
                        ),
                    });
                }
            }
        }

        let mut builder = Model::builder();
        for resolved in transitions {
            let mut transition = Transition::new(resolved.name, resolved.from, resolved.to);
            if let Some((_, action)) = resolved.bound {
                transition = transition.with_action(action);
            }
            builder = builder.transition(transition);
        }
        for (state, action) in entry {
            builder = builder.on_entry(state, move |previous, next, event, ctx| {
                (*action)(previous, next, event, ctx)
            });
        }
        for (state, action) in exit {
            builder = builder.on_exit(state, move |exiting, next, event, ctx| {
                (*action)(exiting, next, event, ctx)
            });
        }
        builder.build()
    }
}

/// A declared transition with its names resolved.
struct Resolved<S: State> {
    name: &'static str,
    from: BTreeSet<S>,
    to: S,
    bound: Option<(&'static str, Arc<dyn TransitionAction<S>>)>,
}

fn resolve<S: State>(name: &str, referenced_by: &str) -> Result<S, ModelError> {
    S::from_name(name).ok_or_else(|| ModelError::UnknownState {
        name: name.to_owned(),
        referenced_by: referenced_by.to_owned(),
    })
}

fn resolve_all<S: State>(names: &[&str], referenced_by: &str) -> Result<BTreeSet<S>, ModelError> {
    names.iter().map(|name| resolve(name, referenced_by)).collect()
}

fn invalid_signature(method: &str, reason: &str) -> ModelError {
    ModelError::InvalidSignature {
        method: method.to_owned(),
        reason: reason.to_owned(),
    }
}
