//! Error types for model construction and transition rollback.

use std::borrow::Cow;

/// Raised by a transition action to abort the transition in progress.
///
/// The engine keeps the current state, leaves the transition count alone and
/// reports the rollback to the event through
/// [`LifecycleAware::on_failure`](crate::LifecycleAware::on_failure).
/// Side effects of an exit action that already ran are not undone.
#[derive(Debug, thiserror::Error)]
#[error("transition rolled back: {reason}")]
pub struct Rollback {
    reason: Cow<'static, str>,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
}

impl Rollback {
    /// Creates a rollback with a human readable reason.
    pub fn new(reason: impl Into<Cow<'static, str>>) -> Self {
        Self {
            reason: reason.into(),
            source: None,
        }
    }

    /// Creates a rollback caused by another error.
    pub fn with_source(
        reason: impl Into<Cow<'static, str>>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync + 'static>>,
    ) -> Self {
        Self {
            reason: reason.into(),
            source: Some(source.into()),
        }
    }

    /// The reason given when the rollback was raised.
    pub fn reason(&self) -> &str {
        &self.reason
    }
}

/// Which kind of state action a [`ModelError`] refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    /// Runs when a state is entered.
    Entry,
    /// Runs when a state is left.
    Exit,
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Entry => f.write_str("entry"),
            Self::Exit => f.write_str("exit"),
        }
    }
}

/// Rejection of a malformed model.
///
/// Both construction paths return this before any model exists, so an engine
/// is never handed a model it would have to second-guess at dispatch time.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ModelError {
    /// A declared name does not resolve to a value of the state type.
    #[error("unknown state `{name}` referenced by {referenced_by}")]
    UnknownState {
        name: String,
        referenced_by: String,
    },

    /// A transition was declared without any source state.
    #[error("transition `{transition}` has no source states")]
    EmptySourceStates { transition: String },

    /// Two transitions could both fire for the same (from, to) pair.
    #[error("transitions `{first}` and `{second}` both lead from {from} to {to}")]
    AmbiguousTransition {
        first: String,
        second: String,
        from: String,
        to: String,
    },

    /// More than one entry or exit action was registered for a state.
    #[error("state {state} already has an {kind} action")]
    DuplicateStateAction { kind: ActionKind, state: String },

    /// A role-bound method does not have the callback shape its role needs.
    #[error("method `{method}` has an invalid signature: {reason}")]
    InvalidSignature { method: String, reason: String },

    /// A transition-role method matches no declared transition.
    #[error("method `{method}` is bound to a transition from {from:?} to {to} that is not declared")]
    UnboundTransitionAction {
        method: String,
        from: Vec<String>,
        to: String,
    },

    /// Two methods claim the same declared transition.
    #[error("methods `{first}` and `{second}` are both bound to transition `{transition}`")]
    DuplicateTransitionAction {
        transition: String,
        first: String,
        second: String,
    },
}
