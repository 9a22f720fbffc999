//! Attribute parsing for the state machine macros.

use darling::FromMeta;
use darling::ast::NestedMeta;
use syn::{Expr, Ident, Lit, Meta, Path};

/// Arguments for `#[state_machine(state = Power, transition(...), ...)]`.
#[derive(Debug, FromMeta)]
pub struct StateMachineArgs {
    /// The state type the model is built over.
    pub state: StateType,

    /// Declared transitions, in order.
    #[darling(multiple, rename = "transition")]
    pub transitions: Vec<TransitionArgs>,
}

/// `transition(name = "switch_on", from(Off), to = On)`.
#[derive(Debug, FromMeta)]
pub struct TransitionArgs {
    pub name: String,
    pub from: StateList,
    pub to: StateName,
}

/// `#[on_transition(from(Off), to = On)]`.
#[derive(Debug, FromMeta)]
pub struct OnTransitionAttr {
    pub from: StateList,
    pub to: StateName,
}

/// `#[on_entry(state = On)]` and `#[on_exit(state = On)]`.
#[derive(Debug, FromMeta)]
pub struct OnStateAttr {
    pub state: StateName,
}

/// Path of the state type, bare or quoted.
#[derive(Debug, Clone)]
pub struct StateType(pub Path);

impl FromMeta for StateType {
    fn from_expr(expr: &Expr) -> darling::Result<Self> {
        match expr {
            Expr::Path(path) => Ok(Self(path.path.clone())),
            Expr::Lit(lit) => Self::from_value(&lit.lit),
            _ => Err(darling::Error::custom("expected a state type path").with_span(expr)),
        }
    }

    fn from_value(value: &Lit) -> darling::Result<Self> {
        match value {
            Lit::Str(lit) => lit
                .parse::<Path>()
                .map(Self)
                .map_err(|_| darling::Error::custom("expected a state type path").with_span(lit)),
            _ => Err(darling::Error::unexpected_lit_type(value)),
        }
    }
}

/// A state referenced by name, bare (`On`) or quoted (`"On"`).
///
/// Names are resolved against the state type when the model is built, not
/// here, so a typo surfaces as a model error rather than a compile error.
#[derive(Debug, Clone)]
pub struct StateName(pub Ident);

impl FromMeta for StateName {
    fn from_expr(expr: &Expr) -> darling::Result<Self> {
        match expr {
            Expr::Path(path) => bare_ident(&path.path).map(Self),
            Expr::Lit(lit) => Self::from_value(&lit.lit),
            _ => Err(darling::Error::custom("expected a state name").with_span(expr)),
        }
    }

    fn from_value(value: &Lit) -> darling::Result<Self> {
        match value {
            Lit::Str(lit) => lit
                .parse::<Ident>()
                .map(Self)
                .map_err(|_| darling::Error::custom("expected a state name").with_span(lit)),
            _ => Err(darling::Error::unexpected_lit_type(value)),
        }
    }
}

/// `from(Off, On)`.
#[derive(Debug, Clone, Default)]
pub struct StateList(pub Vec<Ident>);

impl FromMeta for StateList {
    fn from_list(items: &[NestedMeta]) -> darling::Result<Self> {
        let mut errors = darling::Error::accumulator();
        let mut states = Vec::with_capacity(items.len());
        for item in items {
            let state = match item {
                NestedMeta::Meta(Meta::Path(path)) => bare_ident(path),
                NestedMeta::Lit(lit) => StateName::from_value(lit).map(|name| name.0),
                NestedMeta::Meta(meta) => {
                    Err(darling::Error::custom("expected a state name").with_span(meta))
                }
            };
            if let Some(state) = errors.handle(state) {
                states.push(state);
            }
        }
        errors.finish_with(Self(states))
    }
}

fn bare_ident(path: &Path) -> darling::Result<Ident> {
    path.get_ident()
        .cloned()
        .ok_or_else(|| darling::Error::custom("expected a bare state name").with_span(path))
}
