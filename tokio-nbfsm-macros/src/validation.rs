//! Structural validation of a `#[state_machine]` impl block.

use darling::FromMeta;
use syn::{FnArg, Ident, ImplItem, ImplItemFn, ItemImpl, Path, ReturnType, Signature, Type};

use crate::attrs::{OnStateAttr, OnTransitionAttr, StateMachineArgs};

pub const ROLE_ATTRS: [&str; 3] = ["on_transition", "on_entry", "on_exit"];

/// A transition declared on the impl block.
#[derive(Debug)]
pub struct DeclaredTransition {
    pub name: String,
    pub from: Vec<Ident>,
    pub to: Ident,
}

/// What a method is bound to.
#[derive(Debug)]
pub enum RoleAttr {
    Transition { from: Vec<Ident>, to: Ident },
    Entry(Ident),
    Exit(Ident),
}

/// The callback shape a method signature was recognized as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    Transition,
    State,
}

/// A method carrying a role attribute.
///
/// `shape` is `Err` with a reason when the signature cannot be called as a
/// callback; the reason is carried into the model where it fails the build.
#[derive(Debug)]
pub struct Binding {
    pub method: Ident,
    pub role: RoleAttr,
    pub shape: Result<Shape, String>,
}

/// The complete declarative machine after parsing.
#[derive(Debug)]
pub struct MachineStructure {
    pub self_ty: Type,
    pub generics: syn::Generics,
    pub state_type: Path,
    pub transitions: Vec<DeclaredTransition>,
    pub bindings: Vec<Binding>,
}

impl MachineStructure {
    /// Parse the impl block and extract the declarations.
    pub fn parse(args: StateMachineArgs, impl_block: &ItemImpl) -> darling::Result<Self> {
        if let Some((_, trait_path, _)) = &impl_block.trait_ {
            return Err(darling::Error::custom(
                "#[state_machine] must be placed on an inherent impl block",
            )
            .with_span(trait_path));
        }

        let transitions = args
            .transitions
            .into_iter()
            .map(|transition| DeclaredTransition {
                name: transition.name,
                from: transition.from.0,
                to: transition.to.0,
            })
            .collect();

        let mut errors = darling::Error::accumulator();
        let mut bindings = Vec::new();
        for item in &impl_block.items {
            if let ImplItem::Fn(method) = item {
                if let Some(parsed) = errors.handle(Binding::parse_all(method)) {
                    bindings.extend(parsed);
                }
            }
        }
        errors.finish()?;

        Ok(Self {
            self_ty: (*impl_block.self_ty).clone(),
            generics: impl_block.generics.clone(),
            state_type: args.state.0,
            transitions,
            bindings,
        })
    }
}

impl Binding {
    /// One binding per role attribute on `method`.
    fn parse_all(method: &ImplItemFn) -> darling::Result<Vec<Self>> {
        let mut bindings = Vec::new();
        for attr in &method.attrs {
            let role = if attr.path().is_ident("on_transition") {
                let parsed = OnTransitionAttr::from_meta(&attr.meta)?;
                RoleAttr::Transition {
                    from: parsed.from.0,
                    to: parsed.to.0,
                }
            } else if attr.path().is_ident("on_entry") {
                RoleAttr::Entry(OnStateAttr::from_meta(&attr.meta)?.state.0)
            } else if attr.path().is_ident("on_exit") {
                RoleAttr::Exit(OnStateAttr::from_meta(&attr.meta)?.state.0)
            } else {
                continue;
            };

            bindings.push(Self {
                method: method.sig.ident.clone(),
                role,
                shape: callback_shape(&method.sig),
            });
        }
        Ok(bindings)
    }
}

/// Recognizes `(&self, a, b, event, ctx) -> Result<..>` and
/// `(&self, a, b, event, ctx) -> Instruction<..>`.
fn callback_shape(sig: &Signature) -> Result<Shape, String> {
    if sig.asyncness.is_some() {
        return Err("callbacks run on the engine worker and cannot be async".to_owned());
    }
    if !sig.generics.params.is_empty() {
        return Err("callbacks cannot be generic".to_owned());
    }

    match sig.inputs.first() {
        Some(FnArg::Receiver(receiver))
            if receiver.reference.is_some() && receiver.mutability.is_none() => {}
        _ => return Err("callbacks must take `&self`".to_owned()),
    }

    let params = sig.inputs.len() - 1;
    if params != 4 {
        return Err(format!(
            "expected 4 parameters (from, to, event, context), found {params}"
        ));
    }

    let return_ident = match &sig.output {
        ReturnType::Type(_, ty) => match ty.as_ref() {
            Type::Path(path) => path.path.segments.last().map(|segment| &segment.ident),
            _ => None,
        },
        ReturnType::Default => None,
    };

    match return_ident {
        Some(ident) if ident == "Result" => Ok(Shape::Transition),
        Some(ident) if ident == "Instruction" => Ok(Shape::State),
        _ => Err(
            "callbacks must return `Result<(), Rollback>` or `Instruction<State>`".to_owned(),
        ),
    }
}
