//! Proc macros for declaring `tokio-nbfsm` states and models.
//!
//! Generated code refers to `::tokio_nbfsm`, so use these through the
//! `tokio-nbfsm` crate rather than depending on this one directly.

use darling::FromMeta;
use darling::ast::NestedMeta;
use proc_macro::TokenStream;
use syn::{DeriveInput, ItemImpl, parse_macro_input};

mod attrs;
mod codegen;
mod helpers;
mod validation;

/// Implements `State` for a fieldless enum.
///
/// `ALL` lists the variants in declaration order and `name` returns the
/// variant identifier.
#[proc_macro_derive(State)]
pub fn derive_state(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    codegen::generate_state(&input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

/// Declares a model on an inherent impl block.
///
/// ```rust,ignore
/// #[state_machine(
///     state = Power,
///     transition(name = "switch_on", from(Off), to = On),
///     transition(name = "switch_off", from(On), to = Off),
/// )]
/// impl Switch {
///     #[on_transition(from(Off), to = On)]
///     fn powering_up(&self, from: Power, to: Power, event: &dyn Event<Power>, ctx: &ExecutionContext) -> Result<(), Rollback> {
///         Ok(())
///     }
///
///     #[on_entry(state = On)]
///     fn lamp_on(&self, previous: Power, entered: Power, event: &dyn Event<Power>, ctx: &ExecutionContext) -> Instruction<Power> {
///         Instruction::Nothing
///     }
/// }
/// ```
///
/// State names are checked when the model is built with
/// `Model::declarative`, which also reports methods whose signature does not
/// fit their role.
#[proc_macro_attribute]
pub fn state_machine(args: TokenStream, input: TokenStream) -> TokenStream {
    let input_impl = parse_macro_input!(input as ItemImpl);

    let args = match NestedMeta::parse_meta_list(args.into()) {
        Ok(args) => args,
        Err(e) => return darling::Error::from(e).write_errors().into(),
    };
    let args = match attrs::StateMachineArgs::from_list(&args) {
        Ok(args) => args,
        Err(e) => return e.write_errors().into(),
    };

    match validation::MachineStructure::parse(args, &input_impl) {
        Ok(machine) => codegen::generate(&machine, &input_impl).into(),
        Err(e) => e.write_errors().into(),
    }
}
