use proc_macro2::TokenStream;
use quote::quote;
use syn::{Ident, LitStr};

use crate::validation::ROLE_ATTRS;

/// The state name as written, to be resolved with `State::from_name`.
pub fn state_literal(state: &Ident) -> LitStr {
    LitStr::new(&state.to_string(), state.span())
}

/// `&["Off", "On"]`
pub fn state_slice(states: &[Ident]) -> TokenStream {
    let names = states.iter().map(state_literal);
    quote! { &[#(#names),*] }
}

/// Whether `attr` is one of the role attributes consumed by `#[state_machine]`.
pub fn is_role_attr(attr: &syn::Attribute) -> bool {
    ROLE_ATTRS.iter().any(|role| attr.path().is_ident(role))
}
