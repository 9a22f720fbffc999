//! Code generation for `#[state_machine]` and `#[derive(State)]`.

use proc_macro2::TokenStream;
use quote::quote;
use syn::{Data, DeriveInput, Error, Fields, ImplItem, ItemImpl, LitStr};

use crate::helpers::{is_role_attr, state_literal, state_slice};
use crate::validation::{Binding, MachineStructure, RoleAttr, Shape};

/// The impl block as written, minus role attributes, followed by its
/// `Declared` implementation.
pub fn generate(machine: &MachineStructure, original_impl: &ItemImpl) -> TokenStream {
    let mut cleaned = original_impl.clone();
    for item in &mut cleaned.items {
        if let ImplItem::Fn(method) = item {
            method.attrs.retain(|attr| !is_role_attr(attr));
        }
    }

    let declared = generate_declared(machine);

    quote! {
        #cleaned
        #declared
    }
}

fn generate_declared(machine: &MachineStructure) -> TokenStream {
    let self_ty = &machine.self_ty;
    let state_ty = &machine.state_type;
    let (impl_generics, _, where_clause) = machine.generics.split_for_impl();

    let transitions = machine.transitions.iter().map(|transition| {
        let name = &transition.name;
        let from = state_slice(&transition.from);
        let to = state_literal(&transition.to);
        quote! {
            declarations.transition(#name, #from, #to);
        }
    });

    let bindings = machine
        .bindings
        .iter()
        .map(|binding| generate_binding(binding, state_ty));

    quote! {
        impl #impl_generics ::tokio_nbfsm::Declared for #self_ty #where_clause {
            type State = #state_ty;

            fn declarations(
                self: ::std::sync::Arc<Self>,
            ) -> ::tokio_nbfsm::Declarations<#state_ty> {
                let mut declarations = ::tokio_nbfsm::Declarations::new();
                #(#transitions)*
                #(#bindings)*
                declarations
            }
        }
    }
}

fn generate_binding(binding: &Binding, state_ty: &syn::Path) -> TokenStream {
    let method = &binding.method;
    let method_name = LitStr::new(&method.to_string(), method.span());

    let role = match &binding.role {
        RoleAttr::Transition { from, to } => {
            let from = from.iter().map(state_literal);
            let to = state_literal(to);
            quote! {
                ::tokio_nbfsm::Role::Transition {
                    from: ::std::vec![#(#from),*],
                    to: #to,
                }
            }
        }
        RoleAttr::Entry(state) => {
            let state = state_literal(state);
            quote! { ::tokio_nbfsm::Role::Entry(#state) }
        }
        RoleAttr::Exit(state) => {
            let state = state_literal(state);
            quote! { ::tokio_nbfsm::Role::Exit(#state) }
        }
    };

    let callback = match &binding.shape {
        Ok(Shape::Transition) => quote! {{
            let this = ::std::sync::Arc::clone(&self);
            ::tokio_nbfsm::Callback::<#state_ty>::transition(
                move |from, to, event, ctx| this.#method(from, to, event, ctx),
            )
        }},
        Ok(Shape::State) => quote! {{
            let this = ::std::sync::Arc::clone(&self);
            ::tokio_nbfsm::Callback::<#state_ty>::state(
                move |from, to, event, ctx| this.#method(from, to, event, ctx),
            )
        }},
        Err(reason) => quote! {
            ::tokio_nbfsm::Callback::<#state_ty>::Malformed(#reason)
        },
    };

    quote! {
        declarations.bind(#method_name, #role, #callback);
    }
}

/// `impl State` for a fieldless enum, in declaration order.
pub fn generate_state(input: &DeriveInput) -> syn::Result<TokenStream> {
    let Data::Enum(data) = &input.data else {
        return Err(Error::new_spanned(
            &input.ident,
            "State can only be derived for enums",
        ));
    };
    if data.variants.is_empty() {
        return Err(Error::new_spanned(
            &input.ident,
            "a State enum needs at least one variant",
        ));
    }

    let mut variants = Vec::with_capacity(data.variants.len());
    for variant in &data.variants {
        if !matches!(variant.fields, Fields::Unit) {
            return Err(Error::new_spanned(variant, "State variants cannot carry data"));
        }
        variants.push(&variant.ident);
    }
    let names = variants.iter().map(|variant| state_literal(variant));

    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    Ok(quote! {
        impl #impl_generics ::tokio_nbfsm::State for #name #ty_generics #where_clause {
            const ALL: &'static [Self] = &[#(Self::#variants),*];

            fn name(&self) -> &'static str {
                match self {
                    #(Self::#variants => #names,)*
                }
            }
        }
    })
}
