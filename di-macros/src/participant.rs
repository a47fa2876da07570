//! Implementation of #[derive(Participant)] proc-macro.

use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, Data, DeriveInput, Field, Fields};

pub fn derive_participant_impl(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    let name = &input.ident;
    let generics = &input.generics;
    let (impl_generics, ty_generics, where_clause) = generics.split_for_impl();

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return syn::Error::new_spanned(
                    &input,
                    "Participant can only be derived for structs with named fields",
                )
                .to_compile_error()
                .into();
            }
        },
        _ => {
            return syn::Error::new_spanned(&input, "Participant can only be derived for structs")
                .to_compile_error()
                .into();
        }
    };

    let marked: Vec<&Field> = fields.iter().filter(|f| is_node_field(f)).collect();

    let node_field = match marked.as_slice() {
        [field] => field.ident.as_ref(),
        [] => {
            return syn::Error::new_spanned(
                &input,
                "Participant derive requires one field marked #[node]",
            )
            .to_compile_error()
            .into();
        }
        [_, extra, ..] => {
            return syn::Error::new_spanned(extra, "only one field may be marked #[node]")
                .to_compile_error()
                .into();
        }
    };

    // The marked field must be an `Arc<Node>`; the type checker enforces it
    // through `Arc::clone`.
    let expanded = quote! {
        impl #impl_generics ::servicetree::Participant for #name #ty_generics #where_clause {
            fn as_node(&self) -> ::core::option::Option<::std::sync::Arc<::servicetree::Node>> {
                ::core::option::Option::Some(::std::sync::Arc::clone(&self.#node_field))
            }
        }
    };

    TokenStream::from(expanded)
}

fn is_node_field(field: &Field) -> bool {
    field.attrs.iter().any(|attr| attr.path().is_ident("node"))
}
