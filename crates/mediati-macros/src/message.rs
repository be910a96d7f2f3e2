//! `#[derive(Command)]`, `#[derive(Query)]` and `#[derive(DomainEvent)]`.
//!
//! All three share the `#[message(...)]` attribute:
//!
//! | Key | Example | Required | Description |
//! |-----|---------|----------|-------------|
//! | `output` | `u64` | Queries only | Result type (default `()`) |
//! | `name` | `"user.created"` | No | Event name, `DomainEvent` only |

use proc_macro2::TokenStream;
use quote::quote;
use syn::{DeriveInput, LitStr, Type};

#[derive(Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Command,
    Query,
    Event,
}

impl Kind {
    fn derive_name(self) -> &'static str {
        match self {
            Kind::Command => "Command",
            Kind::Query => "Query",
            Kind::Event => "DomainEvent",
        }
    }
}

#[derive(Default)]
struct MessageAttrs {
    output: Option<Type>,
    name: Option<LitStr>,
}

fn parse_attrs(input: &DeriveInput) -> syn::Result<MessageAttrs> {
    let mut attrs = MessageAttrs::default();
    for attr in &input.attrs {
        if !attr.path().is_ident("message") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("output") {
                attrs.output = Some(meta.value()?.parse()?);
                Ok(())
            } else if meta.path.is_ident("name") {
                attrs.name = Some(meta.value()?.parse()?);
                Ok(())
            } else {
                Err(meta.error("unsupported message attribute, expected `output` or `name`"))
            }
        })?;
    }
    Ok(attrs)
}

pub fn derive(input: &DeriveInput, kind: Kind) -> syn::Result<TokenStream> {
    let attrs = parse_attrs(input)?;
    let ident = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();
    let core = quote!(::mediati::core);

    if kind == Kind::Query && attrs.output.is_none() {
        return Err(syn::Error::new(
            ident.span(),
            "#[derive(Query)] requires `#[message(output = Type)]`",
        ));
    }
    if kind != Kind::Event && attrs.name.is_some() {
        return Err(syn::Error::new(
            ident.span(),
            format!("`name` is only supported on DomainEvent, not {}", kind.derive_name()),
        ));
    }

    let output = attrs.output.map_or_else(|| quote!(()), |ty| quote!(#ty));
    let (role, marker) = match kind {
        Kind::Command => (quote!(Command), quote!(Command)),
        Kind::Query => (quote!(Query), quote!(Query)),
        Kind::Event => (quote!(Event), quote!(DomainEvent)),
    };

    let marker_body = attrs.name.map(|name| {
        quote! {
            fn event_name(&self) -> &'static str {
                #name
            }
        }
    });

    Ok(quote! {
        impl #impl_generics #core::Message for #ident #ty_generics #where_clause {
            type Output = #output;
            const ROLE: #core::Role = #core::Role::#role;
        }

        impl #impl_generics #core::#marker for #ident #ty_generics #where_clause {
            #marker_body
        }
    })
}
