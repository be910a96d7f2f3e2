//! `#[handler(...)]` attribute implementation.
//!
//! The attribute leaves the handler type in place, strips its inert
//! `#[decorate(...)]` attributes and appends a `HandlerEntry` static to the
//! `HANDLERS` distributed slice in `mediati-core`. The entry carries both the
//! bare type name and its full path (`module_path!()` plus the name).
//!
//! # Handler arguments
//!
//! | Form | Description |
//! |------|-------------|
//! | `MessageType` | A message the handler answers (at least one) |
//! | `construct = default` | Derive `Construct` from `Default` |
//!
//! # Decorator arguments `#[decorate(...)]`
//!
//! | Form | Required | Description |
//! |------|----------|-------------|
//! | `Template` | **Yes** | Decorator template type |
//! | `order = N` | No | Ordering key (default `0`) |
//! | `config = expr` | No | Payload expression (default `Default::default()`) |

use proc_macro2::{Span, TokenStream};
use quote::quote;
use syn::{
    Attribute, Expr, Generics, Ident, Item, Token, Type,
    parse::{Parse, ParseStream, Result},
    punctuated::Punctuated,
    spanned::Spanned,
};

// ─── Input AST types ─────────────────────────────────────────────────────────

enum HandlerArg {
    Message(Type),
    ConstructDefault,
}

impl Parse for HandlerArg {
    fn parse(input: ParseStream) -> Result<Self> {
        if input.peek(Ident) && input.peek2(Token![=]) {
            let key: Ident = input.parse()?;
            input.parse::<Token![=]>()?;
            let value: Ident = input.parse()?;
            if key != "construct" {
                return Err(syn::Error::new(
                    key.span(),
                    format!("unknown handler option `{key}`, expected `construct`"),
                ));
            }
            if value != "default" {
                return Err(syn::Error::new(
                    value.span(),
                    "only `construct = default` is supported",
                ));
            }
            return Ok(HandlerArg::ConstructDefault);
        }
        Ok(HandlerArg::Message(input.parse()?))
    }
}

pub struct HandlerArgs {
    messages: Vec<Type>,
    construct_default: bool,
}

impl Parse for HandlerArgs {
    fn parse(input: ParseStream) -> Result<Self> {
        let args = Punctuated::<HandlerArg, Token![,]>::parse_terminated(input)?;
        let mut messages = Vec::new();
        let mut construct_default = false;
        for arg in args {
            match arg {
                HandlerArg::Message(ty) => messages.push(ty),
                HandlerArg::ConstructDefault => construct_default = true,
            }
        }
        if messages.is_empty() {
            return Err(syn::Error::new(
                Span::call_site(),
                "#[handler] requires at least one message type",
            ));
        }
        Ok(Self {
            messages,
            construct_default,
        })
    }
}

/// One `#[decorate(Template, order = N, config = expr)]`.
struct Decoration {
    template: Type,
    order: Option<Expr>,
    config: Option<Expr>,
}

impl Parse for Decoration {
    fn parse(input: ParseStream) -> Result<Self> {
        let template: Type = input.parse()?;
        let mut order = None;
        let mut config = None;

        while input.peek(Token![,]) {
            input.parse::<Token![,]>()?;
            if input.is_empty() {
                break;
            }
            let key: Ident = input.parse()?;
            input.parse::<Token![=]>()?;
            let value: Expr = input.parse()?;
            let slot = if key == "order" {
                &mut order
            } else if key == "config" {
                &mut config
            } else {
                return Err(syn::Error::new(
                    key.span(),
                    format!("unknown decorator option `{key}`, expected `order` or `config`"),
                ));
            };
            if slot.replace(value).is_some() {
                return Err(syn::Error::new(key.span(), format!("duplicate `{key}`")));
            }
        }

        Ok(Self {
            template,
            order,
            config,
        })
    }
}

// ─── Expansion ───────────────────────────────────────────────────────────────

fn take_decorations(attrs: &mut Vec<Attribute>) -> Result<Vec<Decoration>> {
    let mut decorations = Vec::new();
    let mut kept = Vec::with_capacity(attrs.len());
    for attr in attrs.drain(..) {
        if attr.path().is_ident("decorate") {
            decorations.push(attr.parse_args::<Decoration>()?);
        } else {
            kept.push(attr);
        }
    }
    *attrs = kept;
    Ok(decorations)
}

fn reject_generics(generics: &Generics) -> Result<()> {
    if generics.params.is_empty() {
        Ok(())
    } else {
        Err(syn::Error::new(
            generics.span(),
            "handler types must be concrete; generic handlers cannot be registered",
        ))
    }
}

pub fn expand(args: HandlerArgs, mut item: Item) -> Result<TokenStream> {
    let (ident, decorations) = match &mut item {
        Item::Struct(s) => {
            reject_generics(&s.generics)?;
            (s.ident.clone(), take_decorations(&mut s.attrs)?)
        }
        Item::Enum(e) => {
            reject_generics(&e.generics)?;
            (e.ident.clone(), take_decorations(&mut e.attrs)?)
        }
        other => {
            return Err(syn::Error::new(
                other.span(),
                "#[handler] can only be applied to structs and enums",
            ));
        }
    };

    let core = quote!(::mediati::core);
    let name = ident.to_string();
    let static_name = Ident::new(
        &format!("_MEDIATI_HANDLER_{}", name.to_uppercase()),
        Span::call_site(),
    );

    let bindings = args.messages.iter().map(|message| {
        let declarations = decorations.iter().map(|d| {
            let template = &d.template;
            let order = d.order.as_ref().map_or_else(|| quote!(0), |o| quote!(#o));
            let config = d.config.as_ref().map_or_else(
                || quote!(::core::default::Default::default()),
                |c| quote!(#c),
            );
            quote! {
                #core::DecoratorDeclaration::<#message>::new::<#template>(#order, #config)
            }
        });
        quote! {
            || #core::CapabilityBinding::new::<#ident, #message>(::std::vec![#(#declarations),*])
        }
    });

    let construct = args.construct_default.then(|| {
        quote! {
            impl #core::Construct for #ident {
                fn construct(_deps: &dyn #core::Resolve) -> #core::PipelineResult<Self> {
                    ::core::result::Result::Ok(<Self as ::core::default::Default>::default())
                }
            }
        }
    });

    Ok(quote! {
        #item

        #construct

        #[#core::linkme::distributed_slice(#core::HANDLERS)]
        #[linkme(crate = #core::linkme)]
        static #static_name: #core::HandlerEntry = #core::HandlerEntry {
            name: #name,
            path: ::core::concat!(::core::module_path!(), "::", #name),
            type_id: || ::core::any::TypeId::of::<#ident>(),
            bindings: &[#(#bindings),*],
        };
    })
}
