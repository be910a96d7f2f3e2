//! Procedural macros for the Mediati mediator.
//!
//! This crate provides:
//!
//! - `#[handler(...)]`: registers a handler type with the startup registry,
//!   together with its `#[decorate(...)]` declarations
//! - `#[derive(Command)]`, `#[derive(Query)]`, `#[derive(DomainEvent)]`:
//!   implement the message traits
//!
//! Generated code refers to `::mediati::core`, so these macros are meant to be
//! used through the `mediati` crate.
//!
//! ```rust,ignore
//! use mediati::prelude::*;
//! use mediati::framework::{WrapError, WrapErrorConfig};
//!
//! #[derive(Debug, Command)]
//! #[message(output = u64)]
//! pub struct CreateUser {
//!     pub name: String,
//! }
//!
//! #[handler(CreateUser, construct = default)]
//! #[decorate(WrapError, order = 10, config = WrapErrorConfig { rethrow: false })]
//! #[derive(Default)]
//! pub struct CreateUserHandler;
//!
//! #[async_trait]
//! impl Handler<CreateUser> for CreateUserHandler {
//!     async fn handle(&self, command: CreateUser) -> HandlerResult<u64> {
//!         Ok(42)
//!     }
//! }
//! ```

mod handler;
mod message;

use proc_macro::TokenStream;
use syn::{DeriveInput, Item, parse_macro_input};

use crate::handler::HandlerArgs;
use crate::message::Kind;

/// Registers a concrete handler type.
///
/// Arguments are the message types the handler answers, optionally followed
/// by `construct = default` to derive `Construct` from `Default`. A handler
/// with more than one message type is rejected at startup.
///
/// Decorators are declared with `#[decorate(Template, order = N, config = expr)]`
/// below the `#[handler]` attribute. They are listed outermost first once
/// sorted by `order`; equal keys keep their declaration order.
///
/// ```rust,ignore
/// #[handler(GetUser)]
/// #[decorate(Trace, order = 0)]
/// #[decorate(Timeout, order = 10, config = TimeoutConfig { millis: 500 })]
/// pub struct GetUserHandler {
///     repo: Arc<dyn UserRepository>,
/// }
/// ```
#[proc_macro_attribute]
pub fn handler(attr: TokenStream, item: TokenStream) -> TokenStream {
    let args = parse_macro_input!(attr as HandlerArgs);
    let item = parse_macro_input!(item as Item);

    match handler::expand(args, item) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

/// Implements `Message` and `Command`.
///
/// `#[message(output = T)]` sets the result type, `()` by default.
#[proc_macro_derive(Command, attributes(message))]
pub fn derive_command(input: TokenStream) -> TokenStream {
    derive_message(input, Kind::Command)
}

/// Implements `Message` and `Query`.
///
/// `#[message(output = T)]` is required.
#[proc_macro_derive(Query, attributes(message))]
pub fn derive_query(input: TokenStream) -> TokenStream {
    derive_message(input, Kind::Query)
}

/// Implements `Message` and `DomainEvent`.
///
/// `#[message(name = "...")]` overrides the event name, and
/// `#[message(output = T)]` the handler result type (`()` by default).
#[proc_macro_derive(DomainEvent, attributes(message))]
pub fn derive_domain_event(input: TokenStream) -> TokenStream {
    derive_message(input, Kind::Event)
}

fn derive_message(input: TokenStream, kind: Kind) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    match message::derive(&input, kind) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}
