//! # Mediati
//!
//! An in-process mediator: callers send commands, queries and domain events
//! to a [`Mediator`](core::Mediator), which routes each message to the one
//! handler registered for its type, through that handler's decorator chain.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   dispatch   ┌──────────┐   capability   ┌─────────────────────────────────┐
//! │  caller  │─────────────▶│ Mediator │───────────────▶│ Trace → WrapError → ... → handler │
//! └──────────┘              └──────────┘                └─────────────────────────────────┘
//! ```
//!
//! - **Handlers** are registered at link time with `#[handler(...)]` and
//!   collected once at startup.
//! - **Decorators** (`#[decorate(...)]`) wrap a handler in ascending `order`;
//!   the lowest order runs first.
//! - **Runtime** loads configuration, sets up logging, provides dependencies
//!   and builds the mediator.
//!
//! ## Quick Start
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
//! #[decorate(WrapError, config = WrapErrorConfig { rethrow: true })]
//! #[derive(Default)]
//! pub struct CreateUserHandler;
//!
//! #[async_trait]
//! impl Handler<CreateUser> for CreateUserHandler {
//!     async fn handle(&self, command: CreateUser) -> HandlerResult<u64> {
//!         Ok(command.name.len() as u64)
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let runtime = MediatiRuntime::new();
//!     let mediator = runtime.start()?;
//!     let id = mediator.send(CreateUser { name: "ada".into() }).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - `toml-config` *(default)*: read `mediati.toml`
//! - `yaml-config`: read `mediati.yaml`
//! - `json-log`: JSON log lines

pub use mediati_core as core;
pub use mediati_framework as framework;
pub use mediati_runtime as runtime;

pub use mediati_macros::{Command, DomainEvent, Query, handler};

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use mediati::prelude::*;
/// ```
pub mod prelude {
    // Runtime - main entry point
    pub use mediati_runtime::{MediatiConfig, MediatiRuntime};

    // Dispatch
    pub use mediati_core::{DispatchError, DispatchResult, DynMessage, Mediator};

    // Messages: traits and their derives
    pub use mediati_core::{Command, DomainEvent, Message, Query, Role, TriggersEvent};
    pub use mediati_macros::{Command, DomainEvent, Query};

    // Handlers
    pub use mediati_core::{
        Construct, Dependencies, Handler, HandlerResult, PipelineResult, Resolve, ResolveExt,
        async_trait,
    };
    pub use mediati_macros::handler;
}
