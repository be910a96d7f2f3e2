//! # Mediati Core
//!
//! The handler pipeline composition engine behind the Mediati mediator.
//!
//! Commands, queries and domain events are routed to exactly one registered
//! handler, optionally wrapped in an ordered chain of decorators declared on
//! the handler type.
//!
//! ## Components
//!
//! - **Handler Registry** ([`HANDLERS`], [`discover`]): finds concrete handler
//!   types and the single capability each one satisfies.
//! - **Decorator Metadata Reader** ([`read_decorators`]): orders the
//!   decorators declared on a handler and applies configuration overrides.
//! - **Pipeline Builder** ([`build`]): produces a [`ChainFactory`] that wires
//!   the handler and its decorators together.
//! - **Chain Registrar** ([`register_all`], [`TableBuilder`]): binds every
//!   capability to its chain in a sealed [`RegistrationTable`].
//! - **Dispatcher** ([`Mediator`]): routes a message by its concrete runtime
//!   type to the registered chain.
//!
//! ```text
//!              startup                               request time
//! ┌──────────┐  ┌──────────┐  ┌─────────┐  ┌───────┐     ┌──────────┐
//! │ Registry │─▶│ Metadata │─▶│ Builder │─▶│ Table │────▶│ Mediator │
//! └──────────┘  └──────────┘  └─────────┘  └───────┘     └──────────┘
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use mediati_core::{Mediator, RegistrationOptions, collect_handlers, register_all};
//!
//! let table = register_all(&collect_handlers(), &RegistrationOptions::new())?;
//! let mediator = Mediator::new(table);
//! let id = mediator.send(CreateUser { name: "ada".into() }).await?;
//! ```

pub mod capability;
pub mod decorator;
pub mod dependency;
pub mod dispatcher;
pub mod error;
pub mod handler;
pub mod message;
pub mod metadata;
pub mod pipeline;
pub mod registrar;
pub mod registry;

#[cfg(test)]
mod testing;

pub use capability::{Capability, TypeKey};
pub use decorator::{
    AttributeInitialised, Decorate, DecoratorDeclaration, DecoratorTemplate, ErasedInitialise,
    Link, Payload, TemplateKey,
};
pub use dependency::{Dependencies, Resolve, ResolveExt, ServiceArc};
pub use dispatcher::{DispatchPhase, Mediator, MediatorStats};
pub use error::{
    BoxError, DispatchError, DispatchResult, HandlerResult, PipelineError, PipelineResult,
    RegistrationError, RegistrationResult, StartupError,
};
pub use handler::{BoxedHandler, Construct, Handler};
pub use message::{Command, DomainEvent, DynMessage, Message, Query, Role, TriggersEvent};
pub use metadata::{DecoratorOverride, DecoratorOverrides, HandlerOverrides, read_decorators};
pub use pipeline::{ChainFactory, build};
pub use registrar::{
    ChainLifetime, RegisteredChain, RegistrationOptions, RegistrationTable, StartupPolicy,
    TableBuilder, register_all,
};
pub use registry::{
    CapabilityBinding, HANDLERS, HandlerDescriptor, HandlerEntry, InstallContext, collect_handlers,
    discover,
};

pub use async_trait::async_trait;
pub use linkme;
