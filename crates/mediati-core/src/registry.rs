//! Handler registry.
//!
//! Every `#[handler(...)]` type contributes one [`HandlerEntry`] to the
//! [`HANDLERS`] distributed slice at link time. [`discover`] turns those
//! candidates into [`HandlerDescriptor`]s, one per concrete handler type, and
//! rejects types that claim more than one message.
//!
//! Entries can also be written by hand:
//!
//! ```rust,ignore
//! static ENTRY: HandlerEntry = HandlerEntry {
//!     name: "PingHandler",
//!     path: concat!(module_path!(), "::PingHandler"),
//!     type_id: || TypeId::of::<PingHandler>(),
//!     bindings: &[|| CapabilityBinding::new::<PingHandler, Ping>(vec![])],
//! };
//! ```

use std::any::TypeId;
use std::fmt;
use std::sync::Arc;

use linkme::distributed_slice;
use tracing::debug;

use crate::capability::Capability;
use crate::decorator::DecoratorDeclaration;
use crate::dependency::Resolve;
use crate::error::{PipelineResult, RegistrationError};
use crate::handler::{Construct, Handler};
use crate::message::Message;
use crate::metadata::{DecoratorOverrides, read_decorators};
use crate::pipeline;
use crate::registrar::{ChainLifetime, RegisteredChain};

/// Static description of a candidate handler type.
#[derive(Clone, Copy)]
pub struct HandlerEntry {
    /// Bare type name. Configuration overrides may use it when unambiguous.
    pub name: &'static str,
    /// Full type path, used in diagnostics and as the canonical override key.
    pub path: &'static str,
    /// Returns the handler's `TypeId`.
    pub type_id: fn() -> TypeId,
    /// One binding per message type the handler answers.
    pub bindings: &'static [fn() -> CapabilityBinding],
}

impl fmt::Debug for HandlerEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerEntry")
            .field("path", &self.path)
            .field("bindings", &self.bindings.len())
            .finish()
    }
}

/// Handler candidates contributed by `#[handler(...)]`.
#[distributed_slice]
pub static HANDLERS: [HandlerEntry];

/// Returns all contributed candidates, sorted by path.
pub fn collect_handlers() -> Vec<HandlerEntry> {
    let mut entries = HANDLERS.to_vec();
    entries.sort_by_key(|entry| entry.path);
    entries
}

/// Everything a binding needs to install its chain.
pub struct InstallContext<'a> {
    /// Path of the handler the binding belongs to.
    pub handler: &'static str,
    /// Dependency source for links.
    pub deps: &'a Arc<dyn Resolve>,
    /// Decorator overrides, keyed by handler path.
    pub overrides: &'a DecoratorOverrides,
    /// Chain lifetime policy.
    pub lifetime: ChainLifetime,
}

type InstallFn = dyn Fn(&InstallContext<'_>) -> PipelineResult<RegisteredChain> + Send + Sync;

/// A handler's typed link to one capability.
///
/// Erases `H` and `M` while keeping the monomorphised read/build steps.
pub struct CapabilityBinding {
    capability: Capability,
    install: Box<InstallFn>,
}

impl CapabilityBinding {
    /// Binds handler `H` to message `M` with its declared decorators.
    pub fn new<H, M>(declared: Vec<DecoratorDeclaration<M>>) -> Self
    where
        H: Handler<M> + Construct,
        M: Message,
    {
        Self {
            capability: Capability::of::<M>(),
            install: Box::new(move |ctx: &InstallContext<'_>| {
                let decorators = read_decorators(ctx.handler, &declared, ctx.overrides);
                let factory = pipeline::build::<H, M>(ctx.handler, decorators, Arc::clone(ctx.deps))?;
                RegisteredChain::new(ctx.handler, factory, ctx.lifetime)
            }),
        }
    }

    /// The capability this binding satisfies.
    pub fn capability(&self) -> Capability {
        self.capability
    }

    /// Reads metadata, builds the chain and prepares it for registration.
    pub fn install(&self, ctx: &InstallContext<'_>) -> PipelineResult<RegisteredChain> {
        (self.install)(ctx)
    }
}

impl fmt::Debug for CapabilityBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapabilityBinding")
            .field("capability", &self.capability)
            .finish_non_exhaustive()
    }
}

/// A discovered handler and the capability it satisfies.
#[derive(Debug)]
pub struct HandlerDescriptor {
    /// Bare handler type name.
    pub name: &'static str,
    /// Full handler type path.
    pub path: &'static str,
    /// Handler `TypeId`.
    pub handler_type: TypeId,
    /// The single capability the handler satisfies.
    pub capability: Capability,
    /// Typed binding used to build the chain.
    pub binding: CapabilityBinding,
}

/// Identifies the capability of each candidate.
///
/// Candidates without bindings are skipped. Candidates with several bindings
/// are reported as [`RegistrationError::MultipleCapabilities`].
pub fn discover(candidates: &[HandlerEntry]) -> (Vec<HandlerDescriptor>, Vec<RegistrationError>) {
    let mut descriptors = Vec::with_capacity(candidates.len());
    let mut errors = Vec::new();

    for entry in candidates {
        let mut bindings: Vec<CapabilityBinding> = entry.bindings.iter().map(|bind| bind()).collect();

        if bindings.len() > 1 {
            errors.push(RegistrationError::MultipleCapabilities {
                handler: entry.path,
                capabilities: bindings.iter().map(CapabilityBinding::capability).collect(),
            });
            continue;
        }

        let Some(binding) = bindings.pop() else {
            debug!(handler = entry.path, "Skipping candidate without capabilities");
            continue;
        };

        debug!(handler = entry.path, capability = %binding.capability(), "Discovered handler");
        descriptors.push(HandlerDescriptor {
            name: entry.name,
            path: entry.path,
            handler_type: (entry.type_id)(),
            capability: binding.capability(),
            binding,
        });
    }

    (descriptors, errors)
}
