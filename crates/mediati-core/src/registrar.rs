//! Chain registrar.
//!
//! Startup registration runs once: candidates are discovered, each handler's
//! chain is built, and the result is recorded in a [`TableBuilder`]. Sealing
//! the builder yields the immutable [`RegistrationTable`] that the
//! [`Mediator`](crate::Mediator) reads at request time.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, info_span, warn};

use crate::capability::Capability;
use crate::dependency::{Dependencies, Resolve};
use crate::error::{
    BoxError, PipelineError, PipelineResult, RegistrationError, RegistrationResult, StartupError,
};
use crate::handler::BoxedHandler;
use crate::message::Message;
use crate::metadata::DecoratorOverrides;
use crate::pipeline::ChainFactory;
use crate::registry::{HandlerEntry, InstallContext, discover};

// ============================================================================
// Policies
// ============================================================================

/// How long a built chain lives.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChainLifetime {
    /// A fresh chain is built for every dispatch.
    #[default]
    Transient,
    /// One chain is built at registration and reused by every dispatch.
    ///
    /// Links must not keep per-call state in this mode. Link configuration
    /// is fixed once initialised, so the built-in decorators are safe to
    /// share.
    Shared,
}

/// What registration does when a handler fails to register.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StartupPolicy {
    /// Fail the whole startup.
    #[default]
    Abort,
    /// Log the failure, leave the handler out and continue.
    Skip,
}

// ============================================================================
// Registered Chains
// ============================================================================

pub(crate) enum InvokeError {
    Construction(PipelineError),
    Handler(BoxError),
    WrongMessage,
}

#[async_trait]
trait ErasedChain: Send + Sync {
    async fn invoke(&self, message: Box<dyn Any + Send>) -> Result<Box<dyn Any + Send>, InvokeError>;
}

enum ChainSource<M: Message> {
    Transient(ChainFactory<M>),
    Shared(BoxedHandler<M>),
}

#[async_trait]
impl<M: Message> ErasedChain for ChainSource<M> {
    async fn invoke(&self, message: Box<dyn Any + Send>) -> Result<Box<dyn Any + Send>, InvokeError> {
        let message = *message
            .downcast::<M>()
            .map_err(|_| InvokeError::WrongMessage)?;

        let output = match self {
            ChainSource::Transient(factory) => {
                let chain = factory().map_err(InvokeError::Construction)?;
                chain.handle(message).await
            }
            ChainSource::Shared(chain) => chain.handle(message).await,
        }
        .map_err(InvokeError::Handler)?;

        Ok(Box::new(output))
    }
}

/// A built chain ready to be placed in the table.
#[derive(Clone)]
pub struct RegisteredChain {
    handler: &'static str,
    capability: Capability,
    lifetime: ChainLifetime,
    chain: Arc<dyn ErasedChain>,
}

impl RegisteredChain {
    /// Wraps `factory` for handler `handler` under the given lifetime.
    ///
    /// With [`ChainLifetime::Shared`] the chain is built here, once.
    pub fn new<M: Message>(
        handler: &'static str,
        factory: ChainFactory<M>,
        lifetime: ChainLifetime,
    ) -> PipelineResult<Self> {
        let source = match lifetime {
            ChainLifetime::Transient => ChainSource::Transient(factory),
            ChainLifetime::Shared => ChainSource::Shared(factory()?),
        };
        Ok(Self {
            handler,
            capability: Capability::of::<M>(),
            lifetime,
            chain: Arc::new(source),
        })
    }

    /// Handler name.
    pub fn handler(&self) -> &'static str {
        self.handler
    }

    /// The capability this chain answers.
    pub fn capability(&self) -> Capability {
        self.capability
    }

    /// The chain's lifetime policy.
    pub fn lifetime(&self) -> ChainLifetime {
        self.lifetime
    }

    pub(crate) async fn invoke(
        &self,
        message: Box<dyn Any + Send>,
    ) -> Result<Box<dyn Any + Send>, InvokeError> {
        self.chain.invoke(message).await
    }
}

impl fmt::Debug for RegisteredChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisteredChain")
            .field("handler", &self.handler)
            .field("capability", &self.capability)
            .field("lifetime", &self.lifetime)
            .finish()
    }
}

// ============================================================================
// Table
// ============================================================================

/// Append-only builder for the registration table.
#[derive(Debug, Default)]
pub struct TableBuilder {
    entries: HashMap<Capability, RegisteredChain>,
    skipped: Vec<RegistrationError>,
}

impl TableBuilder {
    /// Creates an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds the chain's capability to the chain.
    ///
    /// An already bound capability is never overwritten.
    pub fn register(&mut self, chain: RegisteredChain) -> RegistrationResult<()> {
        if let Some(existing) = self.entries.get(&chain.capability) {
            return Err(RegistrationError::DuplicateCapability {
                capability: chain.capability,
                existing: existing.handler,
                handler: chain.handler,
            });
        }

        debug!(
            handler = chain.handler,
            capability = %chain.capability,
            "Registered chain"
        );
        self.entries.insert(chain.capability, chain);
        Ok(())
    }

    /// Number of registered chains.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing is registered yet.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Freezes the builder into a read-only table.
    pub fn seal(self) -> RegistrationTable {
        RegistrationTable {
            entries: self.entries,
            skipped: self.skipped,
        }
    }
}

/// The sealed capability to chain mapping.
#[derive(Debug, Default)]
pub struct RegistrationTable {
    entries: HashMap<Capability, RegisteredChain>,
    skipped: Vec<RegistrationError>,
}

impl RegistrationTable {
    /// Returns the chain registered for `capability`.
    pub fn get(&self, capability: &Capability) -> Option<&RegisteredChain> {
        self.entries.get(capability)
    }

    /// Returns `true` if a chain answers `M`.
    pub fn contains<M: Message>(&self) -> bool {
        self.entries.contains_key(&Capability::of::<M>())
    }

    /// Iterates over all registered chains.
    pub fn chains(&self) -> impl Iterator<Item = &RegisteredChain> {
        self.entries.values()
    }

    /// Handlers left out under [`StartupPolicy::Skip`].
    pub fn skipped(&self) -> &[RegistrationError] {
        &self.skipped
    }

    /// Number of registered chains.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no chain is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ============================================================================
// Startup Registration
// ============================================================================

/// Inputs of the startup registration pass.
#[derive(Clone)]
pub struct RegistrationOptions {
    /// Dependency source for handlers and links.
    pub dependencies: Arc<dyn Resolve>,
    /// Decorator overrides from configuration, keyed by handler path or name.
    pub overrides: DecoratorOverrides,
    /// Chain lifetime applied to every handler.
    pub lifetime: ChainLifetime,
    /// Behaviour on registration failure.
    pub policy: StartupPolicy,
}

impl Default for RegistrationOptions {
    fn default() -> Self {
        Self {
            dependencies: Arc::new(Dependencies::new()),
            overrides: DecoratorOverrides::default(),
            lifetime: ChainLifetime::default(),
            policy: StartupPolicy::default(),
        }
    }
}

impl RegistrationOptions {
    /// Creates options with an empty dependency source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the dependency source.
    pub fn dependencies(mut self, deps: impl Resolve + 'static) -> Self {
        self.dependencies = Arc::new(deps);
        self
    }

    /// Sets the decorator overrides.
    pub fn overrides(mut self, overrides: DecoratorOverrides) -> Self {
        self.overrides = overrides;
        self
    }

    /// Sets the chain lifetime.
    pub fn lifetime(mut self, lifetime: ChainLifetime) -> Self {
        self.lifetime = lifetime;
        self
    }

    /// Sets the failure policy.
    pub fn policy(mut self, policy: StartupPolicy) -> Self {
        self.policy = policy;
        self
    }
}

impl fmt::Debug for RegistrationOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistrationOptions")
            .field("overrides", &self.overrides)
            .field("lifetime", &self.lifetime)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

/// Discovers, builds and registers every candidate handler.
///
/// Overrides that match no handler, or several, count as failures: they
/// abort startup under [`StartupPolicy::Abort`] and are recorded and not
/// applied under [`StartupPolicy::Skip`].
pub fn register_all(
    candidates: &[HandlerEntry],
    options: &RegistrationOptions,
) -> Result<RegistrationTable, StartupError> {
    let span = info_span!("register_handlers", candidates = candidates.len());
    let _enter = span.enter();

    let (descriptors, mut failures) = discover(candidates);

    let names: Vec<_> = descriptors.iter().map(|d| (d.name, d.path)).collect();
    let (overrides, unbound) = options.overrides.bind(&names);
    for e in unbound {
        error!(error = %e, "Invalid decorator override");
        failures.push(e);
    }

    let mut builder = TableBuilder::new();
    for descriptor in descriptors {
        let ctx = InstallContext {
            handler: descriptor.path,
            deps: &options.dependencies,
            overrides: &overrides,
            lifetime: options.lifetime,
        };

        let result = descriptor
            .binding
            .install(&ctx)
            .map_err(|source| RegistrationError::Pipeline {
                handler: descriptor.path,
                capability: descriptor.capability,
                source,
            })
            .and_then(|chain| builder.register(chain));

        if let Err(e) = result {
            error!(handler = descriptor.path, error = %e, "Handler registration failed");
            failures.push(e);
        }
    }

    if !failures.is_empty() {
        match options.policy {
            StartupPolicy::Abort => return Err(StartupError { failures }),
            StartupPolicy::Skip => {
                warn!(
                    skipped = failures.len(),
                    "Continuing without handlers that failed to register"
                );
                builder.skipped = failures;
            }
        }
    }

    let table = builder.seal();
    info!(handlers = table.len(), "Handler registration complete");
    Ok(table)
}

#[cfg(test)]
mod tests {
    use std::any::TypeId;

    use super::*;
    use crate::decorator::DecoratorDeclaration;
    use crate::pipeline;
    use crate::registry::CapabilityBinding;
    use crate::testing::{Journal, Ping, PingHandler, Tag, Unlisted};

    fn deps(journal: &Journal) -> Arc<dyn Resolve> {
        Arc::new(Dependencies::new().with(Arc::new(journal.clone())))
    }

    fn ping_chain(handler: &'static str, journal: &Journal) -> RegisteredChain {
        let factory = pipeline::build::<PingHandler, Ping>(handler, vec![], deps(journal)).unwrap();
        RegisteredChain::new(handler, factory, ChainLifetime::Transient).unwrap()
    }

    #[test]
    fn duplicate_capability_is_rejected() {
        let journal = Journal::default();
        let mut builder = TableBuilder::new();
        builder.register(ping_chain("First", &journal)).unwrap();

        let err = builder.register(ping_chain("Second", &journal)).unwrap_err();
        match err {
            RegistrationError::DuplicateCapability {
                existing, handler, ..
            } => {
                assert_eq!(existing, "First");
                assert_eq!(handler, "Second");
            }
            other => panic!("unexpected error: {other}"),
        }

        let table = builder.seal();
        assert_eq!(table.len(), 1);
        assert_eq!(table.get(&Capability::of::<Ping>()).unwrap().handler(), "First");
    }

    static GOOD: HandlerEntry = HandlerEntry {
        name: "PingHandler",
        path: "mediati_core::testing::PingHandler",
        type_id: || TypeId::of::<PingHandler>(),
        bindings: &[|| {
            CapabilityBinding::new::<PingHandler, Ping>(vec![DecoratorDeclaration::new::<Tag<1>>(
                0,
                (),
            )])
        }],
    };

    static BROKEN: HandlerEntry = HandlerEntry {
        name: "BrokenPingHandler",
        path: concat!(module_path!(), "::BrokenPingHandler"),
        type_id: || TypeId::of::<Journal>(),
        bindings: &[|| {
            CapabilityBinding::new::<PingHandler, Ping>(vec![
                DecoratorDeclaration::new::<Unlisted>(0, ()),
            ])
        }],
    };

    #[test]
    fn abort_policy_reports_every_failure() {
        let journal = Journal::default();
        let options = RegistrationOptions {
            dependencies: deps(&journal),
            ..Default::default()
        };
        let err = register_all(&[BROKEN], &options).unwrap_err();
        assert_eq!(err.failures.len(), 1);
        assert_eq!(
            err.failures[0].handler(),
            Some("mediati_core::registrar::tests::BrokenPingHandler")
        );
        assert!(matches!(
            &err.failures[0],
            RegistrationError::Pipeline {
                source: PipelineError::DependencyNotFound { .. },
                ..
            }
        ));
    }

    #[test]
    fn skip_policy_keeps_healthy_handlers() {
        let journal = Journal::default();
        let options = RegistrationOptions {
            dependencies: deps(&journal),
            policy: StartupPolicy::Skip,
            ..Default::default()
        };
        let table = register_all(&[BROKEN, GOOD], &options).unwrap();
        assert!(table.contains::<Ping>());
        assert_eq!(table.skipped().len(), 1);
        assert_eq!(
            table.get(&Capability::of::<Ping>()).unwrap().handler(),
            "mediati_core::testing::PingHandler"
        );
    }

    #[test]
    fn overrides_reach_the_builder() {
        let journal = Journal::default();
        let mut overrides = DecoratorOverrides::new();
        overrides.set(
            "PingHandler",
            "Tag1",
            crate::metadata::DecoratorOverride {
                order: None,
                config: Some(serde_json::json!("not a unit")),
            },
        );
        let options = RegistrationOptions {
            dependencies: deps(&journal),
            overrides,
            ..Default::default()
        };
        let err = register_all(&[GOOD], &options).unwrap_err();
        assert!(matches!(
            &err.failures[0],
            RegistrationError::Pipeline {
                source: PipelineError::AttributeTypeMismatch { template: "Tag1", .. },
                ..
            }
        ));
    }

    fn misspelled_override() -> DecoratorOverrides {
        let mut overrides = DecoratorOverrides::new();
        overrides.set(
            "PingHandlr",
            "Tag1",
            crate::metadata::DecoratorOverride {
                order: Some(5),
                config: None,
            },
        );
        overrides
    }

    #[test]
    fn unknown_override_aborts_startup() {
        let journal = Journal::default();
        let options = RegistrationOptions {
            dependencies: deps(&journal),
            overrides: misspelled_override(),
            ..Default::default()
        };
        let err = register_all(&[GOOD], &options).unwrap_err();
        assert!(matches!(
            &err.failures[..],
            [RegistrationError::UnknownOverride { key }] if key == "PingHandlr"
        ));
        assert_eq!(err.failures[0].handler(), None);
    }

    #[test]
    fn unknown_override_is_recorded_under_skip() {
        let journal = Journal::default();
        let options = RegistrationOptions {
            dependencies: deps(&journal),
            overrides: misspelled_override(),
            policy: StartupPolicy::Skip,
            ..Default::default()
        };
        let table = register_all(&[GOOD], &options).unwrap();
        assert!(table.contains::<Ping>());
        assert!(matches!(
            table.skipped(),
            [RegistrationError::UnknownOverride { .. }]
        ));
    }

    #[test]
    fn overrides_accept_full_paths() {
        let journal = Journal::default();
        let mut overrides = DecoratorOverrides::new();
        overrides.set(
            "mediati_core::testing::PingHandler",
            "Tag1",
            crate::metadata::DecoratorOverride {
                order: None,
                config: Some(serde_json::json!("not a unit")),
            },
        );
        let options = RegistrationOptions {
            dependencies: deps(&journal),
            overrides,
            ..Default::default()
        };
        let err = register_all(&[GOOD], &options).unwrap_err();
        assert!(matches!(
            &err.failures[..],
            [RegistrationError::Pipeline {
                source: PipelineError::AttributeTypeMismatch { .. },
                ..
            }]
        ));
    }

    #[test]
    fn shared_lifetime_builds_once() {
        let journal = Journal::default();
        let options = RegistrationOptions {
            dependencies: deps(&journal),
            lifetime: ChainLifetime::Shared,
            ..Default::default()
        };
        let table = register_all(&[GOOD], &options).unwrap();
        // the startup check plus the shared instance
        assert_eq!(journal.constructed(), 2);
        assert_eq!(
            table.get(&Capability::of::<Ping>()).unwrap().lifetime(),
            ChainLifetime::Shared
        );
    }
}
