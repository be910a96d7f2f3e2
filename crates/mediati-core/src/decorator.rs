//! Decorator templates, links and declarations.
//!
//! A decorator is declared on a handler with an ordering key and a
//! configuration payload. At build time the declaration is turned into a
//! *link*: a [`Handler<M>`] that owns the `next` handler of the chain.
//!
//! Three traits cooperate:
//!
//! - [`DecoratorTemplate`] names the decorator and its configuration type.
//!   It is implemented once, on a marker type.
//! - [`Decorate<M>`] instantiates the template for a concrete message type.
//!   Generic templates implement it for every `M` that satisfies their bounds,
//!   so an unsuitable message type is rejected at compile time.
//! - [`Link<M>`] is the built chain element. Links that implement
//!   [`AttributeInitialised`] receive their declaration's payload right after
//!   they are constructed.
//!
//! ```rust,ignore
//! pub struct Retry;
//!
//! impl DecoratorTemplate for Retry {
//!     const NAME: &'static str = "Retry";
//!     type Config = RetryConfig;
//! }
//!
//! impl<M: Message + Clone> Decorate<M> for Retry {
//!     type Link = RetryLink<M>;
//!
//!     fn decorate(next: BoxedHandler<M>, _deps: &dyn Resolve) -> PipelineResult<Self::Link> {
//!         Ok(RetryLink { next, attempts: 1 })
//!     }
//! }
//! ```

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;

use crate::dependency::Resolve;
use crate::error::{PipelineError, PipelineResult};
use crate::handler::{BoxedHandler, Handler};
use crate::message::Message;

// ============================================================================
// Templates
// ============================================================================

/// Names a decorator and its configuration type.
pub trait DecoratorTemplate: 'static {
    /// Name used in diagnostics and configuration overrides.
    const NAME: &'static str;

    /// The declaration payload type.
    type Config: DeserializeOwned + Send + Sync + 'static;
}

/// Instantiates a decorator template for message type `M`.
pub trait Decorate<M: Message>: DecoratorTemplate {
    /// The link produced for `M`.
    type Link: Link<M>;

    /// Builds the link around `next`, resolving other dependencies from `deps`.
    fn decorate(next: BoxedHandler<M>, deps: &dyn Resolve) -> PipelineResult<Self::Link>;
}

/// Identity of a decorator template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TemplateKey {
    id: TypeId,
    name: &'static str,
}

impl TemplateKey {
    /// Returns the key for template `T`.
    pub fn of<T: DecoratorTemplate>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: T::NAME,
        }
    }

    /// The template's `NAME`.
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl fmt::Display for TemplateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

// ============================================================================
// Links
// ============================================================================

/// A built element of a decorator chain.
pub trait Link<M: Message>: Handler<M> {
    /// The template this link was declared through.
    fn declaring_template(&self) -> Option<TemplateKey> {
        None
    }

    /// Exposes the link for attribute initialisation, if it supports it.
    fn as_initialisable(&mut self) -> Option<&mut dyn ErasedInitialise> {
        None
    }
}

/// A link configured from its declaration's payload.
pub trait AttributeInitialised {
    /// Payload type, matching the template's `Config`.
    type Config: 'static;

    /// Copies the declared configuration into the link.
    fn initialise_from_attribute(&mut self, config: &Self::Config);
}

/// Object-safe form of [`AttributeInitialised`].
pub trait ErasedInitialise {
    /// Initialises from an erased payload, failing if its type is wrong.
    fn initialise_erased(
        &mut self,
        template: &'static str,
        config: &(dyn Any + Send + Sync),
    ) -> PipelineResult<()>;
}

impl<T: AttributeInitialised> ErasedInitialise for T {
    fn initialise_erased(
        &mut self,
        template: &'static str,
        config: &(dyn Any + Send + Sync),
    ) -> PipelineResult<()> {
        let config = config.downcast_ref::<T::Config>().ok_or_else(|| {
            PipelineError::AttributeTypeMismatch {
                template,
                expected: std::any::type_name::<T::Config>(),
                reason: "link was declared with a payload of another type".into(),
            }
        })?;
        self.initialise_from_attribute(config);
        Ok(())
    }
}

// ============================================================================
// Declarations
// ============================================================================

/// A decorator configuration payload.
#[derive(Clone)]
pub enum Payload {
    /// A value of the template's `Config` type, set in code.
    Typed(Arc<dyn Any + Send + Sync>),
    /// A raw value from configuration, decoded at build time.
    Raw(serde_json::Value),
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Payload::Typed(_) => f.write_str("Typed(..)"),
            Payload::Raw(value) => f.debug_tuple("Raw").field(value).finish(),
        }
    }
}

type WrapFn<M> = fn(BoxedHandler<M>, &dyn Resolve) -> PipelineResult<Box<dyn Link<M>>>;
type DecodeFn = fn(&Payload) -> PipelineResult<Arc<dyn Any + Send + Sync>>;

/// One decorator declared on a handler for message type `M`.
pub struct DecoratorDeclaration<M: Message> {
    order: i64,
    template: TemplateKey,
    payload: Payload,
    wrap: WrapFn<M>,
    decode: DecodeFn,
}

impl<M: Message> DecoratorDeclaration<M> {
    /// Declares template `T` with ordering key `order` and a typed payload.
    pub fn new<T: Decorate<M>>(order: i64, config: T::Config) -> Self {
        Self::with_payload::<T>(order, Payload::Typed(Arc::new(config)))
    }

    /// Declares template `T` with a raw payload that is decoded at build time.
    pub fn from_value<T: Decorate<M>>(order: i64, config: serde_json::Value) -> Self {
        Self::with_payload::<T>(order, Payload::Raw(config))
    }

    fn with_payload<T: Decorate<M>>(order: i64, payload: Payload) -> Self {
        Self {
            order,
            template: TemplateKey::of::<T>(),
            payload,
            wrap: wrap::<M, T>,
            decode: decode::<T>,
        }
    }

    /// Ordering key; smaller keys sit further out in the chain.
    pub fn order(&self) -> i64 {
        self.order
    }

    /// The declared template.
    pub fn template(&self) -> TemplateKey {
        self.template
    }

    /// The declared payload.
    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    /// Replaces the ordering key.
    pub fn set_order(&mut self, order: i64) {
        self.order = order;
    }

    /// Replaces the payload with a raw configuration value.
    pub fn set_raw_config(&mut self, config: serde_json::Value) {
        self.payload = Payload::Raw(config);
    }

    /// Decodes the payload into the template's `Config` type.
    pub fn decode(&self) -> PipelineResult<Arc<dyn Any + Send + Sync>> {
        (self.decode)(&self.payload)
    }

    /// Builds the link around `next`.
    pub fn wrap(&self, next: BoxedHandler<M>, deps: &dyn Resolve) -> PipelineResult<Box<dyn Link<M>>> {
        (self.wrap)(next, deps)
    }
}

impl<M: Message> Clone for DecoratorDeclaration<M> {
    fn clone(&self) -> Self {
        Self {
            order: self.order,
            template: self.template,
            payload: self.payload.clone(),
            wrap: self.wrap,
            decode: self.decode,
        }
    }
}

impl<M: Message> fmt::Debug for DecoratorDeclaration<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecoratorDeclaration")
            .field("order", &self.order)
            .field("template", &self.template.name)
            .field("payload", &self.payload)
            .finish()
    }
}

fn wrap<M: Message, T: Decorate<M>>(
    next: BoxedHandler<M>,
    deps: &dyn Resolve,
) -> PipelineResult<Box<dyn Link<M>>> {
    Ok(Box::new(T::decorate(next, deps)?))
}

fn decode<T: DecoratorTemplate>(payload: &Payload) -> PipelineResult<Arc<dyn Any + Send + Sync>> {
    let mismatch = |reason: String| PipelineError::AttributeTypeMismatch {
        template: T::NAME,
        expected: std::any::type_name::<T::Config>(),
        reason,
    };

    match payload {
        Payload::Typed(value) if value.is::<T::Config>() => Ok(Arc::clone(value)),
        Payload::Typed(_) => Err(mismatch("typed payload has a different type".into())),
        Payload::Raw(value) => serde_json::from_value::<T::Config>(value.clone())
            .map(|config| Arc::new(config) as Arc<dyn Any + Send + Sync>)
            .map_err(|e| mismatch(e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use serde::Deserialize;

    use super::*;
    use crate::error::HandlerResult;
    use crate::message::Role;

    struct Echo;

    impl Message for Echo {
        type Output = String;
        const ROLE: Role = Role::Query;
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct PrefixConfig {
        prefix: String,
    }

    struct Prefix;

    impl DecoratorTemplate for Prefix {
        const NAME: &'static str = "Prefix";
        type Config = PrefixConfig;
    }

    impl Decorate<Echo> for Prefix {
        type Link = PrefixLink;

        fn decorate(next: BoxedHandler<Echo>, _deps: &dyn Resolve) -> PipelineResult<PrefixLink> {
            Ok(PrefixLink {
                next,
                prefix: String::new(),
            })
        }
    }

    struct PrefixLink {
        next: BoxedHandler<Echo>,
        prefix: String,
    }

    #[async_trait]
    impl Handler<Echo> for PrefixLink {
        async fn handle(&self, message: Echo) -> HandlerResult<String> {
            Ok(format!("{}{}", self.prefix, self.next.handle(message).await?))
        }
    }

    impl Link<Echo> for PrefixLink {
        fn declaring_template(&self) -> Option<TemplateKey> {
            Some(TemplateKey::of::<Prefix>())
        }

        fn as_initialisable(&mut self) -> Option<&mut dyn ErasedInitialise> {
            Some(self)
        }
    }

    impl AttributeInitialised for PrefixLink {
        type Config = PrefixConfig;

        fn initialise_from_attribute(&mut self, config: &PrefixConfig) {
            self.prefix = config.prefix.clone();
        }
    }

    #[test]
    fn raw_payload_decodes_into_config() {
        let decl = DecoratorDeclaration::<Echo>::from_value::<Prefix>(
            1,
            serde_json::json!({ "prefix": ">> " }),
        );
        let decoded = decl.decode().unwrap();
        assert_eq!(
            decoded.downcast_ref::<PrefixConfig>(),
            Some(&PrefixConfig { prefix: ">> ".into() })
        );
    }

    #[test]
    fn malformed_raw_payload_is_a_type_mismatch() {
        let decl =
            DecoratorDeclaration::<Echo>::from_value::<Prefix>(1, serde_json::json!({ "prefix": 3 }));
        assert!(matches!(
            decl.decode(),
            Err(PipelineError::AttributeTypeMismatch { template: "Prefix", .. })
        ));
    }

    #[test]
    fn erased_initialise_rejects_foreign_payload() {
        let mut link = PrefixLink {
            next: Box::new(Constant),
            prefix: String::new(),
        };
        let err = link.initialise_erased("Prefix", &42u8).unwrap_err();
        assert!(matches!(err, PipelineError::AttributeTypeMismatch { .. }));
    }

    struct Constant;

    #[async_trait]
    impl Handler<Echo> for Constant {
        async fn handle(&self, _message: Echo) -> HandlerResult<String> {
            Ok("pong".into())
        }
    }

    #[tokio::test]
    async fn wrapped_link_is_initialised_from_typed_payload() {
        let decl = DecoratorDeclaration::<Echo>::new::<Prefix>(
            0,
            PrefixConfig {
                prefix: "> ".into(),
            },
        );
        let deps = crate::dependency::Dependencies::new();
        let mut link = decl.wrap(Box::new(Constant), &deps).unwrap();
        let config = decl.decode().unwrap();
        link.as_initialisable()
            .unwrap()
            .initialise_erased("Prefix", config.as_ref())
            .unwrap();
        assert_eq!(link.handle(Echo).await.unwrap(), "> pong");
    }
}
