//! `WrapError`: turns handler failures into the default output.
//!
//! With `rethrow = false` an error raised further in the chain is logged at
//! `warn` level and the message's default output is returned instead. With
//! `rethrow = true` the original error is passed on unchanged.

use std::marker::PhantomData;

use async_trait::async_trait;
use mediati_core::{
    AttributeInitialised, BoxedHandler, Decorate, DecoratorTemplate, ErasedInitialise, Handler,
    HandlerResult, Link, Message, PipelineResult, Resolve, TemplateKey,
};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Decorator template that suppresses handler errors.
pub struct WrapError;

/// Configuration of [`WrapError`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WrapErrorConfig {
    /// Pass errors on instead of suppressing them.
    pub rethrow: bool,
}

impl DecoratorTemplate for WrapError {
    const NAME: &'static str = "WrapError";
    type Config = WrapErrorConfig;
}

impl<M> Decorate<M> for WrapError
where
    M: Message,
    M::Output: Default,
{
    type Link = WrapErrorLink<M>;

    fn decorate(next: BoxedHandler<M>, _deps: &dyn Resolve) -> PipelineResult<Self::Link> {
        Ok(WrapErrorLink {
            next,
            rethrow: false,
            _message: PhantomData,
        })
    }
}

/// Link built by [`WrapError`].
pub struct WrapErrorLink<M: Message> {
    next: BoxedHandler<M>,
    rethrow: bool,
    _message: PhantomData<fn() -> M>,
}

#[async_trait]
impl<M> Handler<M> for WrapErrorLink<M>
where
    M: Message,
    M::Output: Default,
{
    async fn handle(&self, message: M) -> HandlerResult<M::Output> {
        match self.next.handle(message).await {
            Ok(output) => Ok(output),
            Err(e) if self.rethrow => Err(e),
            Err(e) => {
                warn!(
                    message_type = std::any::type_name::<M>(),
                    error = %e,
                    "Suppressed handler error, returning default output"
                );
                Ok(M::Output::default())
            }
        }
    }
}

impl<M> Link<M> for WrapErrorLink<M>
where
    M: Message,
    M::Output: Default,
{
    fn declaring_template(&self) -> Option<TemplateKey> {
        Some(TemplateKey::of::<WrapError>())
    }

    fn as_initialisable(&mut self) -> Option<&mut dyn ErasedInitialise> {
        Some(self)
    }
}

impl<M: Message> AttributeInitialised for WrapErrorLink<M> {
    type Config = WrapErrorConfig;

    fn initialise_from_attribute(&mut self, config: &WrapErrorConfig) {
        self.rethrow = config.rethrow;
    }
}
