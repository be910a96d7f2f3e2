//! Handler traits.
//!
//! A [`Handler<M>`] answers messages of type `M`. Concrete handler types are
//! discovered through the [`HANDLERS`](crate::HANDLERS) registry and built
//! with [`Construct`], which is what separates them from decorator links: a
//! link can only be built around an existing `next` handler, so it can never
//! be registered on its own.

use async_trait::async_trait;

use crate::dependency::Resolve;
use crate::error::{HandlerResult, PipelineResult};
use crate::message::Message;

/// Answers messages of type `M`.
///
/// Implemented by application handlers and by every decorator link. A chain
/// is itself a `Handler<M>`: the outermost link forwards to its `next` until
/// the innermost handler is reached.
#[async_trait]
pub trait Handler<M: Message>: Send + Sync + 'static {
    /// Handles one message.
    async fn handle(&self, message: M) -> HandlerResult<M::Output>;
}

/// An owned, type-erased handler.
pub type BoxedHandler<M> = Box<dyn Handler<M>>;

#[async_trait]
impl<M: Message> Handler<M> for BoxedHandler<M> {
    async fn handle(&self, message: M) -> HandlerResult<M::Output> {
        (**self).handle(message).await
    }
}

/// Builds a concrete handler from the dependency source.
///
/// `#[handler(..., construct = default)]` derives this from [`Default`].
pub trait Construct: Sized {
    /// Creates the handler, resolving any dependencies it needs.
    fn construct(deps: &dyn Resolve) -> PipelineResult<Self>;
}
