//! Tower integration.
//!
//! [`MediatorService<M>`] exposes dispatch of one message type as a
//! `tower::Service<M>`, so the mediator can sit behind any tower stack
//! (buffering, rate limiting, load shedding) or inside a server framework.

use std::marker::PhantomData;
use std::task::{Context, Poll};

use futures::FutureExt;
use futures::future::BoxFuture;
use mediati_core::{DispatchError, DispatchResult, Mediator, Message};
use tower::Service;

/// A tower [`Service`] that dispatches `M` through a [`Mediator`].
///
/// # Example
///
/// ```rust,ignore
/// use tower::ServiceExt;
///
/// let svc = MediatorService::<GetUser>::new(mediator.clone());
/// let user = svc.oneshot(GetUser { id: 7 }).await?;
/// ```
pub struct MediatorService<M> {
    mediator: Mediator,
    _message: PhantomData<fn(M)>,
}

impl<M> MediatorService<M> {
    /// Wraps `mediator` as a service for `M`.
    pub fn new(mediator: Mediator) -> Self {
        Self {
            mediator,
            _message: PhantomData,
        }
    }

    /// The underlying mediator.
    pub fn mediator(&self) -> &Mediator {
        &self.mediator
    }
}

impl<M> Clone for MediatorService<M> {
    fn clone(&self) -> Self {
        Self::new(self.mediator.clone())
    }
}

impl<M> From<Mediator> for MediatorService<M> {
    fn from(mediator: Mediator) -> Self {
        Self::new(mediator)
    }
}

impl<M: Message> Service<M> for MediatorService<M> {
    type Response = M::Output;
    type Error = DispatchError;
    type Future = BoxFuture<'static, DispatchResult<M::Output>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, message: M) -> Self::Future {
        let mediator = self.mediator.clone();
        async move { mediator.dispatch(message).await }.boxed()
    }
}
