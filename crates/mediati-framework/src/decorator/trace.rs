//! `Trace`: wraps the rest of the chain in a tracing span and logs timing.

use std::marker::PhantomData;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use mediati_core::{
    AttributeInitialised, BoxedHandler, Decorate, DecoratorTemplate, ErasedInitialise, Handler,
    HandlerResult, Link, Message, PipelineResult, Resolve, TemplateKey,
};
use serde::{Deserialize, Serialize};
use tracing::{Instrument, debug, info_span, warn};

/// Decorator template that traces the chain below it.
pub struct Trace;

/// Configuration of [`Trace`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TraceConfig {
    /// Calls slower than this many milliseconds are logged at `warn`.
    pub slow_ms: Option<u64>,
}

impl DecoratorTemplate for Trace {
    const NAME: &'static str = "Trace";
    type Config = TraceConfig;
}

impl<M: Message> Decorate<M> for Trace {
    type Link = TraceLink<M>;

    fn decorate(next: BoxedHandler<M>, _deps: &dyn Resolve) -> PipelineResult<Self::Link> {
        Ok(TraceLink {
            next,
            slow: None,
            _message: PhantomData,
        })
    }
}

/// Link built by [`Trace`].
pub struct TraceLink<M: Message> {
    next: BoxedHandler<M>,
    slow: Option<Duration>,
    _message: PhantomData<fn() -> M>,
}

#[async_trait]
impl<M: Message> Handler<M> for TraceLink<M> {
    async fn handle(&self, message: M) -> HandlerResult<M::Output> {
        let name = std::any::type_name::<M>();
        let span = info_span!("handle", message_type = name, role = %M::ROLE);
        let started = Instant::now();

        let result = self.next.handle(message).instrument(span.clone()).await;

        let elapsed = started.elapsed();
        span.in_scope(|| {
            match &result {
                Ok(_) => debug!(?elapsed, "Handled"),
                Err(e) => debug!(?elapsed, error = %e, "Handler returned an error"),
            }
            if let Some(limit) = self.slow
                && elapsed > limit
            {
                warn!(?elapsed, ?limit, "Slow handler");
            }
        });

        result
    }
}

impl<M: Message> Link<M> for TraceLink<M> {
    fn declaring_template(&self) -> Option<TemplateKey> {
        Some(TemplateKey::of::<Trace>())
    }

    fn as_initialisable(&mut self) -> Option<&mut dyn ErasedInitialise> {
        Some(self)
    }
}

impl<M: Message> AttributeInitialised for TraceLink<M> {
    type Config = TraceConfig;

    fn initialise_from_attribute(&mut self, config: &TraceConfig) {
        self.slow = config.slow_ms.map(Duration::from_millis);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use mediati_core::{DecoratorDeclaration, Dependencies, build};

    use super::*;
    use crate::testing::{Echo, EchoHandler, Failing, FailingHandler};

    #[tokio::test]
    async fn passes_results_through() {
        let factory = build::<EchoHandler, Echo>(
            "EchoHandler",
            vec![DecoratorDeclaration::new::<Trace>(0, TraceConfig { slow_ms: Some(0) })],
            Arc::new(Dependencies::new()),
        )
        .unwrap();
        let chain = factory().unwrap();
        assert_eq!(chain.handle(Echo("hi".into())).await.unwrap(), "hi");
    }

    #[tokio::test]
    async fn passes_errors_through() {
        let factory = build::<FailingHandler, Failing>(
            "FailingHandler",
            vec![DecoratorDeclaration::new::<Trace>(0, TraceConfig::default())],
            Arc::new(Dependencies::new()),
        )
        .unwrap();
        assert!(factory().unwrap().handle(Failing).await.is_err());
    }
}
