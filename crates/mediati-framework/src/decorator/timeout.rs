//! `Timeout`: bounds how long the rest of the chain may run.

use std::marker::PhantomData;
use std::time::Duration;

use async_trait::async_trait;
use mediati_core::{
    AttributeInitialised, BoxedHandler, Decorate, DecoratorTemplate, ErasedInitialise, Handler,
    HandlerResult, Link, Message, PipelineResult, Resolve, TemplateKey,
};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::TimeoutError;

/// Decorator template that cancels slow chains.
pub struct Timeout;

/// Configuration of [`Timeout`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Limit in milliseconds.
    pub millis: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { millis: 30_000 }
    }
}

impl DecoratorTemplate for Timeout {
    const NAME: &'static str = "Timeout";
    type Config = TimeoutConfig;
}

impl<M: Message> Decorate<M> for Timeout {
    type Link = TimeoutLink<M>;

    fn decorate(next: BoxedHandler<M>, _deps: &dyn Resolve) -> PipelineResult<Self::Link> {
        Ok(TimeoutLink {
            next,
            limit: Duration::from_millis(TimeoutConfig::default().millis),
            _message: PhantomData,
        })
    }
}

/// Link built by [`Timeout`].
pub struct TimeoutLink<M: Message> {
    next: BoxedHandler<M>,
    limit: Duration,
    _message: PhantomData<fn() -> M>,
}

#[async_trait]
impl<M: Message> Handler<M> for TimeoutLink<M> {
    async fn handle(&self, message: M) -> HandlerResult<M::Output> {
        match tokio::time::timeout(self.limit, self.next.handle(message)).await {
            Ok(result) => result,
            Err(_) => {
                let error = TimeoutError {
                    message: std::any::type_name::<M>(),
                    elapsed: self.limit,
                };
                warn!(%error, "Handler timed out");
                Err(error.into())
            }
        }
    }
}

impl<M: Message> Link<M> for TimeoutLink<M> {
    fn declaring_template(&self) -> Option<TemplateKey> {
        Some(TemplateKey::of::<Timeout>())
    }

    fn as_initialisable(&mut self) -> Option<&mut dyn ErasedInitialise> {
        Some(self)
    }
}

impl<M: Message> AttributeInitialised for TimeoutLink<M> {
    type Config = TimeoutConfig;

    fn initialise_from_attribute(&mut self, config: &TimeoutConfig) {
        self.limit = Duration::from_millis(config.millis);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use mediati_core::{DecoratorDeclaration, Dependencies, build};

    use super::*;
    use crate::testing::{Sleep, SleepHandler};

    fn chain(millis: u64) -> BoxedHandler<Sleep> {
        let factory = build::<SleepHandler, Sleep>(
            "SleepHandler",
            vec![DecoratorDeclaration::new::<Timeout>(0, TimeoutConfig { millis })],
            Arc::new(Dependencies::new()),
        )
        .unwrap();
        factory().unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn slow_chain_times_out() {
        let err = chain(10).handle(Sleep(1_000)).await.unwrap_err();
        let timeout = err.downcast_ref::<TimeoutError>().unwrap();
        assert_eq!(timeout.elapsed, Duration::from_millis(10));
    }

    #[tokio::test(start_paused = true)]
    async fn fast_chain_completes() {
        assert_eq!(chain(1_000).handle(Sleep(10)).await.unwrap(), 10);
    }

    #[test]
    fn raw_config_is_decoded() {
        let config: TimeoutConfig = serde_json::from_value(serde_json::json!({ "millis": 250 })).unwrap();
        assert_eq!(config.millis, 250);
    }
}
