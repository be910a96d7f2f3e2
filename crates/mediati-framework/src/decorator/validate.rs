//! `Validate`: rejects messages before they reach the handler.
//!
//! The validator for `M` is resolved from the dependency source as
//! `Arc<dyn Validator<M>>`, so a handler declaring `Validate` fails to register
//! when no validator was provided.

use std::sync::Arc;

use async_trait::async_trait;
use mediati_core::{
    BoxedHandler, Decorate, DecoratorTemplate, Handler, HandlerResult, Link, Message,
    PipelineResult, Resolve, ResolveExt, TemplateKey,
};
use tracing::debug;

use crate::error::ValidationResult;

/// Checks a message before it is handled.
pub trait Validator<M>: Send + Sync + 'static {
    /// Returns an error if `message` must not be handled.
    fn validate(&self, message: &M) -> ValidationResult;
}

impl<M, F> Validator<M> for F
where
    F: Fn(&M) -> ValidationResult + Send + Sync + 'static,
{
    fn validate(&self, message: &M) -> ValidationResult {
        self(message)
    }
}

/// Decorator template that runs the registered [`Validator`].
pub struct Validate;

impl DecoratorTemplate for Validate {
    const NAME: &'static str = "Validate";
    type Config = ();
}

impl<M: Message> Decorate<M> for Validate {
    type Link = ValidateLink<M>;

    fn decorate(next: BoxedHandler<M>, deps: &dyn Resolve) -> PipelineResult<Self::Link> {
        Ok(ValidateLink {
            next,
            validator: deps.require::<dyn Validator<M>>()?,
        })
    }
}

/// Link built by [`Validate`].
pub struct ValidateLink<M: Message> {
    next: BoxedHandler<M>,
    validator: Arc<dyn Validator<M>>,
}

#[async_trait]
impl<M: Message> Handler<M> for ValidateLink<M> {
    async fn handle(&self, message: M) -> HandlerResult<M::Output> {
        if let Err(e) = self.validator.validate(&message) {
            debug!(message_type = std::any::type_name::<M>(), error = %e, "Rejected message");
            return Err(e.into());
        }
        self.next.handle(message).await
    }
}

impl<M: Message> Link<M> for ValidateLink<M> {
    fn declaring_template(&self) -> Option<TemplateKey> {
        Some(TemplateKey::of::<Validate>())
    }
}

#[cfg(test)]
mod tests {
    use mediati_core::{DecoratorDeclaration, Dependencies, PipelineError, build};

    use super::*;
    use crate::error::ValidationError;
    use crate::testing::{Echo, EchoHandler};

    fn not_empty(message: &Echo) -> ValidationResult {
        if message.0.is_empty() {
            Err(ValidationError::field("0", "must not be empty"))
        } else {
            Ok(())
        }
    }

    fn chain() -> BoxedHandler<Echo> {
        let deps = Dependencies::new().with::<dyn Validator<Echo>>(Arc::new(not_empty));
        let factory = build::<EchoHandler, Echo>(
            "EchoHandler",
            vec![DecoratorDeclaration::new::<Validate>(0, ())],
            Arc::new(deps),
        )
        .unwrap();
        factory().unwrap()
    }

    #[tokio::test]
    async fn valid_message_reaches_handler() {
        assert_eq!(chain().handle(Echo("ok".into())).await.unwrap(), "ok");
    }

    #[tokio::test]
    async fn invalid_message_is_rejected() {
        let err = chain().handle(Echo(String::new())).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ValidationError>(),
            Some(ValidationError::Field { field: "0", .. })
        ));
    }

    #[test]
    fn missing_validator_fails_the_build() {
        let result = build::<EchoHandler, Echo>(
            "EchoHandler",
            vec![DecoratorDeclaration::new::<Validate>(0, ())],
            Arc::new(Dependencies::new()),
        );
        assert!(matches!(
            result.err(),
            Some(PipelineError::DependencyNotFound { requested }) if requested.contains("Validator")
        ));
    }
}
