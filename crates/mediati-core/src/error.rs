//! Unified error types for the Mediati engine.
//!
//! Errors are split by the phase in which they can occur:
//!
//! - [`PipelineError`]: building a single handler chain (startup).
//! - [`RegistrationError`] / [`StartupError`]: discovering and registering
//!   handlers (startup).
//! - [`DispatchError`]: resolving and invoking a chain (request time).
//!
//! Decorator-specific errors (timeouts, validation) live in `mediati-framework`.

use thiserror::Error;

use crate::capability::Capability;

/// A type-erased error raised by a handler or decorator.
///
/// Handlers return this so the original error can be carried to the caller
/// unchanged as the `source` of [`DispatchError::HandlerExecutionFailed`].
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

// =============================================================================
// Pipeline Errors
// =============================================================================

/// Errors that can occur while building a handler chain.
#[derive(Debug, Clone, Error)]
pub enum PipelineError {
    /// A link asked the dependency source for a type it does not provide.
    #[error("dependency not found: {requested}")]
    DependencyNotFound {
        /// Type name of the requested dependency.
        requested: &'static str,
    },

    /// A declaration's payload does not match its template's configuration type.
    #[error("decorator '{template}' expects configuration of type {expected}: {reason}")]
    AttributeTypeMismatch {
        /// Template name.
        template: &'static str,
        /// Type name of the template's configuration.
        expected: &'static str,
        /// What went wrong while decoding the payload.
        reason: String,
    },

    /// The same decorator template was declared more than once on one handler.
    #[error("decorator '{template}' is declared {count} times")]
    AmbiguousDecorator {
        /// Template name.
        template: &'static str,
        /// Number of matching declarations.
        count: usize,
    },
}

impl PipelineError {
    /// Creates a dependency-not-found error for `T`.
    pub fn dependency_not_found<T: ?Sized>() -> Self {
        Self::DependencyNotFound {
            requested: std::any::type_name::<T>(),
        }
    }
}

// =============================================================================
// Registration Errors
// =============================================================================

/// Errors raised while registering handlers.
///
/// Handler failures name the offending type by its full path. Override
/// failures name the configuration key instead.
#[derive(Debug, Clone, Error)]
pub enum RegistrationError {
    /// A handler type implements more than one message-handling capability.
    #[error("handler {handler} implements {} capabilities: {}", .capabilities.len(), join(.capabilities))]
    MultipleCapabilities {
        /// Handler type name.
        handler: &'static str,
        /// All capabilities declared by the handler.
        capabilities: Vec<Capability>,
    },

    /// A second handler was registered for an already bound capability.
    #[error("capability {capability} is already handled by {existing}, rejected {handler}")]
    DuplicateCapability {
        /// The contested capability.
        capability: Capability,
        /// Handler that owns the capability.
        existing: &'static str,
        /// Handler whose registration was rejected.
        handler: &'static str,
    },

    /// The handler's chain could not be built.
    #[error("failed to build pipeline for {handler} ({capability}): {source}")]
    Pipeline {
        /// Handler type name.
        handler: &'static str,
        /// Capability being built.
        capability: Capability,
        /// Underlying builder error.
        #[source]
        source: PipelineError,
    },

    /// A configuration override names no discovered handler.
    #[error("override '{key}' matches no handler")]
    UnknownOverride {
        /// Handler key as written in configuration.
        key: String,
    },

    /// A bare-name override matches several handlers.
    #[error("override '{key}' matches several handlers: {}", .handlers.join(", "))]
    AmbiguousOverride {
        /// Handler key as written in configuration.
        key: String,
        /// Paths of every matching handler.
        handlers: Vec<&'static str>,
    },
}

impl RegistrationError {
    /// Returns the handler type this error is attributed to.
    ///
    /// Override errors are not attributed to a single handler.
    pub fn handler(&self) -> Option<&'static str> {
        match self {
            Self::MultipleCapabilities { handler, .. }
            | Self::DuplicateCapability { handler, .. }
            | Self::Pipeline { handler, .. } => Some(*handler),
            Self::UnknownOverride { .. } | Self::AmbiguousOverride { .. } => None,
        }
    }
}

/// Aggregate failure of the startup registration pass.
#[derive(Debug, Clone, Error)]
#[error("{} handler registration(s) failed: {}", .failures.len(), join(.failures))]
pub struct StartupError {
    /// Every handler that failed to register, in discovery order.
    pub failures: Vec<RegistrationError>,
}

// =============================================================================
// Dispatch Errors
// =============================================================================

/// Errors that can occur while dispatching a message.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// No chain is registered for the message's capability.
    #[error("no handler registered for {capability}")]
    HandlerNotRegistered {
        /// Capability computed from the message.
        capability: Capability,
    },

    /// The chain raised an error that no decorator suppressed.
    #[error("handler for {capability} failed: {source}")]
    HandlerExecutionFailed {
        /// Capability of the failing chain.
        capability: Capability,
        /// The original error raised inside the chain.
        #[source]
        source: BoxError,
    },

    /// A fresh chain could not be constructed for this call.
    #[error("failed to construct chain for {capability}: {source}")]
    ChainConstruction {
        /// Capability of the chain.
        capability: Capability,
        /// Underlying builder error.
        #[source]
        source: PipelineError,
    },

    /// The chain produced a value of an unexpected type.
    #[error("chain for {capability} returned an unexpected result type")]
    ResultTypeMismatch {
        /// Capability of the chain.
        capability: Capability,
    },
}

impl DispatchError {
    /// Returns the capability this error was raised for.
    pub fn capability(&self) -> &Capability {
        match self {
            Self::HandlerNotRegistered { capability }
            | Self::HandlerExecutionFailed { capability, .. }
            | Self::ChainConstruction { capability, .. }
            | Self::ResultTypeMismatch { capability } => capability,
        }
    }

    /// Returns `true` if no handler was registered for the message.
    pub fn is_not_registered(&self) -> bool {
        matches!(self, Self::HandlerNotRegistered { .. })
    }

    /// Returns the original handler error, if this is an execution failure.
    pub fn handler_error(&self) -> Option<&(dyn std::error::Error + Send + Sync + 'static)> {
        match self {
            Self::HandlerExecutionFailed { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }
}

fn join<T: std::fmt::Display>(items: &[T]) -> String {
    items
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for pipeline construction.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Result type for handler registration.
pub type RegistrationResult<T> = Result<T, RegistrationError>;

/// Result type for dispatch.
pub type DispatchResult<T> = Result<T, DispatchError>;

/// Result type returned by handlers and decorators.
pub type HandlerResult<T> = Result<T, BoxError>;
