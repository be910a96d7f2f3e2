//! Error types raised by the built-in decorators.
//!
//! Both errors travel through the chain as the handler error, so callers
//! receive them as the `source` of
//! [`DispatchError::HandlerExecutionFailed`](mediati_core::DispatchError::HandlerExecutionFailed)
//! and can downcast to them.

use std::time::Duration;

use thiserror::Error;

/// Returned by the `Timeout` decorator when the inner chain is too slow.
#[derive(Debug, Clone, Error)]
#[error("{message} did not complete within {elapsed:?}")]
pub struct TimeoutError {
    /// Message type name.
    pub message: &'static str,
    /// Configured limit.
    pub elapsed: Duration,
}

/// Returned by the `Validate` decorator when a message is rejected.
#[derive(Debug, Clone, Error)]
pub enum ValidationError {
    /// A single field failed validation.
    #[error("invalid field '{field}': {reason}")]
    Field {
        /// Field name.
        field: &'static str,
        /// Why the value was rejected.
        reason: String,
    },

    /// The message as a whole was rejected.
    #[error("invalid message: {0}")]
    Message(String),
}

impl ValidationError {
    /// Creates a field error.
    pub fn field(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Field {
            field,
            reason: reason.into(),
        }
    }

    /// Creates a message-level error.
    pub fn message(reason: impl Into<String>) -> Self {
        Self::Message(reason.into())
    }
}

/// Result type for validators.
pub type ValidationResult = Result<(), ValidationError>;
