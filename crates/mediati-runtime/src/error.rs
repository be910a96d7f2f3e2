//! Runtime error types.

use mediati_core::StartupError;
use thiserror::Error;

use crate::config::ConfigError;

/// Errors that can occur during runtime operations.
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Configuration could not be loaded or is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Handler registration failed.
    #[error(transparent)]
    Startup(#[from] StartupError),

    /// `start` was already called on this runtime.
    #[error("Runtime already started")]
    AlreadyStarted,

    /// The mediator was requested before `start`.
    #[error("Runtime not started")]
    NotStarted,
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
