//! # Mediati Framework
//!
//! Ready-made building blocks on top of `mediati-core`:
//!
//! - **Decorators** ([`decorator`]): `WrapError`, `Trace`, `Timeout` and
//!   `Validate` templates for `#[decorate(...)]`.
//! - **Tower integration** ([`MediatorService`]): dispatch as a
//!   `tower::Service`.
//! - **Errors** ([`TimeoutError`], [`ValidationError`]): raised by the
//!   decorators and surfaced to callers as handler errors.
//!
//! ```rust,ignore
//! use mediati::prelude::*;
//! use mediati::framework::{Timeout, TimeoutConfig, Trace};
//!
//! #[handler(GetUser)]
//! #[decorate(Trace)]
//! #[decorate(Timeout, order = 10, config = TimeoutConfig { millis: 500 })]
//! pub struct GetUserHandler {
//!     repo: Arc<dyn UserRepository>,
//! }
//! ```

pub mod decorator;
pub mod error;
pub mod service;

#[cfg(test)]
mod testing;

pub use decorator::{
    Timeout, TimeoutConfig, TimeoutLink, Trace, TraceConfig, TraceLink, Validate, ValidateLink,
    Validator, WrapError, WrapErrorConfig, WrapErrorLink,
};
pub use error::{TimeoutError, ValidationError, ValidationResult};
pub use service::MediatorService;
