//! Built-in decorator templates.
//!
//! | Template | Config | Effect |
//! |----------|--------|--------|
//! | [`WrapError`] | [`WrapErrorConfig`] | Suppress handler errors into the default output |
//! | [`Trace`] | [`TraceConfig`] | Span and timing around the rest of the chain |
//! | [`Timeout`] | [`TimeoutConfig`] | Cancel the rest of the chain after a limit |
//! | [`Validate`] | `()` | Run the `Validator<M>` resolved from dependencies |

mod timeout;
mod trace;
mod validate;
mod wrap_error;

pub use timeout::{Timeout, TimeoutConfig, TimeoutLink};
pub use trace::{Trace, TraceConfig, TraceLink};
pub use validate::{Validate, ValidateLink, Validator};
pub use wrap_error::{WrapError, WrapErrorConfig, WrapErrorLink};
