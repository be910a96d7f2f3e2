//! Mediati Runtime - configuration, logging and startup for the Mediati mediator.
//!
//! This crate provides:
//! - Layered configuration (`MediatiConfig`, `ConfigLoader`)
//! - Logging setup driven by that configuration (`LoggingBuilder`)
//! - The startup pass that turns registered handlers into a `Mediator`
//!   (`MediatiRuntime`)
//!
//! ```ignore
//! use mediati_runtime::MediatiRuntime;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let runtime = MediatiRuntime::new();
//!     runtime.provide::<dyn UserRepository>(Arc::new(InMemoryUsers::default()))?;
//!
//!     let mediator = runtime.start()?;
//!     mediator.send(CreateUser { name: "ada".into() }).await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod runtime;

pub use config::{ConfigError, ConfigLoader, ConfigResult, MediatiConfig, PipelineConfig};
pub use error::{RuntimeError, RuntimeResult};
pub use logging::{LoggingBuilder, LoggingError, SpanEvents};
pub use runtime::{MediatiRuntime, RuntimeBuilder};

pub use tracing;
pub use tracing_subscriber;

/// Logging macros for handler code.
pub mod prelude {
    pub use tracing::{Level, debug, error, info, instrument, span, trace, warn};
}
