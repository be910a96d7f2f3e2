//! Configuration for the Mediati runtime.
//!
//! Settings come from built-in defaults, `mediati.toml`/`mediati.yaml` files
//! and `MEDIATI_*` environment variables, layered by [`ConfigLoader`].

pub mod error;
pub mod loader;
pub mod schema;
pub mod validation;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigLoader, Profile, load_config, load_config_from_file};
pub use schema::{
    LogFormat, LogLevel, LogOutput, LogRotation, LoggingConfig, MediatiConfig, PipelineConfig,
    SpanEventConfig,
};
pub use validation::validate_config;
