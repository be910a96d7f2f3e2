//! Configuration schema definitions.
//!
//! ```toml
//! [logging]
//! level = "debug"
//! format = "pretty"
//!
//! [pipeline]
//! lifetime = "transient"
//! on_error = "abort"
//!
//! [handlers.CreateUserHandler.decorators.WrapError]
//! order = 5
//! config = { rethrow = true }
//! ```

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use mediati_core::{ChainLifetime, DecoratorOverrides, StartupPolicy};
use serde::{Deserialize, Serialize};

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MediatiConfig {
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Pipeline construction settings.
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Per-handler decorator overrides, keyed by handler name.
    #[serde(default)]
    pub handlers: DecoratorOverrides,
}

// =============================================================================
// Pipeline
// =============================================================================

/// Pipeline construction settings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Whether chains are rebuilt per dispatch or shared.
    #[serde(default)]
    pub lifetime: ChainLifetime,

    /// What to do when a handler fails to register.
    #[serde(default)]
    pub on_error: StartupPolicy,
}

// =============================================================================
// Logging
// =============================================================================

/// Log verbosity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Returns the lowercase name of the level.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }

    /// Converts to a `tracing` level.
    pub fn to_tracing_level(self) -> tracing::Level {
        match self {
            Self::Trace => tracing::Level::TRACE,
            Self::Debug => tracing::Level::DEBUG,
            Self::Info => tracing::Level::INFO,
            Self::Warn => tracing::Level::WARN,
            Self::Error => tracing::Level::ERROR,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "trace" => Ok(Self::Trace),
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" | "warning" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            other => Err(format!("unknown log level '{other}'")),
        }
    }
}

/// Log line format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Full,
    Pretty,
    #[cfg(feature = "json-log")]
    Json,
}

/// Log destination.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    #[default]
    Stdout,
    Stderr,
    File,
}

/// When a log file is rolled over.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogRotation {
    #[default]
    Never,
    Hourly,
    Daily,
}

/// Which span lifecycle events are logged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpanEventConfig {
    pub new: bool,
    pub enter: bool,
    pub exit: bool,
    pub close: bool,
}

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Base log level.
    pub level: LogLevel,

    /// Line format.
    pub format: LogFormat,

    /// Destination.
    pub output: LogOutput,

    /// Log file, required when `output = "file"`.
    pub file_path: Option<PathBuf>,

    /// File rotation schedule.
    pub rotation: LogRotation,

    /// Rotated files to keep; `0` keeps all.
    pub max_files: usize,

    /// Include thread ids.
    pub thread_ids: bool,

    /// Include source file and line.
    pub file_location: bool,

    /// Span lifecycle events.
    pub span_events: SpanEventConfig,

    /// Per-target level overrides, e.g. `mediati_core = "debug"`.
    pub filters: HashMap<String, LogLevel>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            format: LogFormat::Compact,
            output: LogOutput::Stdout,
            file_path: None,
            rotation: LogRotation::Never,
            max_files: 5,
            thread_ids: false,
            file_location: false,
            span_events: SpanEventConfig::default(),
            filters: HashMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_transient_and_abort() {
        let config = MediatiConfig::default();
        assert_eq!(config.pipeline.lifetime, ChainLifetime::Transient);
        assert_eq!(config.pipeline.on_error, StartupPolicy::Abort);
        assert!(config.handlers.is_empty());
        assert_eq!(config.logging.level, LogLevel::Info);
    }

    #[test]
    fn deserializes_nested_overrides() {
        let config: MediatiConfig = serde_json::from_value(serde_json::json!({
            "pipeline": { "lifetime": "shared", "on_error": "skip" },
            "handlers": {
                "CreateUserHandler": {
                    "decorators": { "WrapError": { "order": 5, "config": { "rethrow": true } } }
                }
            }
        }))
        .unwrap();

        assert_eq!(config.pipeline.lifetime, ChainLifetime::Shared);
        assert_eq!(config.pipeline.on_error, StartupPolicy::Skip);
        let wrap = config.handlers.get("CreateUserHandler", "WrapError").unwrap();
        assert_eq!(wrap.order, Some(5));
        assert_eq!(wrap.config, Some(serde_json::json!({ "rethrow": true })));
    }

    #[test]
    fn log_level_parses_aliases() {
        assert_eq!("WARNING".parse::<LogLevel>().unwrap(), LogLevel::Warn);
        assert!("loud".parse::<LogLevel>().is_err());
    }
}
