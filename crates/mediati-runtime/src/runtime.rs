//! Startup orchestration.
//!
//! [`MediatiRuntime`] owns the configuration and the dependency source,
//! runs the registration pass exactly once and publishes the resulting
//! [`Mediator`].
//!
//! ```rust,ignore
//! use mediati_runtime::MediatiRuntime;
//!
//! let runtime = MediatiRuntime::builder()
//!     .config_file("config/mediati.toml")
//!     .build()?;
//! runtime.provide::<dyn UserRepository>(Arc::new(PgUsers::new(pool)))?;
//!
//! let mediator = runtime.start()?;
//! let user = mediator.query(GetUser { id: 7 }).await?;
//! ```

use std::path::Path;
use std::sync::{Arc, OnceLock};

use mediati_core::{
    Dependencies, HandlerEntry, Mediator, MediatorStats, RegistrationOptions, collect_handlers,
    register_all,
};
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::config::{ConfigLoader, MediatiConfig};
use crate::error::{RuntimeError, RuntimeResult};
use crate::logging;

#[derive(Default)]
struct State {
    dependencies: Dependencies,
    started: bool,
}

/// Owns configuration and dependencies, and builds the [`Mediator`] once.
pub struct MediatiRuntime {
    config: MediatiConfig,
    state: Mutex<State>,
    mediator: OnceLock<Mediator>,
}

impl MediatiRuntime {
    /// Creates a runtime from the default configuration locations.
    ///
    /// If loading fails the error is reported on stderr and defaults are used.
    pub fn new() -> Self {
        let config = ConfigLoader::new().load().unwrap_or_else(|e| {
            eprintln!("mediati: failed to load config ({e}), using defaults");
            MediatiConfig::default()
        });
        Self::from_config(&config)
    }

    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::new()
    }

    /// Creates a runtime from `config` and installs its logging setup.
    pub fn from_config(config: &MediatiConfig) -> Self {
        logging::init_from_config(&config.logging);
        Self::with_config(config.clone())
    }

    /// Creates a runtime from `config` without touching the global subscriber.
    pub fn with_config(config: MediatiConfig) -> Self {
        info!(
            log_level = %config.logging.level,
            lifetime = ?config.pipeline.lifetime,
            on_error = ?config.pipeline.on_error,
            overrides = config.handlers.iter().count(),
            "Runtime initialized from configuration"
        );
        Self {
            config,
            state: Mutex::new(State::default()),
            mediator: OnceLock::new(),
        }
    }

    pub fn config(&self) -> &MediatiConfig {
        &self.config
    }

    /// Registers a service handlers and decorators can resolve.
    ///
    /// Must be called before [`start`](Self::start); a later call fails with
    /// [`RuntimeError::AlreadyStarted`].
    pub fn provide<T: ?Sized + Send + Sync + 'static>(&self, service: Arc<T>) -> RuntimeResult<()> {
        let mut state = self.state.lock();
        if state.started {
            return Err(RuntimeError::AlreadyStarted);
        }
        state.dependencies.insert(service);
        debug!(service = std::any::type_name::<T>(), "Service provided");
        Ok(())
    }

    /// Registers every handler in the link-time registry and publishes the mediator.
    pub fn start(&self) -> RuntimeResult<Mediator> {
        self.start_with(&collect_handlers())
    }

    /// Registers `candidates` and publishes the mediator.
    ///
    /// Runs at most once per runtime, whether or not registration succeeds.
    pub fn start_with(&self, candidates: &[HandlerEntry]) -> RuntimeResult<Mediator> {
        let dependencies = {
            let mut state = self.state.lock();
            if state.started {
                return Err(RuntimeError::AlreadyStarted);
            }
            state.started = true;
            state.dependencies.clone()
        };

        let options = RegistrationOptions::new()
            .dependencies(dependencies)
            .overrides(self.config.handlers.clone())
            .lifetime(self.config.pipeline.lifetime)
            .policy(self.config.pipeline.on_error);

        let table = register_all(candidates, &options)?;
        info!(
            handlers = table.len(),
            skipped = table.skipped().len(),
            "Mediator ready"
        );

        let mediator = self.mediator.get_or_init(|| Mediator::new(table)).clone();
        Ok(mediator)
    }

    /// Returns the mediator published by [`start`](Self::start).
    pub fn mediator(&self) -> RuntimeResult<Mediator> {
        self.mediator.get().cloned().ok_or(RuntimeError::NotStarted)
    }

    /// Returns `true` once `start` has been called.
    pub fn is_started(&self) -> bool {
        self.state.lock().started
    }

    /// Dispatch counters, once started.
    pub fn stats(&self) -> Option<MediatorStats> {
        self.mediator.get().map(Mediator::stats)
    }
}

impl Default for MediatiRuntime {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// RuntimeBuilder
// =============================================================================

/// Builder for a [`MediatiRuntime`] with custom configuration sources.
pub struct RuntimeBuilder {
    config_loader: ConfigLoader,
    init_logging: bool,
}

impl RuntimeBuilder {
    pub fn new() -> Self {
        Self {
            config_loader: ConfigLoader::new(),
            init_logging: true,
        }
    }

    /// Loads exactly this configuration file.
    pub fn config_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.file(path);
        self
    }

    /// Sets the configuration profile (e.g. `development`, `production`).
    pub fn profile(mut self, profile: impl AsRef<str>) -> Self {
        self.config_loader = self.config_loader.profile(profile);
        self
    }

    pub fn search_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.search_path(path);
        self
    }

    pub fn with_env(mut self) -> Self {
        self.config_loader = self.config_loader.with_env();
        self
    }

    pub fn without_env(mut self) -> Self {
        self.config_loader = self.config_loader.without_env();
        self
    }

    /// Merges a programmatic configuration under the file and environment sources.
    pub fn merge(mut self, config: MediatiConfig) -> Self {
        self.config_loader = self.config_loader.merge(config);
        self
    }

    /// Leaves the global subscriber alone; the host sets up logging itself.
    pub fn without_logging(mut self) -> Self {
        self.init_logging = false;
        self
    }

    pub fn build(self) -> RuntimeResult<MediatiRuntime> {
        let config = self.config_loader.load()?;
        Ok(if self.init_logging {
            MediatiRuntime::from_config(&config)
        } else {
            MediatiRuntime::with_config(config)
        })
    }
}

impl Default for RuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}
