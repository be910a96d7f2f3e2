//! Configuration validation utilities.

use mediati_core::DecoratorOverrides;

use super::error::{ConfigError, ConfigResult};
use super::schema::{LogOutput, LoggingConfig, MediatiConfig};

/// Validates the entire configuration.
pub fn validate_config(config: &MediatiConfig) -> ConfigResult<()> {
    validate_logging_config(&config.logging)?;
    validate_handler_overrides(&config.handlers)?;
    Ok(())
}

fn validate_logging_config(logging: &LoggingConfig) -> ConfigResult<()> {
    if logging.output == LogOutput::File {
        match &logging.file_path {
            None => return Err(ConfigError::missing_field("logging.file_path")),
            Some(path) if path.file_name().is_none() => {
                return Err(ConfigError::validation(format!(
                    "logging.file_path must name a file: {}",
                    path.display()
                )));
            }
            Some(_) => {}
        }
    }

    if let Some(target) = logging.filters.keys().find(|t| t.trim().is_empty()) {
        return Err(ConfigError::validation(format!(
            "Log filter target must not be empty: {target:?}"
        )));
    }

    Ok(())
}

fn validate_handler_overrides(overrides: &DecoratorOverrides) -> ConfigResult<()> {
    for (handler, decorators) in overrides.iter() {
        if handler.trim().is_empty() {
            return Err(ConfigError::validation("Handler override name must not be empty"));
        }
        for template in decorators.decorators.keys() {
            if template.trim().is_empty() {
                return Err(ConfigError::validation(format!(
                    "Decorator override name must not be empty (handler {handler})"
                )));
            }
        }
    }
    Ok(())
}
