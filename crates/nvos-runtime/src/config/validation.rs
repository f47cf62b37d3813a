//! Configuration validation utilities.

use std::collections::HashSet;

use super::error::{ConfigError, ConfigResult};
use super::schema::{LogOutput, LoggingConfig, ModulesConfig, NvosConfig};

const FILTER_LEVELS: [&str; 6] = ["trace", "debug", "info", "warn", "error", "off"];

/// Validates the entire configuration.
pub fn validate_config(config: &NvosConfig) -> ConfigResult<()> {
    validate_logging_config(&config.logging)?;
    validate_modules_config(&config.modules)?;
    Ok(())
}

fn validate_logging_config(logging: &LoggingConfig) -> ConfigResult<()> {
    for (target, level) in &logging.filters {
        if target.is_empty() {
            return Err(ConfigError::validation("Log filter target must not be empty"));
        }
        if !FILTER_LEVELS.contains(&level.to_lowercase().as_str()) {
            return Err(ConfigError::validation(format!(
                "Invalid log level for filter '{target}': {level}. Valid values are: {FILTER_LEVELS:?}"
            )));
        }
    }

    if logging.output == LogOutput::File && logging.file_path.is_none() {
        return Err(ConfigError::missing_field("logging.file_path"));
    }

    Ok(())
}

fn validate_modules_config(modules: &ModulesConfig) -> ConfigResult<()> {
    let mut seen = HashSet::new();
    for name in &modules.disabled {
        if name.trim().is_empty() {
            return Err(ConfigError::validation(
                "Disabled module names must not be empty",
            ));
        }
        if !seen.insert(name.as_str()) {
            return Err(ConfigError::validation(format!(
                "Module '{name}' is listed as disabled more than once"
            )));
        }
    }
    Ok(())
}
