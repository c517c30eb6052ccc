//! Configuration validation.

use super::error::{ConfigError, ConfigResult};
use super::schema::BotConfig;

/// Validates the loaded configuration.
pub fn validate_config(config: &BotConfig) -> ConfigResult<()> {
    if config.prefix.is_empty() {
        return Err(ConfigError::validation("at least one command prefix is required"));
    }
    if config.prefix.iter().any(|p| p.trim().is_empty()) {
        return Err(ConfigError::validation("command prefixes must not be blank"));
    }
    if !config.api_config.is_object() {
        return Err(ConfigError::validation("api_config must be an object"));
    }
    if config.log_level.parse::<tracing::Level>().is_err() {
        return Err(ConfigError::validation(format!(
            "unknown log level '{}'",
            config.log_level
        )));
    }
    Ok(())
}
