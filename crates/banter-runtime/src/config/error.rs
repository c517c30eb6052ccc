//! Configuration error types.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while resolving a profile or loading `bot.json`.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Neither a profile nor a backend was selected.
    #[error("No profile selected; pass --profile or --api")]
    NoProfile,

    /// The platform has no user configuration directory.
    #[error("Cannot determine the user configuration directory; pass --profiledir")]
    NoConfigDir,

    /// Reading or writing a JSON config file failed.
    #[error(transparent)]
    File(#[from] banter_framework::ConfigError),

    /// figment could not extract the layered configuration.
    #[error("Failed to extract configuration: {0}")]
    Extract(#[from] Box<figment::Error>),

    /// `bot.json` names no backend and none was given on the command line.
    #[error("No backend configured; set \"api\" in {} or pass --api", .0.display())]
    MissingApi(PathBuf),

    /// Invalid configuration value.
    #[error("Invalid configuration: {message}")]
    Validation { message: String },
}

impl ConfigError {
    /// Creates a validation error with the given message.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Extract(Box::new(err))
    }
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;
