//! Runtime error types.

use banter_core::ApiError;
use banter_framework::PluginError;
use thiserror::Error;

use crate::config::ConfigError;

/// Errors that stop the bot.
#[derive(Error, Debug)]
pub enum BotError {
    /// The profile or `bot.json` could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// No backend with this name is linked into the binary.
    #[error("Unknown chat backend '{name}' (available: {available})")]
    UnknownApi { name: String, available: String },

    /// The backend failed to start or stopped with an error.
    #[error("Chat backend error: {0}")]
    Api(#[from] ApiError),

    /// A plugin error escaped the kernel's error policy.
    #[error(transparent)]
    Plugin(#[from] PluginError),

    /// The profile directory could not be prepared.
    #[error("Failed to prepare profile directory: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for kernel operations.
pub type BotResult<T> = Result<T, BotError>;
