//! Configuration module for the Banter runtime.
//!
//! This module resolves the profile layout and loads `bot.json` and the
//! backend options with figment.

pub mod error;
pub mod loader;
pub mod profile;
pub mod schema;
pub mod validation;

pub use error::{ConfigError, ConfigResult};
pub use loader::ConfigLoader;
pub use profile::{ProfileLayout, default_profiles_dir};
pub use schema::BotConfig;
pub use validation::validate_config;
