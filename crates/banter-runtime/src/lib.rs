//! Banter Runtime - the bot kernel.
//!
//! This crate provides:
//! - The [`Bot`] kernel that wires a chat backend to the dispatcher, the
//!   command registry and the plugin manager
//! - Profile layout and `bot.json` loading ([`config`])
//! - Logging configuration ([`logging`])
//!
//! ```ignore
//! use banter_runtime::{Bot, ProfileLayout};
//!
//! let layout = ProfileLayout::resolve(Some("main"), None, None, None)?;
//! let bot = Bot::load(&layout, None).await?;
//! let code = bot.run().await?;
//! ```
//!
//! # Startup
//!
//! 1. Load `bot.json` (figment: defaults, file, `BANTER_*` environment).
//! 2. Create the configured backend from its merged options.
//! 3. Build the dispatcher and the command registry.
//! 4. Subscribe the kernel handlers: commands, friend requests, echo logging.
//! 5. Mount the plugins found in the plugin path.
//! 6. Set the display name and run the backend.

pub mod bot;
pub mod config;
pub mod error;
pub mod logging;

pub use bot::{Bot, BotBuilder};
pub use config::{BotConfig, ConfigError, ConfigLoader, ConfigResult, ProfileLayout};
pub use error::{BotError, BotResult};
pub use logging::{LogFormat, LoggingBuilder};
