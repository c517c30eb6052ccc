//! # Banter
//!
//! A chat bot runtime that talks to many chat networks through one contract.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────────┐     ┌─────────────────┐
//! │   ChatApi   │────▶│ EventDispatcher │────▶│ CommandRegistry │──▶ command handlers
//! │  (backend)  │     │  (priorities)   │────▶│ plugin handlers │
//! └─────────────┘     └─────────────────┘     └─────────────────┘
//!                              ▲
//!                       PluginManager mounts plugins that register
//!                       commands, subscriptions and timers
//! ```
//!
//! - **Core**: the backend contract ([`core::ChatApi`]) and its entities
//! - **Framework**: dispatcher, command registry, plugin system, configs
//! - **Runtime**: the [`runtime::Bot`] kernel, profiles and logging
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use banter::prelude::*;
//!
//! pub struct Greeter {
//!     ctx: PluginContext,
//! }
//!
//! impl PluginFactory for Greeter {
//!     const NAME: &'static str = "greeter";
//!
//!     fn create(ctx: PluginContext, _old: Option<Arc<dyn Plugin>>) -> Result<Arc<Self>, BoxError> {
//!         ctx.commands().register(Command::new("hello", |msg, _| async move {
//!             msg.reply(&format!("Hello, {}!", msg.author().display_name())).await?;
//!             Ok(())
//!         }))?;
//!         Ok(Arc::new(Greeter { ctx }))
//!     }
//! }
//!
//! #[async_trait]
//! impl Plugin for Greeter {
//!     async fn quit(&self) -> Result<(), BoxError> {
//!         self.ctx.commands().unregister("hello");
//!         Ok(())
//!     }
//!
//!     fn as_any(&self) -> &dyn Any {
//!         self
//!     }
//! }
//!
//! register_plugin!(Greeter);
//! ```
//!
//! ## Features
//!
//! - `json-log`: JSON console logging

pub use banter_core as core;
pub use banter_framework as framework;
pub use banter_runtime as runtime;

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use banter::prelude::*;
/// ```
pub mod prelude {
    // Plugin authoring
    pub use banter_framework::prelude::*;

    // Kernel
    pub use banter_runtime::{Bot, BotConfig, ProfileLayout};
}
