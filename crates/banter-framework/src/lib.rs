//! # Banter Framework
//!
//! The pieces a bot is assembled from, on top of the [`banter_core`] backend
//! contract:
//!
//! - [`dispatcher`]: priority-ordered fan-out of backend events
//! - [`command`]: prefix parsing, shell-style splitting and the command table
//! - [`plugin`]: link-time plugin registry and the mount/unmount manager
//! - [`config`]: JSON config files for plugins
//! - [`control`]: cooperative shutdown with an exit code
//! - [`task`]: timers and blocking work off the event loop
//!
//! ```text
//! ChatApi ──► EventDispatcher ──► Message subscriber ──► CommandRegistry ──► handler
//!                   ▲                                          ▲
//!                   └──────── plugins subscribe / register ────┘
//! ```

pub mod command;
pub mod config;
pub mod control;
pub mod dispatcher;
pub mod plugin;
pub mod task;

#[doc(hidden)]
pub use linkme;

pub use command::{Command, CommandError, CommandFlags, CommandRegistry, CommandResult};
pub use config::{ConfigError, ConfigStore, JsonConfig};
pub use control::{ExitCode, Shutdown};
pub use dispatcher::{EventDispatcher, EventHandle, Flow, priority};
pub use plugin::{Plugin, PluginContext, PluginError, PluginFactory, PluginManager};
pub use task::{Timer, run_in_thread};

/// Prelude for plugin authors.
pub mod prelude {
    pub use std::any::Any;
    pub use std::sync::Arc;

    pub use async_trait::async_trait;
    pub use banter_core::prelude::*;

    pub use crate::command::{Command, CommandError, CommandFlags, CommandRegistry};
    pub use crate::config::JsonConfig;
    pub use crate::control::{ExitCode, Shutdown};
    pub use crate::dispatcher::{EventDispatcher, EventHandle, Flow, priority};
    pub use crate::plugin::{Plugin, PluginContext, PluginFactory};
    pub use crate::register_plugin;
    pub use crate::task::{Timer, run_in_thread};
}
