//! Plugin system.
//!
//! # Architecture
//!
//! A plugin is a struct implementing [`Plugin`] (lifecycle hooks) and
//! [`PluginFactory`] (construction). [`register_plugin!`](crate::register_plugin)
//! puts a [`PluginDescriptor`] for it into the link-time [`PLUGINS`]
//! registry, and the [`PluginManager`] mounts the ones it discovers in the
//! plugin directory.
//!
//! ```text
//! mount("echo") ─► old.quit() ─► EchoPlugin::create(ctx, old) ─► new.init(old) ─► live
//! ```
//!
//! A plugin registers its own commands, event subscriptions and timers
//! through the [`PluginContext`] and must release all of them in
//! [`Plugin::quit`]. The manager does not track them.
//!
//! # Quick start
//!
//! ```rust,ignore
//! use banter::prelude::*;
//!
//! pub struct Ping {
//!     ctx: PluginContext,
//! }
//!
//! impl PluginFactory for Ping {
//!     const NAME: &'static str = "ping";
//!
//!     fn create(ctx: PluginContext, _old: Option<Arc<dyn Plugin>>) -> Result<Arc<Self>, BoxError> {
//!         ctx.commands().register(Command::new("ping", |msg, _| async move {
//!             msg.reply("pong").await?;
//!             Ok(())
//!         }))?;
//!         Ok(Arc::new(Ping { ctx }))
//!     }
//! }
//!
//! #[async_trait]
//! impl Plugin for Ping {
//!     async fn quit(&self) -> Result<(), BoxError> {
//!         self.ctx.commands().unregister("ping");
//!         Ok(())
//!     }
//!
//!     fn as_any(&self) -> &dyn Any {
//!         self
//!     }
//! }
//!
//! register_plugin!(Ping);
//! ```
//!
//! # State hand-off
//!
//! On remount the new instance receives the old one. Downcast it to read
//! state that should survive:
//!
//! ```rust,ignore
//! let count = old
//!     .as_deref()
//!     .and_then(|old| old.downcast_ref::<Counter>())
//!     .map_or(0, |old| old.count.load(Ordering::SeqCst));
//! ```

mod context;
mod descriptor;
mod error;
mod manager;

use std::any::Any;
use std::sync::Arc;

use async_trait::async_trait;
use banter_core::BoxError;

pub use context::PluginContext;
pub use descriptor::{PLUGINS, PluginDescriptor, PluginFactory, find_plugin, plugin_names};
pub use error::PluginError;
pub use manager::{INIT_MARKER, PLUGIN_SUFFIX, PluginFilter, PluginManager, PluginManagerBuilder};

#[doc(hidden)]
pub use descriptor::create_plugin;

/// Lifecycle hooks of a live plugin.
#[async_trait]
pub trait Plugin: Send + Sync + 'static {
    /// Asynchronous setup after construction. `old` is the instance this one
    /// replaces, if any.
    async fn init(&self, _old: Option<Arc<dyn Plugin>>) -> Result<(), BoxError> {
        Ok(())
    }

    /// Releases everything the plugin registered.
    async fn quit(&self) -> Result<(), BoxError> {
        Ok(())
    }

    fn as_any(&self) -> &dyn Any;
}

impl dyn Plugin {
    pub fn downcast_ref<T: Plugin>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }

    pub fn is<T: Plugin>(&self) -> bool {
        self.as_any().is::<T>()
    }
}
