use std::fmt;
use std::sync::{Arc, Weak};

use banter_core::BoxedApi;

use super::PluginManager;
use crate::command::CommandRegistry;
use crate::config::JsonConfig;
use crate::control::Shutdown;
use crate::dispatcher::EventDispatcher;

/// What a plugin gets to work with.
#[derive(Clone)]
pub struct PluginContext {
    name: String,
    commands: Arc<CommandRegistry>,
    dispatcher: EventDispatcher,
    config: JsonConfig,
    shutdown: Shutdown,
    manager: Weak<PluginManager>,
}

impl PluginContext {
    pub(crate) fn new(
        name: &str,
        commands: Arc<CommandRegistry>,
        dispatcher: EventDispatcher,
        config: JsonConfig,
        shutdown: Shutdown,
        manager: Weak<PluginManager>,
    ) -> Self {
        Self {
            name: name.to_string(),
            commands,
            dispatcher,
            config,
            shutdown,
            manager,
        }
    }

    /// Name the plugin was mounted under.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn commands(&self) -> &Arc<CommandRegistry> {
        &self.commands
    }

    pub fn dispatcher(&self) -> &EventDispatcher {
        &self.dispatcher
    }

    pub fn api(&self) -> &BoxedApi {
        self.dispatcher.api()
    }

    /// The plugin's own config file, `plugins/<name>.json`.
    pub fn config(&self) -> &JsonConfig {
        &self.config
    }

    pub fn shutdown(&self) -> &Shutdown {
        &self.shutdown
    }

    /// The manager that mounted this plugin, while it is alive.
    pub fn manager(&self) -> Option<Arc<PluginManager>> {
        self.manager.upgrade()
    }
}

impl fmt::Debug for PluginContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginContext")
            .field("name", &self.name)
            .field("config", &self.config.path())
            .finish_non_exhaustive()
    }
}
