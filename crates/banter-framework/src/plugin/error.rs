use std::io;
use std::path::PathBuf;

use banter_core::BoxError;
use thiserror::Error;

/// Errors raised while mounting or unmounting plugins.
#[derive(Error, Debug)]
pub enum PluginError {
    /// No compiled-in plugin has this name, or it is not mounted.
    #[error("Plugin '{0}' not found")]
    NotFound(String),

    /// Construction or `init` failed; the plugin is not mounted.
    #[error("Plugin '{name}' failed to initialize: {source}")]
    Init {
        name: String,
        #[source]
        source: BoxError,
    },

    /// `quit` failed; the plugin was removed anyway.
    #[error("Plugin '{name}' failed to quit: {source}")]
    Quit {
        name: String,
        #[source]
        source: BoxError,
    },

    /// The plugin directory could not be read.
    #[error("Failed to read plugin directory {}: {source}", path.display())]
    Discovery {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl PluginError {
    /// Name of the plugin involved, if any.
    pub fn plugin(&self) -> Option<&str> {
        match self {
            Self::NotFound(name) | Self::Init { name, .. } | Self::Quit { name, .. } => Some(name),
            Self::Discovery { .. } => None,
        }
    }
}
