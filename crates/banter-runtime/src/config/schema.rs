//! `bot.json` schema.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Kernel configuration, stored as `bot.json` in the profile.
///
/// ```json
/// {
///   "api": "stub",
///   "api_config": { "interactive": true },
///   "plugin_path": "modules",
///   "prefix": ["!", "!bot", "@bot"],
///   "admins": ["root"],
///   "display_name": "Banter",
///   "echo": false,
///   "autoaccept_friend": true
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BotConfig {
    /// Backend name, as registered with `register_api!`.
    #[serde(default)]
    pub api: String,

    /// Backend options; the backend's defaults are merged in on load.
    #[serde(default = "default_api_config")]
    pub api_config: Value,

    /// Plugin search path, relative to the profile directory. Must differ
    /// from the plugin config directory, `plugins/`.
    #[serde(default = "default_plugin_path")]
    pub plugin_path: String,

    /// Command prefixes.
    #[serde(default = "default_prefix")]
    pub prefix: Vec<String>,

    /// User ids allowed to run admin commands.
    #[serde(default)]
    pub admins: Vec<String>,

    /// Display name to set on startup. Empty keeps the backend's.
    #[serde(default)]
    pub display_name: String,

    /// Log every message the bot sees or sends.
    #[serde(default)]
    pub echo: bool,

    /// Accept every friend request.
    #[serde(default)]
    pub autoaccept_friend: bool,

    /// Only these plugins may be mounted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plugin_whitelist: Option<Vec<String>>,

    /// These plugins are never mounted. Ignored when a whitelist is set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plugin_blacklist: Option<Vec<String>>,

    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            api: String::new(),
            api_config: default_api_config(),
            plugin_path: default_plugin_path(),
            prefix: default_prefix(),
            admins: Vec::new(),
            display_name: String::new(),
            echo: false,
            autoaccept_friend: false,
            plugin_whitelist: None,
            plugin_blacklist: None,
            log_level: default_log_level(),
        }
    }
}

fn default_api_config() -> Value {
    Value::Object(Default::default())
}

fn default_plugin_path() -> String {
    "modules".to_string()
}

fn default_prefix() -> Vec<String> {
    vec!["!".to_string(), "!bot".to_string(), "@bot".to_string()]
}

fn default_log_level() -> String {
    "info".to_string()
}
