//! Profile directory layout.
//!
//! ```text
//! <profiledir>/<profile>/
//! ├── bot.json            kernel config
//! ├── api.json            backend options
//! ├── plugins/<name>.json per-plugin config
//! ├── chatbot.log
//! └── chatbot.old.log
//! ```
//!
//! The JSON files live in the config directory, which is the profile
//! directory unless `--configdir` moves them.

use std::path::{Path, PathBuf};

use banter_framework::{ConfigStore, JsonConfig};

use super::error::{ConfigError, ConfigResult};
use super::schema::BotConfig;

pub const BOT_CONFIG: &str = "bot.json";
pub const API_CONFIG: &str = "api.json";
pub const LOG_FILE: &str = "chatbot.log";
pub const OLD_LOG_FILE: &str = "chatbot.old.log";

/// `dirs::config_dir()/banter/profiles`.
pub fn default_profiles_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("banter").join("profiles"))
}

/// Where one profile keeps its files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileLayout {
    name: String,
    profile_dir: PathBuf,
    config_dir: PathBuf,
}

impl ProfileLayout {
    /// A profile stored in `profile_dir`, with its configs next to it.
    pub fn new(name: impl Into<String>, profile_dir: impl Into<PathBuf>) -> Self {
        let profile_dir = profile_dir.into();
        Self {
            name: name.into(),
            config_dir: profile_dir.clone(),
            profile_dir,
        }
    }

    /// Resolves the layout from command line options.
    ///
    /// The profile name is `profile`, or the backend name when only `api` is
    /// given. `profiles_root` defaults to [`default_profiles_dir`].
    pub fn resolve(
        profile: Option<&str>,
        api: Option<&str>,
        profiles_root: Option<PathBuf>,
        config_dir: Option<PathBuf>,
    ) -> ConfigResult<Self> {
        let name = profile.or(api).ok_or(ConfigError::NoProfile)?;
        let root = match profiles_root {
            Some(root) => root,
            None => default_profiles_dir().ok_or(ConfigError::NoConfigDir)?,
        };

        let layout = Self::new(name, root.join(name));
        Ok(match config_dir {
            Some(dir) => layout.with_config_dir(dir),
            None => layout,
        })
    }

    /// Moves the JSON files to `dir`.
    pub fn with_config_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config_dir = dir.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn profile_dir(&self) -> &Path {
        &self.profile_dir
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn bot_config(&self) -> JsonConfig {
        JsonConfig::new(self.config_dir.join(BOT_CONFIG))
    }

    pub fn api_config(&self) -> JsonConfig {
        JsonConfig::new(self.config_dir.join(API_CONFIG))
    }

    /// Config scope handed to plugins.
    pub fn config_store(&self) -> ConfigStore {
        ConfigStore::new(&self.config_dir)
    }

    /// The plugin search path of `config`, resolved against the profile.
    pub fn plugin_path(&self, config: &BotConfig) -> PathBuf {
        let path = Path::new(&config.plugin_path);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.profile_dir.join(path)
        }
    }

    pub fn log_file(&self) -> PathBuf {
        self.profile_dir.join(LOG_FILE)
    }

    pub fn old_log_file(&self) -> PathBuf {
        self.profile_dir.join(OLD_LOG_FILE)
    }

    /// Creates the profile and config directories.
    pub async fn create_dirs(&self) -> std::io::Result<()> {
        tokio::fs::create_dir_all(&self.profile_dir).await?;
        tokio::fs::create_dir_all(&self.config_dir).await
    }
}
