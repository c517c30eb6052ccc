//! Configuration loader using figment.
//!
//! # Configuration Priority (lowest to highest)
//!
//! 1. Built-in defaults ([`BotConfig::default`])
//! 2. `bot.json` in the profile's config directory
//! 3. Environment variables (`BANTER_*`)
//! 4. `--api` on the command line
//!
//! On first launch `bot.json` is written from the defaults, so the user finds
//! every option in the file.
//!
//! # Environment Variable Mapping
//!
//! Environment variables use the `BANTER_` prefix with `__` as separator:
//!
//! - `BANTER_LOG_LEVEL=debug` → `log_level = "debug"`
//! - `BANTER_API_CONFIG__INTERACTIVE=true` → `api_config.interactive = true`
//!
//! # Backend options
//!
//! The options a backend receives are layered as well, lowest first: the
//! backend's `get_default_options()`, `api_config` in `bot.json`, then
//! `api.json`. Both files get the missing keys written back.

use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized};
use serde_json::Value;
use tracing::{debug, info, trace};

use super::error::{ConfigError, ConfigResult};
use super::profile::ProfileLayout;
use super::schema::BotConfig;
use super::validation::validate_config;
use banter_framework::config::merge_defaults;

/// Loads `bot.json` and the backend options of one profile.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    layout: ProfileLayout,
    api: Option<String>,
    load_env: bool,
}

impl ConfigLoader {
    pub fn new(layout: ProfileLayout) -> Self {
        Self {
            layout,
            api: None,
            load_env: true,
        }
    }

    /// Selects the backend, overriding `bot.json`.
    pub fn api(mut self, name: impl Into<String>) -> Self {
        self.api = Some(name.into());
        self
    }

    /// Enables loading environment variables (default: true).
    pub fn with_env(mut self) -> Self {
        self.load_env = true;
        self
    }

    /// Disables loading environment variables.
    pub fn without_env(mut self) -> Self {
        self.load_env = false;
        self
    }

    pub fn layout(&self) -> &ProfileLayout {
        &self.layout
    }

    /// Loads and validates `bot.json`, creating it on first launch.
    pub async fn load(&self) -> ConfigResult<BotConfig> {
        let file = self.layout.bot_config();
        if !file.exists().await {
            info!(path = %file.path().display(), "Creating default configuration");
        }

        let mut defaults = BotConfig::default();
        if let Some(api) = &self.api {
            defaults.api.clone_from(api);
        }
        let defaults = serde_json::to_value(&defaults)
            .map_err(|e| ConfigError::validation(e.to_string()))?;
        file.load_with_default(&defaults, false).await?;

        let mut config: BotConfig = self.figment().extract()?;
        if let Some(api) = &self.api {
            config.api.clone_from(api);
        }
        if config.api.is_empty() {
            return Err(ConfigError::MissingApi(file.path().to_path_buf()));
        }
        validate_config(&config)?;

        debug!(
            profile = %self.layout.name(),
            api = %config.api,
            log_level = %config.log_level,
            "Configuration loaded successfully"
        );
        Ok(config)
    }

    /// Resolves the options handed to the backend.
    ///
    /// `config.api_config` is updated with the merged backend defaults.
    pub async fn load_api_options(
        &self,
        config: &mut BotConfig,
        backend_defaults: &Value,
    ) -> ConfigResult<Value> {
        merge_defaults(&mut config.api_config, backend_defaults);

        let bot_file = self.layout.bot_config();
        let mut raw = bot_file.load().await?;
        if let Some(object) = raw.as_object_mut() {
            let stored = object
                .entry("api_config")
                .or_insert_with(|| Value::Object(Default::default()));
            let before = stored.clone();
            merge_defaults(stored, backend_defaults);
            if *stored != before {
                bot_file.save(&raw).await?;
            }
        }

        let options = self
            .layout
            .api_config()
            .load_with_default(&config.api_config, false)
            .await?;
        trace!(options = %options, "Backend options resolved");
        Ok(options)
    }

    /// Builds the figment with all sources.
    pub fn figment(&self) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(BotConfig::default()))
            .merge(Json::file(self.layout.bot_config().path()));

        if self.load_env {
            trace!("Loading environment variables with BANTER_ prefix");
            figment = figment.merge(Env::prefixed("BANTER_").split("__"));
        }
        figment
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn loader(dir: &tempfile::TempDir) -> ConfigLoader {
        ConfigLoader::new(ProfileLayout::new("test", dir.path())).without_env()
    }

    #[tokio::test]
    async fn test_first_launch_writes_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = loader(&dir).api("stub").load().await.unwrap();
        assert_eq!(config.api, "stub");
        assert_eq!(config.prefix, BotConfig::default().prefix);

        let written: Value =
            serde_json::from_str(&std::fs::read_to_string(dir.path().join("bot.json")).unwrap())
                .unwrap();
        assert_eq!(written["api"], "stub");
        assert_eq!(written["prefix"], json!(["!", "!bot", "@bot"]));
    }

    #[tokio::test]
    async fn test_missing_api_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = loader(&dir).load().await.unwrap_err();
        assert!(matches!(err, ConfigError::MissingApi(_)));
    }

    #[tokio::test]
    async fn test_file_values_win_over_defaults() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("bot.json"),
            r#"{"api": "stub", "prefix": ["?"], "admins": ["root"], "autoaccept_friend": true}"#,
        )
        .unwrap();

        let config = loader(&dir).load().await.unwrap();
        assert_eq!(config.prefix, vec!["?"]);
        assert_eq!(config.admins, vec!["root"]);
        assert!(config.autoaccept_friend);
        assert_eq!(config.plugin_path, "modules");
    }

    #[tokio::test]
    async fn test_command_line_api_wins() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("bot.json"), r#"{"api": "tox"}"#).unwrap();
        let config = loader(&dir).api("stub").load().await.unwrap();
        assert_eq!(config.api, "stub");
    }

    #[tokio::test]
    async fn test_invalid_values_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("bot.json"), r#"{"api": "stub", "prefix": []}"#).unwrap();
        let err = loader(&dir).load().await.unwrap_err();
        assert!(matches!(err, ConfigError::Validation { .. }));
    }

    #[tokio::test]
    async fn test_api_options_layering() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("bot.json"),
            r#"{"api": "stub", "api_config": {"display_name": "From bot.json"}}"#,
        )
        .unwrap();
        std::fs::write(dir.path().join("api.json"), r#"{"interactive": false}"#).unwrap();

        let loader = loader(&dir);
        let mut config = loader.load().await.unwrap();
        let backend_defaults = json!({
            "display_name": "Default",
            "interactive": true,
            "user_id": "bot",
        });
        let options = loader
            .load_api_options(&mut config, &backend_defaults)
            .await
            .unwrap();

        assert_eq!(
            options,
            json!({
                "display_name": "From bot.json",
                "interactive": false,
                "user_id": "bot",
            })
        );
        assert_eq!(config.api_config["user_id"], "bot");

        let bot_json: Value =
            serde_json::from_str(&std::fs::read_to_string(dir.path().join("bot.json")).unwrap())
                .unwrap();
        assert_eq!(bot_json["api_config"]["interactive"], true);
        assert_eq!(bot_json["api_config"]["display_name"], "From bot.json");
    }
}
