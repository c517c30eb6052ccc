//! JSON configuration files.
//!
//! Every config file is a JSON object. Loading with a default fills in the
//! keys the file lacks (a shallow union where the file wins), then writes the
//! result back so users see every option:
//!
//! ```text
//! file:    { "a": 1 }
//! default: { "a": 0, "b": 2 }
//! result:  { "a": 1, "b": 2 }        (overwrite = true gives the default)
//! ```
//!
//! Writes replace the whole file through a temporary sibling and a rename, so
//! a crash never leaves half a file behind.

use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::debug;

/// Errors raised while reading or writing a config file.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to access configuration file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to parse configuration file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid configuration in {}: {source}", path.display())]
    Invalid {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl ConfigError {
    fn io(path: &Path, source: io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Fills the keys `data` lacks from `default`. Non-object data is left alone,
/// except `null`, which becomes the default.
pub fn merge_defaults(data: &mut Value, default: &Value) {
    if data.is_null() {
        *data = default.clone();
        return;
    }
    if let (Value::Object(data), Value::Object(default)) = (data, default) {
        for (key, value) in default {
            data.entry(key.clone()).or_insert_with(|| value.clone());
        }
    }
}

/// One JSON config file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsonConfig {
    path: PathBuf,
}

impl JsonConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn exists(&self) -> bool {
        tokio::fs::try_exists(&self.path).await.unwrap_or(false)
    }

    /// Reads the file; a missing file reads as an empty object.
    pub async fn load(&self) -> ConfigResult<Value> {
        let text = match tokio::fs::read_to_string(&self.path).await {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Value::Object(Map::new())),
            Err(e) => return Err(ConfigError::io(&self.path, e)),
        };
        if text.trim().is_empty() {
            return Ok(Value::Object(Map::new()));
        }
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: self.path.clone(),
            source,
        })
    }

    /// Reads the file merged with `default` and saves the result if it
    /// differs from what was on disk. With `overwrite` the default replaces
    /// the file content.
    pub async fn load_with_default(&self, default: &Value, overwrite: bool) -> ConfigResult<Value> {
        let loaded = if self.exists().await {
            Some(self.load().await?)
        } else {
            None
        };
        let merged = match (&loaded, overwrite) {
            (Some(data), false) => {
                let mut merged = data.clone();
                merge_defaults(&mut merged, default);
                merged
            }
            _ => default.clone(),
        };

        if loaded.as_ref() != Some(&merged) {
            self.save(&merged).await?;
        }
        Ok(merged)
    }

    /// Loads a typed config, using `T::default()` as the default.
    pub async fn load_as<T>(&self) -> ConfigResult<T>
    where
        T: Serialize + DeserializeOwned + Default,
    {
        let default = serde_json::to_value(T::default()).map_err(|source| ConfigError::Invalid {
            path: self.path.clone(),
            source,
        })?;
        let merged = self.load_with_default(&default, false).await?;
        serde_json::from_value(merged).map_err(|source| ConfigError::Invalid {
            path: self.path.clone(),
            source,
        })
    }

    /// Replaces the file with `value`.
    pub async fn save(&self, value: &Value) -> ConfigResult<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ConfigError::io(parent, e))?;
        }

        let mut text = serde_json::to_string_pretty(value).map_err(|source| ConfigError::Invalid {
            path: self.path.clone(),
            source,
        })?;
        text.push('\n');

        let tmp = self.tmp_path();
        tokio::fs::write(&tmp, text)
            .await
            .map_err(|e| ConfigError::io(&tmp, e))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| ConfigError::io(&self.path, e))?;
        debug!(path = %self.path.display(), "Configuration saved");
        Ok(())
    }

    /// Serialises and saves a typed config.
    pub async fn save_as<T: Serialize>(&self, value: &T) -> ConfigResult<()> {
        let value = serde_json::to_value(value).map_err(|source| ConfigError::Invalid {
            path: self.path.clone(),
            source,
        })?;
        self.save(&value).await
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

/// Config files under one root directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigStore {
    root: PathBuf,
}

impl ConfigStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `<root>/<relative>`.
    pub fn file(&self, relative: impl AsRef<Path>) -> JsonConfig {
        JsonConfig::new(self.root.join(relative))
    }

    /// Directory holding the per-plugin configs.
    pub fn plugin_dir(&self) -> PathBuf {
        self.root.join("plugins")
    }

    /// `<root>/plugins/<name>.json`.
    pub fn plugin(&self, name: &str) -> JsonConfig {
        JsonConfig::new(self.plugin_dir().join(format!("{name}.json")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[test]
    fn test_merge_prefers_existing_keys() {
        let mut data = json!({ "a": 1, "nested": { "x": 1 } });
        merge_defaults(&mut data, &json!({ "a": 0, "b": 2, "nested": { "y": 2 } }));
        assert_eq!(data, json!({ "a": 1, "b": 2, "nested": { "x": 1 } }));

        let mut null = Value::Null;
        merge_defaults(&mut null, &json!({ "a": 1 }));
        assert_eq!(null, json!({ "a": 1 }));
    }

    #[tokio::test]
    async fn test_missing_file_is_empty_object() {
        let dir = tempfile::tempdir().unwrap();
        let config = JsonConfig::new(dir.path().join("none.json"));
        assert_eq!(config.load().await.unwrap(), json!({}));
        assert!(!config.exists().await);
    }

    #[tokio::test]
    async fn test_round_trip_after_default_merge() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::new(dir.path());
        let config = store.plugin("echo");

        let original = json!({ "greeting": "hi", "count": 3 });
        config.save(&original).await.unwrap();
        let loaded = config
            .load_with_default(&json!({ "count": 0, "loud": false }), false)
            .await
            .unwrap();
        assert_eq!(loaded, json!({ "greeting": "hi", "count": 3, "loud": false }));

        // The merged result was written back.
        assert_eq!(config.load().await.unwrap(), loaded);
        assert!(dir.path().join("plugins/echo.json").is_file());
        assert!(!dir.path().join("plugins/echo.json.tmp").exists());
    }

    #[tokio::test]
    async fn test_overwrite_replaces_content() {
        let dir = tempfile::tempdir().unwrap();
        let config = JsonConfig::new(dir.path().join("api.json"));
        config.save(&json!({ "old": true })).await.unwrap();

        let loaded = config
            .load_with_default(&json!({ "new": true }), true)
            .await
            .unwrap();
        assert_eq!(loaded, json!({ "new": true }));
        assert_eq!(config.load().await.unwrap(), json!({ "new": true }));
    }

    #[tokio::test]
    async fn test_invalid_json_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{ nope").unwrap();
        let err = JsonConfig::new(&path).load().await.unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[derive(Debug, Default, Serialize, Deserialize, PartialEq)]
    #[serde(default)]
    struct Settings {
        name: String,
        limit: u32,
    }

    #[tokio::test]
    async fn test_typed_load_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = JsonConfig::new(dir.path().join("settings.json"));
        let settings: Settings = config.load_as().await.unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(
            config.load().await.unwrap(),
            json!({ "name": "", "limit": 0 })
        );
    }
}
