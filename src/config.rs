//! Application configuration
//!
//! Loaded from `config.toml` in the user's config directory. Every field is
//! optional; a missing file means defaults.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::practice::MAX_RANDOM_WORDS;
use crate::sync::SyncConfig;

const APP_DIR: &str = "wordpractice";
const CONFIG_FILE: &str = "config.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
    #[error("Could not determine a data directory")]
    DataDirNotFound,
}

/// Practice settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct PracticeConfig {
    /// Words offered per practice round
    #[serde(default = "default_max_random_words")]
    pub max_random_words: usize,
}

fn default_max_random_words() -> usize {
    MAX_RANDOM_WORDS
}

impl Default for PracticeConfig {
    fn default() -> Self {
        Self {
            max_random_words: MAX_RANDOM_WORDS,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct AppConfig {
    /// Where the queue and local remote files live
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,
    /// Signed-in user; absent means signed out
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub practice: PracticeConfig,
}

impl AppConfig {
    /// `<config dir>/wordpractice/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join(APP_DIR).join(CONFIG_FILE))
    }

    /// Load from a TOML file, falling back to defaults when it does not exist
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            log::debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = toml::from_str(toml_str)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.practice.max_random_words == 0 {
            return Err(ConfigError::Invalid(
                "practice.max_random_words must be at least 1".to_string(),
            ));
        }
        if self.user_id.as_deref().is_some_and(|id| id.trim().is_empty()) {
            return Err(ConfigError::Invalid("user_id must not be blank".to_string()));
        }
        Ok(())
    }

    /// Configured data directory, or `<local data dir>/wordpractice`
    pub fn data_dir(&self) -> Result<PathBuf, ConfigError> {
        if let Some(dir) = &self.data_dir {
            return Ok(dir.clone());
        }
        dirs::data_local_dir()
            .map(|p| p.join(APP_DIR))
            .ok_or(ConfigError::DataDirNotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config = AppConfig::load(&temp_dir.path().join("config.toml")).unwrap();

        assert_eq!(config, AppConfig::default());
        assert_eq!(config.sync.interval(), Duration::from_secs(30));
        assert_eq!(config.practice.max_random_words, 5);
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
user_id = "alice"
data_dir = "/tmp/words"

[sync]
interval_secs = 10
"#,
        )
        .unwrap();

        let config = AppConfig::load(&path).unwrap();
        assert_eq!(config.user_id.as_deref(), Some("alice"));
        assert_eq!(config.data_dir().unwrap(), PathBuf::from("/tmp/words"));
        assert_eq!(config.sync.interval_secs, 10);
        assert_eq!(config.practice.max_random_words, 5);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let zero_words = AppConfig::from_toml("[practice]\nmax_random_words = 0\n");
        assert!(matches!(zero_words, Err(ConfigError::Invalid(_))));

        let blank_user = AppConfig::from_toml("user_id = \"  \"\n");
        assert!(matches!(blank_user, Err(ConfigError::Invalid(_))));

        let malformed = AppConfig::from_toml("[sync\ninterval_secs = 1");
        assert!(matches!(malformed, Err(ConfigError::Parse(_))));
    }
}
