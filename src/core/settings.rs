// src/core/settings.rs

//! Process configuration: where the store lives and how to reach the remote API.
//!
//! Sources, lowest priority first: built-in defaults, `<base_dir>/config.toml`,
//! the `EE_*` environment variables, then an explicit `--home` override.

use crate::{
    constants::{DEFAULT_API_URL, ENV_API_KEY, ENV_API_URL, ENV_HOME, SETTINGS_FILENAME},
    core::paths::{self, PathError},
};

use serde::Deserialize;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error(transparent)]
    Path(#[from] PathError),
    #[error("Failed to read settings file '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid settings file '{path}': {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("The base directory cannot be empty.")]
    EmptyBaseDir,
    #[error("The remote API is enabled but has no base URL.")]
    MissingApiUrl,
}

/// Remote API settings. Carried for completeness; nothing local depends on them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiSettings {
    pub enabled: bool,
    pub base_url: String,
    pub api_key: Option<String>,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            base_url: DEFAULT_API_URL.to_string(),
            api_key: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub base_dir: PathBuf,
    pub api: ApiSettings,
}

/// The on-disk `config.toml` layout. Every field is optional.
#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
struct SettingsFile {
    #[serde(default)]
    api: ApiSection,
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
struct ApiSection {
    enabled: Option<bool>,
    base_url: Option<String>,
    api_key: Option<String>,
}

impl Settings {
    /// Loads settings from the process environment.
    pub fn load(home_override: Option<&str>) -> Result<Self, SettingsError> {
        Self::from_sources(home_override, |key| std::env::var(key).ok())
    }

    /// Loads settings with an explicit environment lookup.
    ///
    /// # Arguments
    /// * `home_override` - A base directory that beats every other source.
    /// * `env` - Looks up one environment variable by name.
    pub fn from_sources<F>(home_override: Option<&str>, env: F) -> Result<Self, SettingsError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| env(key).filter(|v| !v.trim().is_empty());

        let base_dir = match home_override.map(str::to_string).or_else(|| lookup(ENV_HOME)) {
            Some(raw) => paths::expand_path(raw.trim())?,
            None => paths::default_base_dir()?,
        };
        if base_dir.as_os_str().is_empty() {
            return Err(SettingsError::EmptyBaseDir);
        }
        let base_dir = paths::prepare_dir(&base_dir)?;
        log::debug!("Using base directory '{}'.", base_dir.display());

        let file = read_settings_file(&base_dir)?;
        let mut api = ApiSettings::default();
        if let Some(enabled) = file.api.enabled {
            api.enabled = enabled;
        }
        if let Some(url) = file.api.base_url {
            api.base_url = url;
        }
        if let Some(key) = file.api.api_key.filter(|k| !k.is_empty()) {
            api.api_key = Some(key);
        }

        if let Some(url) = lookup(ENV_API_URL) {
            api.base_url = url;
        }
        if let Some(key) = lookup(ENV_API_KEY) {
            api.api_key = Some(key);
            api.enabled = true;
        }

        let settings = Self { base_dir, api };
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.base_dir.as_os_str().is_empty() {
            return Err(SettingsError::EmptyBaseDir);
        }
        if self.api.enabled && self.api.base_url.trim().is_empty() {
            return Err(SettingsError::MissingApiUrl);
        }
        Ok(())
    }
}

fn read_settings_file(base_dir: &std::path::Path) -> Result<SettingsFile, SettingsError> {
    let path = base_dir.join(SETTINGS_FILENAME);
    let content = match fs::read_to_string(&path) {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(SettingsFile::default()),
        Err(source) => return Err(SettingsError::Read { path, source }),
    };
    log::debug!("Reading settings from '{}'.", path.display());
    toml::from_str(&content).map_err(|source| SettingsError::Parse { path, source })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_with_home_override() {
        let dir = TempDir::new().unwrap();
        let home = dir.path().join("store");
        let settings = Settings::from_sources(home.to_str(), lookup(&[])).unwrap();

        assert!(settings.base_dir.is_dir());
        assert!(settings.base_dir.is_absolute());
        assert_eq!(settings.api, ApiSettings::default());
    }

    #[test]
    fn test_home_override_beats_environment() {
        let dir = TempDir::new().unwrap();
        let from_flag = dir.path().join("flag");
        let from_env = dir.path().join("env");
        let settings = Settings::from_sources(
            from_flag.to_str(),
            lookup(&[(ENV_HOME, from_env.to_str().unwrap())]),
        )
        .unwrap();
        assert!(settings.base_dir.ends_with("flag"));
        assert!(!from_env.exists());
    }

    #[test]
    fn test_file_then_environment() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join(SETTINGS_FILENAME),
            "[api]\nbase_url = \"https://file.example\"\nenabled = false\n",
        )
        .unwrap();
        let home = dir.path().to_str().unwrap();

        let from_file = Settings::from_sources(Some(home), lookup(&[])).unwrap();
        assert_eq!(from_file.api.base_url, "https://file.example");
        assert!(!from_file.api.enabled);

        let from_env = Settings::from_sources(
            Some(home),
            lookup(&[(ENV_API_URL, "https://env.example"), (ENV_API_KEY, "k")]),
        )
        .unwrap();
        assert_eq!(from_env.api.base_url, "https://env.example");
        assert_eq!(from_env.api.api_key.as_deref(), Some("k"));
        assert!(from_env.api.enabled);
    }

    #[test]
    fn test_invalid_settings_file() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(SETTINGS_FILENAME), "[unknown]\nx = 1\n").unwrap();
        let err = Settings::from_sources(dir.path().to_str(), lookup(&[])).unwrap_err();
        assert!(matches!(err, SettingsError::Parse { .. }));
    }

    #[test]
    fn test_validate_rejects_enabled_api_without_url() {
        let settings = Settings {
            base_dir: PathBuf::from("/tmp/ee"),
            api: ApiSettings {
                enabled: true,
                base_url: " ".to_string(),
                api_key: None,
            },
        };
        assert!(matches!(settings.validate(), Err(SettingsError::MissingApiUrl)));
        let empty = Settings {
            base_dir: PathBuf::new(),
            api: ApiSettings::default(),
        };
        assert!(matches!(empty.validate(), Err(SettingsError::EmptyBaseDir)));
    }
}
