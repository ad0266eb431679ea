//! Provider settings loaded from disk and the environment

use std::{fmt, fs, path::Path};

use serde::{Deserialize, Serialize};

use crate::{
    error::{LlmError, Result},
    storage::StorageSettings,
};

/// Environment variable holding the Anthropic-specific key
pub const ANTHROPIC_API_KEY_ENV: &str = "ANTHROPIC_API_KEY";

/// Environment variable holding the generic fallback key
pub const API_KEY_ENV: &str = "API_KEY";

/// Environment variable overriding the API endpoint
pub const ANTHROPIC_BASE_URL_ENV: &str = "ANTHROPIC_BASE_URL";

/// Settings consumed by the Anthropic adapter
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    /// Anthropic-specific API key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anthropic_api_key: Option<String>,

    /// Generic API key, used when no provider-specific key is set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Custom API endpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anthropic_base_url: Option<String>,

    /// Content storage
    #[serde(default)]
    pub storage: StorageSettings,
}

impl Settings {
    /// Load settings from the default config path, `.env` and the environment
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be read or parsed
    pub fn load() -> Result<Self> {
        Self::load_with(None)
    }

    /// Like [`Settings::load`], reading the config file from `path` if given
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be read or parsed
    pub fn load_with(path: Option<&Path>) -> Result<Self> {
        let path = path.map_or_else(super::config_path, Path::to_path_buf);
        let mut settings = Self::load_from_path(&path)?;

        if let Err(e) = dotenv::dotenv() {
            tracing::trace!("No .env file loaded: {e}");
        }
        settings.apply_env(|key| std::env::var(key).ok());

        Ok(settings)
    }

    /// Load settings from a specific path, falling back to defaults if absent
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed
    pub fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "Config file not found, using defaults");
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path).map_err(|e| LlmError::ConfigParse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        serde_json::from_str(&contents).map_err(|e| LlmError::ConfigParse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Save settings to a specific path
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written
    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let contents = serde_json::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }

    /// Override fields from environment variables
    ///
    /// `lookup` maps a variable name to its value. Empty values are ignored.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str| lookup(key).filter(|v| !v.is_empty());

        if let Some(key) = read(ANTHROPIC_API_KEY_ENV) {
            self.anthropic_api_key = Some(key);
        }
        if let Some(key) = read(API_KEY_ENV) {
            self.api_key = Some(key);
        }
        if let Some(url) = read(ANTHROPIC_BASE_URL_ENV) {
            self.anthropic_base_url = Some(url);
        }
    }
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |key: &Option<String>| key.as_ref().map(|_| "***");
        f.debug_struct("Settings")
            .field("anthropic_api_key", &redact(&self.anthropic_api_key))
            .field("api_key", &redact(&self.api_key))
            .field("anthropic_base_url", &self.anthropic_base_url)
            .field("storage", &self.storage)
            .finish()
    }
}
