//! Configuration management for anthropic-llm
//!
//! Settings are layered, later sources overriding earlier ones:
//! 1. Built-in defaults
//! 2. Config file (`<config dir>/anthropic-llm/config.json` or an explicit path)
//! 3. `.env` file in the working directory
//! 4. Environment variables

pub mod credentials;
pub mod settings;

use std::path::PathBuf;

pub use self::{
    credentials::{resolve_credential, ApiKey},
    settings::Settings,
};

/// Get the configuration directory path
#[must_use]
pub fn config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("anthropic-llm")
}

/// Get the default config file path
#[must_use]
pub fn config_path() -> PathBuf {
    config_dir().join("config.json")
}
