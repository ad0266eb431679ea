//! Error types for anthropic-llm

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using [`LlmError`]
pub type Result<T> = std::result::Result<T, LlmError>;

/// Main error type for anthropic-llm
///
/// Nothing in this crate recovers from these locally; every failure from the
/// vendor call surfaces to the caller unchanged.
#[derive(Debug, Error)]
pub enum LlmError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration parse error
    #[error("Failed to parse config at {path}: {message}")]
    ConfigParse { path: PathBuf, message: String },

    /// Configuration is present but unusable
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// No credential resolved for the provider
    #[error("Missing API key for provider: {provider}")]
    MissingApiKey { provider: String },

    /// Non-success response from the vendor API
    #[error("API error (HTTP {status}, {error_type}): {message}")]
    Api {
        status: u16,
        error_type: String,
        message: String,
    },

    /// Error event delivered inside an open stream
    #[error("Stream error ({error_type}): {message}")]
    Stream { error_type: String, message: String },

    /// HTTP request error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Connection dropped or body could not be read
    #[error("Network error: {0}")]
    Network(String),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Response carried no content blocks
    #[error("Response contained no content blocks")]
    EmptyResponse,

    /// First content block was not text
    #[error("Unexpected content block: {0}")]
    UnexpectedContent(String),

    /// Content storage error
    #[error("Storage error: {0}")]
    Storage(String),
}

impl LlmError {
    /// Whether the vendor rejected the credential
    #[must_use]
    pub fn is_auth_error(&self) -> bool {
        match self {
            Self::MissingApiKey { .. } => true,
            Self::Api { status, .. } => matches!(status, 401 | 403),
            _ => false,
        }
    }
}
