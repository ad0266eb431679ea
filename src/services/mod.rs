//! Service layer for LLM providers
//!
//! [`ModelAdapter`] is the contract every provider fulfils; the Anthropic
//! implementation lives in [`anthropic`], its HTTP client in [`client`].

pub mod anthropic;
pub mod client;
pub mod streaming;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{error::Result, messages::Message};

pub use self::streaming::TextStream;

/// Default output token budget
pub const DEFAULT_MAX_TOKENS: u32 = 2048;

/// Option keys forwarded to the vendor; everything else is dropped
pub const FORWARDED_OPTIONS: [&str; 2] = ["temperature", "top_p"];

/// Sampling options forwarded with a request
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationOptions {
    /// Temperature for sampling
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    /// Top-p for nucleus sampling
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
}

impl GenerationOptions {
    /// Pick the supported options out of an arbitrary key/value bag
    ///
    /// Only `temperature` and `top_p` with numeric values are kept; every
    /// other key is silently discarded.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn from_kwargs(kwargs: &serde_json::Map<String, serde_json::Value>) -> Self {
        let dropped: Vec<&str> = kwargs
            .keys()
            .map(String::as_str)
            .filter(|key| !FORWARDED_OPTIONS.contains(key))
            .collect();
        if !dropped.is_empty() {
            tracing::trace!(?dropped, "Discarding unsupported generation options");
        }

        let number = |key: &str| {
            kwargs
                .get(key)
                .and_then(serde_json::Value::as_f64)
                .map(|v| v as f32)
        };

        Self {
            temperature: number("temperature"),
            top_p: number("top_p"),
        }
    }
}

/// Tool schema accepted by [`ModelAdapter::generate`]
///
/// Tools are accepted for interface compatibility but never forwarded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    pub input_schema: serde_json::Value,
}

/// Token usage statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    #[serde(default)]
    pub input_tokens: u32,
    #[serde(default)]
    pub output_tokens: u32,
}

/// Parameters of a generation call
#[derive(Debug, Clone)]
pub struct GenerateParams {
    /// Target model identifier
    pub model: String,

    /// Conversation, system messages included
    pub messages: Vec<Message>,

    /// Stream the response instead of returning it whole
    pub stream: bool,

    /// Accepted, not forwarded
    pub tools: Option<Vec<ToolSchema>>,

    /// Maximum tokens to generate
    pub max_tokens: u32,

    pub options: GenerationOptions,
}

impl GenerateParams {
    /// Parameters for a non-streaming call with the default token budget
    #[must_use]
    pub fn new(model: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            model: model.into(),
            messages,
            stream: false,
            tools: None,
            max_tokens: DEFAULT_MAX_TOKENS,
            options: GenerationOptions::default(),
        }
    }

    #[must_use]
    pub fn stream(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }

    #[must_use]
    pub fn tools(mut self, tools: Vec<ToolSchema>) -> Self {
        self.tools = Some(tools);
        self
    }

    #[must_use]
    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    #[must_use]
    pub fn options(mut self, options: GenerationOptions) -> Self {
        self.options = options;
        self
    }

    #[must_use]
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.options.temperature = Some(temperature);
        self
    }

    #[must_use]
    pub fn top_p(mut self, top_p: f32) -> Self {
        self.options.top_p = Some(top_p);
        self
    }
}

/// Result of [`ModelAdapter::generate`]
///
/// Which variant comes back depends on [`GenerateParams::stream`].
#[derive(Debug)]
pub enum Generation {
    /// Complete text of a blocking call
    Text(String),

    /// Fragments of a streamed call
    Stream(TextStream),
}

impl Generation {
    /// Resolve to the full text, draining the stream if there is one
    ///
    /// # Errors
    ///
    /// Returns the first error of a streamed generation
    pub async fn into_text(self) -> Result<String> {
        match self {
            Self::Text(text) => Ok(text),
            Self::Stream(stream) => stream.collect_text().await,
        }
    }

    #[must_use]
    pub fn into_stream(self) -> TextStream {
        match self {
            Self::Text(text) => TextStream::from_fragments([text]),
            Self::Stream(stream) => stream,
        }
    }
}

/// Contract shared by provider adapters
#[async_trait]
pub trait ModelAdapter: Send + Sync {
    /// Provider name (e.g., "anthropic")
    fn provider(&self) -> &str;

    /// Generate a completion
    ///
    /// With `params.stream` set this delegates to
    /// [`ModelAdapter::generate_stream`] and returns [`Generation::Stream`].
    async fn generate(&self, params: GenerateParams) -> Result<Generation>;

    /// Generate a completion as a stream of text fragments
    async fn generate_stream(&self, params: GenerateParams) -> Result<TextStream>;
}
