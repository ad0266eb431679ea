//! Streaming support for Anthropic responses
//!
//! Bytes from the HTTP body go through [`SseParser`], the resulting events
//! through [`AnthropicStreamHandler`], and the extracted text reaches callers
//! as a [`TextStream`].

pub mod anthropic_stream;
pub mod sse_parser;
pub mod text_stream;

pub use anthropic_stream::AnthropicStreamHandler;
pub use sse_parser::{SseEvent, SseParser};
pub use text_stream::TextStream;

use serde::Deserialize;

use crate::services::Usage;

/// Stream event types for the Anthropic Messages API
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AnthropicStreamEvent {
    /// Initial message metadata
    MessageStart { message: MessageMetadata },

    /// Start of a content block
    ContentBlockStart {
        index: usize,
        content_block: ContentBlockStart,
    },

    /// Delta update for content block
    ContentBlockDelta { index: usize, delta: ContentDelta },

    /// End of a content block
    ContentBlockStop { index: usize },

    /// Message-level delta (usage, stop reason)
    MessageDelta {
        delta: MessageDeltaData,
        #[serde(default)]
        usage: Option<UsageDelta>,
    },

    /// End of message stream
    MessageStop,

    /// Keepalive
    Ping,

    /// Error delivered in-band
    Error { error: ErrorData },

    /// Event types added to the API after this was written
    #[serde(other)]
    Unknown,
}

/// Message metadata from the `message_start` event
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MessageMetadata {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub usage: Option<Usage>,
}

/// Content block start data
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlockStart {
    Text {
        #[serde(default)]
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
    },
    Thinking {
        #[serde(default)]
        thinking: String,
    },
    #[serde(other)]
    Other,
}

/// Content delta types
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentDelta {
    TextDelta { text: String },
    InputJsonDelta { partial_json: String },
    ThinkingDelta { thinking: String },
    #[serde(other)]
    Other,
}

/// Message delta data
#[derive(Debug, Clone, Deserialize)]
pub struct MessageDeltaData {
    #[serde(default)]
    pub stop_reason: Option<String>,
    #[serde(default)]
    pub stop_sequence: Option<String>,
}

/// Usage delta for streaming
#[derive(Debug, Clone, Deserialize)]
pub struct UsageDelta {
    #[serde(default)]
    pub output_tokens: Option<u32>,
}

/// Error payload of an `error` event
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorData {
    #[serde(rename = "type")]
    pub error_type: String,
    pub message: String,
}
