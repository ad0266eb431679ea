//! Anthropic API streaming handler
//!
//! Turns the Server-Sent Events of a streamed Messages API response into
//! the text fragments of its text channel, in arrival order.

use crate::{
    error::{LlmError, Result},
    services::Usage,
};

use super::{AnthropicStreamEvent, ContentBlockStart, ContentDelta, SseEvent, SseParser};

/// Handler for Anthropic streaming responses
#[derive(Debug, Default)]
pub struct AnthropicStreamHandler {
    parser: SseParser,

    /// Message id from `message_start`
    message_id: Option<String>,

    /// Accumulated usage statistics
    usage: Usage,

    stop_reason: Option<String>,

    /// Number of text fragments produced so far
    fragments: usize,

    /// Set once `message_stop` is seen
    done: bool,
}

impl AnthropicStreamHandler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Process a chunk of the response body
    ///
    /// Returns the text fragments completed by this chunk. Processing stops at
    /// the first error, which is returned as the last item, and everything
    /// after `message_stop` is ignored.
    pub fn process_chunk(&mut self, chunk: &[u8]) -> Vec<Result<String>> {
        if self.done {
            return Vec::new();
        }

        match self.parser.push(chunk) {
            Ok(events) => self.process_events(events),
            Err(e) => vec![Err(e)],
        }
    }

    /// Signal the end of the response body
    ///
    /// Returns fragments from a trailing event that was never terminated by a
    /// blank line.
    pub fn finish(&mut self) -> Vec<Result<String>> {
        if self.done {
            return Vec::new();
        }

        match self.parser.finish() {
            Ok(event) => self.process_events(event),
            Err(e) => vec![Err(e)],
        }
    }

    fn process_events(&mut self, events: impl IntoIterator<Item = SseEvent>) -> Vec<Result<String>> {
        let mut out = Vec::new();

        for event in events {
            match self.process_event(&event) {
                Ok(Some(text)) => {
                    self.fragments += 1;
                    out.push(Ok(text));
                }
                Ok(None) => {}
                Err(e) => {
                    out.push(Err(e));
                    break;
                }
            }

            if self.done {
                break;
            }
        }

        out
    }

    /// Process a single SSE event, returning its text if it carries any
    fn process_event(&mut self, event: &SseEvent) -> Result<Option<String>> {
        let stream_event: AnthropicStreamEvent = serde_json::from_str(&event.data)?;

        match stream_event {
            AnthropicStreamEvent::MessageStart { message } => {
                tracing::trace!(id = %message.id, model = %message.model, "Stream started");
                self.message_id = Some(message.id);
                if let Some(usage) = message.usage {
                    self.usage = usage;
                }
                Ok(None)
            }

            AnthropicStreamEvent::ContentBlockStart {
                content_block: ContentBlockStart::Text { text },
                ..
            } => Ok((!text.is_empty()).then_some(text)),

            AnthropicStreamEvent::ContentBlockDelta {
                delta: ContentDelta::TextDelta { text },
                ..
            } => Ok(Some(text)),

            AnthropicStreamEvent::MessageDelta { delta, usage } => {
                if let Some(reason) = delta.stop_reason {
                    self.stop_reason = Some(reason);
                }
                if let Some(output_tokens) = usage.and_then(|u| u.output_tokens) {
                    self.usage.output_tokens = output_tokens;
                }
                Ok(None)
            }

            AnthropicStreamEvent::MessageStop => {
                self.done = true;
                tracing::debug!(
                    id = ?self.message_id,
                    stop_reason = ?self.stop_reason,
                    fragments = self.fragments,
                    input_tokens = self.usage.input_tokens,
                    output_tokens = self.usage.output_tokens,
                    "Stream completed"
                );
                Ok(None)
            }

            AnthropicStreamEvent::Error { error } => Err(LlmError::Stream {
                error_type: error.error_type,
                message: error.message,
            }),

            // tool input, thinking, block boundaries, pings and unknown events
            AnthropicStreamEvent::ContentBlockStart { .. }
            | AnthropicStreamEvent::ContentBlockDelta { .. }
            | AnthropicStreamEvent::ContentBlockStop { .. }
            | AnthropicStreamEvent::Ping
            | AnthropicStreamEvent::Unknown => Ok(None),
        }
    }

    /// Whether `message_stop` has been received
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.done
    }

    #[must_use]
    pub fn usage(&self) -> &Usage {
        &self.usage
    }

    #[must_use]
    pub fn stop_reason(&self) -> Option<&str> {
        self.stop_reason.as_deref()
    }
}
