//! Server-Sent Events (SSE) parser
//!
//! Incremental parser following the W3C event-stream format:
//! https://html.spec.whatwg.org/multipage/server-sent-events.html
//!
//! Input is raw bytes so that chunk boundaries may fall anywhere, including
//! inside a multi-byte UTF-8 sequence.

use crate::error::{LlmError, Result};

/// SSE event
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SseEvent {
    /// Event type (e.g., "message_start", "content_block_delta")
    pub event_type: Option<String>,

    /// Event data (JSON payload for Anthropic streams)
    pub data: String,

    /// Event ID
    pub id: Option<String>,
}

/// Incremental SSE parser
#[derive(Debug, Default)]
pub struct SseParser {
    /// Event being assembled
    current: SseEvent,

    /// Whether any `data` field was seen for the current event
    has_data: bool,

    /// Bytes of the trailing, not yet terminated line
    pending: Vec<u8>,
}

impl SseParser {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed bytes to the parser and return every event they complete
    ///
    /// # Errors
    ///
    /// Returns an error if a complete line is not valid UTF-8
    pub fn push(&mut self, chunk: &[u8]) -> Result<Vec<SseEvent>> {
        self.pending.extend_from_slice(chunk);

        let mut events = Vec::new();
        let mut start = 0;
        while let Some(offset) = self.pending[start..].iter().position(|&b| b == b'\n') {
            let end = start + offset;
            let line = decode_line(&self.pending[start..end])?;
            if let Some(event) = self.process_line(&line) {
                events.push(event);
            }
            start = end + 1;
        }
        self.pending.drain(..start);

        Ok(events)
    }

    /// Terminate the input, returning a final event left without a blank line
    ///
    /// # Errors
    ///
    /// Returns an error if the trailing bytes are not valid UTF-8
    pub fn finish(&mut self) -> Result<Option<SseEvent>> {
        if !self.pending.is_empty() {
            let line = decode_line(&std::mem::take(&mut self.pending))?;
            self.process_line(&line);
        }
        Ok(self.take_event())
    }

    fn process_line(&mut self, line: &str) -> Option<SseEvent> {
        if line.is_empty() {
            return self.take_event();
        }

        // comment
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "event" => self.current.event_type = Some(value.to_string()),
            "data" => {
                if self.has_data {
                    self.current.data.push('\n');
                }
                self.current.data.push_str(value);
                self.has_data = true;
            }
            "id" => self.current.id = Some(value.to_string()),
            // retry and unknown fields carry nothing we act on
            _ => {}
        }

        None
    }

    /// Dispatch the current event if it carries data, resetting either way
    fn take_event(&mut self) -> Option<SseEvent> {
        let event = std::mem::take(&mut self.current);
        let dispatch = std::mem::take(&mut self.has_data);
        dispatch.then_some(event)
    }
}

fn decode_line(bytes: &[u8]) -> Result<String> {
    let line = std::str::from_utf8(bytes)
        .map_err(|e| LlmError::Network(format!("Invalid UTF-8 in stream: {e}")))?;
    Ok(line.strip_suffix('\r').unwrap_or(line).to_string())
}
