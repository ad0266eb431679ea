//! Anthropic Messages API client
//!
//! A thin transport: one POST per call, no retries. The adapter talks to it
//! through [`MessagesApi`] so other clients can stand in for it.

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{Stream, StreamExt};
use reqwest::{header, Client, Response};
use serde::{Deserialize, Serialize};

use crate::{
    config::ApiKey,
    error::{LlmError, Result},
    messages::Message,
};

use super::{streaming::AnthropicStreamHandler, TextStream, Usage};

/// Default API endpoint
pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";

/// API version sent with every request
pub const ANTHROPIC_VERSION: &str = "2023-06-01";

const PROVIDER: &str = "anthropic";

/// Request body of `POST /v1/messages`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessagesRequest {
    pub model: String,
    pub max_tokens: u32,
    pub messages: Vec<Message>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,
}

/// Response body of a non-streaming `POST /v1/messages`
#[derive(Debug, Clone, Deserialize)]
pub struct MessagesResponse {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub role: String,
    pub content: Vec<ResponseBlock>,
    #[serde(default)]
    pub stop_reason: Option<String>,
    #[serde(default)]
    pub usage: Option<Usage>,
}

impl MessagesResponse {
    /// Text of the first content block
    ///
    /// # Errors
    ///
    /// Returns an error if there are no blocks or the first one is not text
    pub fn first_text(self) -> Result<String> {
        match self.content.into_iter().next() {
            Some(ResponseBlock::Text { text }) => Ok(text),
            Some(other) => Err(LlmError::UnexpectedContent(other.kind().to_string())),
            None => Err(LlmError::EmptyResponse),
        }
    }
}

/// Content block of a response
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponseBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },
    Thinking {
        #[serde(default)]
        thinking: String,
    },
    #[serde(other)]
    Other,
}

impl ResponseBlock {
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Text { .. } => "text",
            Self::ToolUse { .. } => "tool_use",
            Self::Thinking { .. } => "thinking",
            Self::Other => "other",
        }
    }
}

/// Error envelope returned with non-success statuses
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(rename = "type")]
    error_type: String,
    message: String,
}

/// The two call shapes of the Messages API
#[async_trait]
pub trait MessagesApi: Send + Sync {
    /// One-shot request returning the whole response
    async fn create(&self, request: &MessagesRequest) -> Result<MessagesResponse>;

    /// Streamed request returning the text channel
    async fn stream(&self, request: &MessagesRequest) -> Result<TextStream>;
}

/// HTTP client for the Anthropic Messages API
#[derive(Debug, Clone)]
pub struct AnthropicClient {
    http: Client,
    api_key: Option<ApiKey>,
    base_url: String,
}

impl AnthropicClient {
    /// Create a client bound to `base_url`, or the public endpoint if `None`
    ///
    /// A missing key is not an error here; requests fail with
    /// [`LlmError::MissingApiKey`] instead.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built
    pub fn new(api_key: Option<ApiKey>, base_url: Option<&str>) -> Result<Self> {
        let base_url = base_url
            .unwrap_or(DEFAULT_BASE_URL)
            .trim_end_matches('/')
            .to_string();

        let http = Client::builder()
            .default_headers({
                let mut headers = header::HeaderMap::new();
                headers.insert(
                    "anthropic-version",
                    header::HeaderValue::from_static(ANTHROPIC_VERSION),
                );
                headers
            })
            .build()?;

        Ok(Self {
            http,
            api_key,
            base_url,
        })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/messages", self.base_url)
    }

    /// Send a request and return the response if it succeeded
    async fn send(&self, request: &MessagesRequest) -> Result<Response> {
        let api_key = self.api_key.as_ref().ok_or_else(|| LlmError::MissingApiKey {
            provider: PROVIDER.to_string(),
        })?;

        let key = header::HeaderValue::from_str(api_key.expose())
            .map_err(|_| LlmError::InvalidConfig("Invalid API key format".to_string()))?;

        let response = self
            .http
            .post(self.endpoint())
            .header("x-api-key", key)
            .json(request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::api_error(response).await);
        }

        Ok(response)
    }

    /// Build an error from a non-success response
    async fn api_error(response: Response) -> LlmError {
        let status = response.status();
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => return LlmError::Http(e),
        };

        let (error_type, message) = match serde_json::from_str::<ErrorEnvelope>(&body) {
            Ok(envelope) => (envelope.error.error_type, envelope.error.message),
            Err(_) => ("http_error".to_string(), body),
        };

        tracing::debug!(status = status.as_u16(), %error_type, "Anthropic API error");

        LlmError::Api {
            status: status.as_u16(),
            error_type,
            message,
        }
    }

    /// Turn a streamed response body into text fragments
    ///
    /// The returned stream owns the body; dropping it closes the connection.
    fn text_stream(
        byte_stream: impl Stream<Item = reqwest::Result<Bytes>> + Send + 'static,
    ) -> impl Stream<Item = Result<String>> + Send + 'static {
        async_stream::stream! {
            let mut handler = AnthropicStreamHandler::new();
            let mut byte_stream = Box::pin(byte_stream);

            loop {
                let items = match byte_stream.next().await {
                    Some(Ok(bytes)) => handler.process_chunk(&bytes),
                    Some(Err(e)) => vec![Err(LlmError::Network(e.to_string()))],
                    None => {
                        for item in handler.finish() {
                            yield item;
                        }
                        break;
                    }
                };

                let mut failed = false;
                for item in items {
                    failed = item.is_err();
                    yield item;
                }
                if failed || handler.is_done() {
                    break;
                }
            }
        }
    }
}

#[async_trait]
impl MessagesApi for AnthropicClient {
    async fn create(&self, request: &MessagesRequest) -> Result<MessagesResponse> {
        let request = MessagesRequest {
            stream: None,
            ..request.clone()
        };
        let response = self.send(&request).await?;
        let body: MessagesResponse = response.json().await?;

        tracing::debug!(
            id = %body.id,
            stop_reason = ?body.stop_reason,
            blocks = body.content.len(),
            "Received Anthropic response"
        );

        Ok(body)
    }

    async fn stream(&self, request: &MessagesRequest) -> Result<TextStream> {
        let request = MessagesRequest {
            stream: Some(true),
            ..request.clone()
        };
        let response = self.send(&request).await?;

        Ok(TextStream::new(Self::text_stream(response.bytes_stream())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_request_omits_absent_fields() {
        let request = MessagesRequest {
            model: "claude-3".to_string(),
            max_tokens: 100,
            messages: vec![Message::user("Hi")],
            system: None,
            temperature: None,
            top_p: None,
            stream: None,
        };

        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({
                "model": "claude-3",
                "max_tokens": 100,
                "messages": [{"role": "user", "content": "Hi"}]
            })
        );
    }

    #[test]
    fn test_first_text() {
        let response: MessagesResponse = serde_json::from_value(json!({
            "id": "msg_1",
            "type": "message",
            "role": "assistant",
            "model": "claude-3",
            "content": [
                {"type": "text", "text": "first"},
                {"type": "text", "text": "second"}
            ],
            "stop_reason": "end_turn",
            "usage": {"input_tokens": 3, "output_tokens": 2}
        }))
        .unwrap();

        assert_eq!(response.usage, Some(Usage { input_tokens: 3, output_tokens: 2 }));
        assert_eq!(response.first_text().unwrap(), "first");
    }

    #[test]
    fn test_first_text_errors() {
        let empty: MessagesResponse = serde_json::from_value(json!({"content": []})).unwrap();
        assert!(matches!(empty.first_text(), Err(LlmError::EmptyResponse)));

        let tool_first: MessagesResponse = serde_json::from_value(json!({
            "content": [
                {"type": "tool_use", "id": "toolu_1", "name": "search", "input": {}},
                {"type": "text", "text": "later"}
            ]
        }))
        .unwrap();
        match tool_first.first_text() {
            Err(LlmError::UnexpectedContent(kind)) => assert_eq!(kind, "tool_use"),
            other => panic!("Expected unexpected content, got {other:?}"),
        }

        let unknown: MessagesResponse =
            serde_json::from_value(json!({"content": [{"type": "server_tool_use"}]})).unwrap();
        assert_eq!(unknown.content, [ResponseBlock::Other]);
    }

    #[test]
    fn test_base_url_normalization() {
        let client = AnthropicClient::new(None, Some("http://localhost:8080/")).unwrap();
        assert_eq!(client.base_url(), "http://localhost:8080");
        assert_eq!(client.endpoint(), "http://localhost:8080/v1/messages");

        let client = AnthropicClient::new(None, None).unwrap();
        assert_eq!(client.base_url(), DEFAULT_BASE_URL);
    }

    #[tokio::test]
    async fn test_missing_key_fails_at_call_time() {
        let client = AnthropicClient::new(None, Some("http://127.0.0.1:9")).unwrap();
        let request = MessagesRequest {
            model: "claude-3".to_string(),
            max_tokens: 10,
            messages: vec![Message::user("Hi")],
            system: None,
            temperature: None,
            top_p: None,
            stream: None,
        };

        let err = client.create(&request).await.unwrap_err();
        assert!(matches!(err, LlmError::MissingApiKey { .. }));

        let err = client.stream(&request).await.unwrap_err();
        assert!(matches!(err, LlmError::MissingApiKey { .. }));
    }

    #[tokio::test]
    async fn test_text_stream_from_bytes() {
        let body = concat!(
            "event: message_start\n",
            "data: {\"type\":\"message_start\",\"message\":{\"id\":\"msg_1\",\"model\":\"claude-3\",\"usage\":{\"input_tokens\":1,\"output_tokens\":0}}}\n\n",
            "event: content_block_delta\n",
            "data: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\"Hel\"}}\n\n",
            "event: content_block_delta\n",
            "data: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\"lo\"}}\n\n",
            "event: message_stop\n",
            "data: {\"type\":\"message_stop\"}\n\n",
        );
        let chunks: Vec<reqwest::Result<Bytes>> = body
            .as_bytes()
            .chunks(7)
            .map(|c| Ok(Bytes::copy_from_slice(c)))
            .collect();

        let fragments: Vec<String> = AnthropicClient::text_stream(futures::stream::iter(chunks))
            .map(|r| r.unwrap())
            .collect()
            .await;
        assert_eq!(fragments, ["Hel", "lo"]);
    }
}
