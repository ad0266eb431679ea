//! Anthropic Claude adapter
//!
//! Maps provider-agnostic messages onto the Messages API: system messages
//! move to the top-level `system` field, the remaining turns are forwarded
//! in order, and only `temperature` and `top_p` travel with the request.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::{
    config::{resolve_credential, Settings},
    error::Result,
    messages::Message,
    storage::{create_storage, Storage},
};

use super::{
    client::{AnthropicClient, MessagesApi, MessagesRequest},
    GenerateParams, Generation, ModelAdapter, TextStream,
};

/// Content of the user turn sent when a conversation has no turns at all
pub const FALLBACK_USER_CONTENT: &str = "Hello";

/// Construction arguments for [`AnthropicLlm`]
#[derive(Debug, Clone, Default)]
pub struct AnthropicLlmConfig {
    /// Explicit API key, preferred over configured keys
    pub api_key: Option<String>,

    /// Caller-scoped key; stored but not used for requests
    pub user_api_key: Option<String>,

    /// Custom API endpoint
    pub base_url: Option<String>,
}

/// Messages split into the system instruction and the conversational turns
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partitioned {
    pub system: Option<String>,
    pub messages: Vec<Message>,
}

/// Split off the system instruction
///
/// The last system message wins. Other messages keep their order; if none
/// remain, a single `"Hello"` user turn stands in.
#[must_use]
pub fn partition_messages(messages: &[Message]) -> Partitioned {
    let mut system = None;
    let mut turns = Vec::with_capacity(messages.len());

    for message in messages {
        if message.is_system() {
            system = Some(message.content.clone());
        } else {
            turns.push(message.clone());
        }
    }

    if turns.is_empty() {
        turns.push(Message::user(FALLBACK_USER_CONTENT));
    }

    Partitioned {
        system,
        messages: turns,
    }
}

/// Build the Messages API request for `params`
///
/// An empty system instruction is not attached.
#[must_use]
pub fn build_request(params: &GenerateParams) -> MessagesRequest {
    let Partitioned { system, messages } = partition_messages(&params.messages);

    MessagesRequest {
        model: params.model.clone(),
        max_tokens: params.max_tokens,
        messages,
        system: system.filter(|s| !s.is_empty()),
        temperature: params.options.temperature,
        top_p: params.options.top_p,
        stream: None,
    }
}

/// Anthropic provider adapter
pub struct AnthropicLlm {
    client: Arc<dyn MessagesApi>,
    user_api_key: Option<String>,
    storage: Arc<dyn Storage>,
}

impl AnthropicLlm {
    /// Create an adapter backed by the HTTP client
    ///
    /// The key is resolved from `config.api_key`, then
    /// `settings.anthropic_api_key`, then `settings.api_key`. A missing key
    /// only surfaces when a request is made.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built
    pub fn new(config: AnthropicLlmConfig, settings: &Settings) -> Result<Self> {
        let api_key = resolve_credential(
            config.api_key.as_deref(),
            settings.anthropic_api_key.as_deref(),
            settings.api_key.as_deref(),
        );
        if api_key.is_none() {
            debug!("No Anthropic API key configured; requests will be rejected");
        }

        let base_url = config
            .base_url
            .as_deref()
            .or(settings.anthropic_base_url.as_deref());
        let client = AnthropicClient::new(api_key, base_url)?;
        debug!(base_url = client.base_url(), "Created Anthropic client");

        Ok(Self {
            client: Arc::new(client),
            user_api_key: config.user_api_key,
            storage: create_storage(&settings.storage),
        })
    }

    /// Create an adapter over any [`MessagesApi`] implementation
    #[must_use]
    pub fn with_client(
        client: Arc<dyn MessagesApi>,
        user_api_key: Option<String>,
        storage: Arc<dyn Storage>,
    ) -> Self {
        Self {
            client,
            user_api_key,
            storage,
        }
    }

    #[must_use]
    pub fn user_api_key(&self) -> Option<&str> {
        self.user_api_key.as_deref()
    }

    /// Content storage handle
    #[must_use]
    pub fn storage(&self) -> Arc<dyn Storage> {
        Arc::clone(&self.storage)
    }

    fn log_request(request: &MessagesRequest, params: &GenerateParams, stream: bool) {
        debug!(
            model = %request.model,
            max_tokens = request.max_tokens,
            input_messages = params.messages.len(),
            forwarded_messages = request.messages.len(),
            has_system = request.system.is_some(),
            tools_ignored = params.tools.as_ref().map_or(0, Vec::len),
            stream,
            "Sending Anthropic request"
        );
    }
}

#[async_trait]
impl ModelAdapter for AnthropicLlm {
    fn provider(&self) -> &str {
        "anthropic"
    }

    async fn generate(&self, params: GenerateParams) -> Result<Generation> {
        if params.stream {
            return self.generate_stream(params).await.map(Generation::Stream);
        }

        let request = build_request(&params);
        Self::log_request(&request, &params, false);

        let response = self.client.create(&request).await?;
        response.first_text().map(Generation::Text)
    }

    async fn generate_stream(&self, params: GenerateParams) -> Result<TextStream> {
        let request = build_request(&params);
        Self::log_request(&request, &params, true);

        self.client.stream(&request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::LlmError,
        services::{client::MessagesResponse, GenerationOptions, ToolSchema},
        storage::LocalStorage,
    };
    use futures::StreamExt;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex,
    };

    /// Records requests and replays canned responses
    struct MockClient {
        response: serde_json::Value,
        fragments: Vec<&'static str>,
        requests: Mutex<Vec<(MessagesRequest, bool)>>,
        releases: Arc<AtomicUsize>,
    }

    impl MockClient {
        fn new(response: serde_json::Value, fragments: Vec<&'static str>) -> Arc<Self> {
            Arc::new(Self {
                response,
                fragments,
                requests: Mutex::new(Vec::new()),
                releases: Arc::new(AtomicUsize::new(0)),
            })
        }

        fn requests(&self) -> Vec<(MessagesRequest, bool)> {
            self.requests.lock().unwrap().clone()
        }

        fn releases(&self) -> usize {
            self.releases.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl MessagesApi for MockClient {
        async fn create(&self, request: &MessagesRequest) -> Result<MessagesResponse> {
            self.requests.lock().unwrap().push((request.clone(), false));
            Ok(serde_json::from_value(self.response.clone())?)
        }

        async fn stream(&self, request: &MessagesRequest) -> Result<TextStream> {
            self.requests.lock().unwrap().push((request.clone(), true));
            let releases = Arc::clone(&self.releases);
            Ok(TextStream::from_fragments(self.fragments.clone()).on_release(move || {
                releases.fetch_add(1, Ordering::SeqCst);
            }))
        }
    }

    /// Fails every call the way the vendor does without a key
    struct RejectingClient;

    #[async_trait]
    impl MessagesApi for RejectingClient {
        async fn create(&self, _request: &MessagesRequest) -> Result<MessagesResponse> {
            Err(LlmError::Api {
                status: 401,
                error_type: "authentication_error".to_string(),
                message: "invalid x-api-key".to_string(),
            })
        }

        async fn stream(&self, _request: &MessagesRequest) -> Result<TextStream> {
            Err(LlmError::Api {
                status: 429,
                error_type: "rate_limit_error".to_string(),
                message: "Number of requests has exceeded your rate limit".to_string(),
            })
        }
    }

    fn text_response(text: &str) -> serde_json::Value {
        json!({
            "id": "msg_1",
            "type": "message",
            "role": "assistant",
            "model": "claude-3",
            "content": [{"type": "text", "text": text}, {"type": "text", "text": "ignored"}],
            "stop_reason": "end_turn"
        })
    }

    fn adapter(client: Arc<dyn MessagesApi>) -> AnthropicLlm {
        let storage = Arc::new(LocalStorage::new(std::env::temp_dir()));
        AnthropicLlm::with_client(client, None, storage)
    }

    #[test]
    fn test_single_system_message_is_detached() {
        let partitioned = partition_messages(&[
            Message::system("Be terse."),
            Message::user("Hi"),
            Message::assistant("Hello!"),
            Message::user("Bye"),
        ]);

        assert_eq!(partitioned.system.as_deref(), Some("Be terse."));
        assert_eq!(
            partitioned.messages,
            vec![
                Message::user("Hi"),
                Message::assistant("Hello!"),
                Message::user("Bye")
            ]
        );
    }

    #[test]
    fn test_last_system_message_wins() {
        let partitioned = partition_messages(&[
            Message::system("first"),
            Message::user("Hi"),
            Message::system("second"),
            Message::system("third"),
        ]);

        assert_eq!(partitioned.system.as_deref(), Some("third"));
        assert_eq!(partitioned.messages, vec![Message::user("Hi")]);
    }

    #[test]
    fn test_system_only_gets_fallback_turn() {
        for messages in [vec![Message::system("Only system")], vec![]] {
            let partitioned = partition_messages(&messages);
            assert_eq!(partitioned.messages, vec![Message::user("Hello")]);
        }
    }

    #[test]
    fn test_build_request_example() {
        let params = GenerateParams::new(
            "claude-3-5-sonnet",
            vec![Message::system("Be terse."), Message::user("Hi")],
        )
        .max_tokens(100);

        assert_eq!(
            serde_json::to_value(build_request(&params)).unwrap(),
            json!({
                "model": "claude-3-5-sonnet",
                "max_tokens": 100,
                "messages": [{"role": "user", "content": "Hi"}],
                "system": "Be terse."
            })
        );
    }

    #[test]
    fn test_build_request_forwards_only_allow_listed_options() {
        let kwargs = json!({"temperature": 0.25, "top_k": 5, "metadata": {"user_id": "u"}});
        let params = GenerateParams::new("claude-3", vec![Message::user("Hi")])
            .options(GenerationOptions::from_kwargs(kwargs.as_object().unwrap()))
            .tools(vec![ToolSchema {
                name: "search".to_string(),
                description: "Search the web".to_string(),
                input_schema: json!({"type": "object"}),
            }]);

        let value = serde_json::to_value(build_request(&params)).unwrap();
        assert_eq!(
            value,
            json!({
                "model": "claude-3",
                "max_tokens": 2048,
                "messages": [{"role": "user", "content": "Hi"}],
                "temperature": 0.25
            })
        );
    }

    #[test]
    fn test_empty_system_instruction_is_not_attached() {
        let params = GenerateParams::new("claude-3", vec![Message::system(""), Message::user("Hi")]);
        assert_eq!(build_request(&params).system, None);
    }

    #[tokio::test]
    async fn test_generate_returns_first_text_block() {
        let client = MockClient::new(text_response("Hi there"), vec![]);
        let llm = adapter(client.clone());

        let params = GenerateParams::new("claude-3", vec![Message::user("Hi")]).top_p(0.5);
        let generation = llm.generate(params).await.unwrap();

        match generation {
            Generation::Text(text) => assert_eq!(text, "Hi there"),
            Generation::Stream(_) => panic!("Expected text"),
        }

        let requests = client.requests();
        assert_eq!(requests.len(), 1);
        let (request, streamed) = &requests[0];
        assert!(!streamed);
        assert_eq!(request.top_p, Some(0.5));
        assert_eq!(request.stream, None);
    }

    #[tokio::test]
    async fn test_generate_with_stream_delegates_to_generate_stream() {
        let client = MockClient::new(text_response("unused"), vec!["Hel", "lo"]);
        let llm = adapter(client.clone());
        let messages = vec![Message::system("Be terse."), Message::user("Hi")];

        let via_generate = match llm
            .generate(GenerateParams::new("claude-3", messages.clone()).stream(true))
            .await
            .unwrap()
        {
            Generation::Stream(stream) => stream.map(|r| r.unwrap()).collect::<Vec<_>>().await,
            Generation::Text(_) => panic!("Expected stream"),
        };
        let direct: Vec<String> = llm
            .generate_stream(GenerateParams::new("claude-3", messages))
            .await
            .unwrap()
            .map(|r| r.unwrap())
            .collect()
            .await;

        assert_eq!(via_generate, direct);
        assert_eq!(direct, ["Hel", "lo"]);

        let requests = client.requests();
        assert_eq!(requests.len(), 2);
        assert!(requests.iter().all(|(_, streamed)| *streamed));
        assert_eq!(requests[0].0, requests[1].0);
        assert_eq!(requests[0].0.system.as_deref(), Some("Be terse."));
    }

    #[tokio::test]
    async fn test_stream_released_after_last_fragment() {
        let client = MockClient::new(text_response("unused"), vec!["Hel", "lo"]);
        let llm = adapter(client.clone());

        let mut stream = llm
            .generate_stream(GenerateParams::new("claude-3", vec![Message::user("Hi")]))
            .await
            .unwrap();

        assert_eq!(stream.next().await.unwrap().unwrap(), "Hel");
        assert_eq!(stream.next().await.unwrap().unwrap(), "lo");
        assert!(stream.next().await.is_none());
        assert_eq!(client.releases(), 1);

        drop(stream);
        assert_eq!(client.releases(), 1);
    }

    #[tokio::test]
    async fn test_stream_released_on_early_abandonment() {
        let client = MockClient::new(text_response("unused"), vec!["Hel", "lo"]);
        let llm = adapter(client.clone());

        let mut stream = llm
            .generate_stream(GenerateParams::new("claude-3", vec![Message::user("Hi")]))
            .await
            .unwrap();
        assert_eq!(stream.next().await.unwrap().unwrap(), "Hel");
        assert_eq!(client.releases(), 0);

        drop(stream);
        assert_eq!(client.releases(), 1);
    }

    #[tokio::test]
    async fn test_vendor_errors_propagate_unchanged() {
        let llm = adapter(Arc::new(RejectingClient));
        let params = GenerateParams::new("claude-3", vec![Message::user("Hi")]);

        let err = llm.generate(params.clone()).await.unwrap_err();
        assert!(err.is_auth_error());

        let err = llm.generate(params.stream(true)).await.unwrap_err();
        assert!(matches!(err, LlmError::Api { status: 429, .. }));
    }

    #[test]
    fn test_new_never_fails_without_key() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let mut settings = Settings::default();
        settings.storage.root = temp_dir.path().to_path_buf();

        let llm = AnthropicLlm::new(
            AnthropicLlmConfig {
                user_api_key: Some("user-key".to_string()),
                ..AnthropicLlmConfig::default()
            },
            &settings,
        )
        .unwrap();

        assert_eq!(llm.provider(), "anthropic");
        assert_eq!(llm.user_api_key(), Some("user-key"));
    }
}
