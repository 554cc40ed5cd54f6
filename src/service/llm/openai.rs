//! Thin wrapper around async-openai for chat completions and embeddings.

use std::sync::Arc;
use std::time::Duration;

use async_openai::{
    Client,
    config::OpenAIConfig,
    error::OpenAIError,
    types::{
        ChatCompletionRequestAssistantMessage, ChatCompletionRequestAssistantMessageContent, ChatCompletionRequestMessage, ChatCompletionRequestSystemMessage,
        ChatCompletionRequestSystemMessageContent, ChatCompletionRequestUserMessage, ChatCompletionRequestUserMessageContent, CreateChatCompletionRequestArgs, CreateEmbeddingRequestArgs,
    },
};
use async_trait::async_trait;
use tokio::time::timeout;
use tracing::{debug, instrument};

use crate::base::{
    config::Config,
    types::{Role, Turn},
};

use super::{GenericLlmClient, LlmClient, LlmError, MAX_RATE_LIMIT_RETRIES, with_rate_limit_retry};

// Extra methods on `LlmClient` applied by the openai implementation.

impl LlmClient {
    pub fn openai(config: &Config) -> Self {
        let client = OpenAiLlmClient::new(config);
        Self { inner: Arc::new(client) }
    }
}

// Specific implementations.

/// OpenAI LLM client implementation.
#[derive(Clone)]
pub struct OpenAiLlmClient {
    client: Client<OpenAIConfig>,
    embedding_model: String,
    temperature: f32,
    max_tokens: u32,
    request_timeout: Duration,
}

impl OpenAiLlmClient {
    /// Create a new OpenAI LLM client.
    #[instrument(name = "OpenAiLlmClient::new", skip_all)]
    pub fn new(config: &Config) -> Self {
        let cfg = OpenAIConfig::new().with_api_key(config.openai_api_key.clone());

        Self {
            client: Client::with_config(cfg),
            embedding_model: config.openai_embedding_model.clone(),
            temperature: config.openai_temperature,
            max_tokens: config.openai_max_tokens,
            request_timeout: Duration::from_secs(config.request_timeout_secs),
        }
    }

    /// A single chat-completion attempt, bounded by the request timeout.
    async fn create_completion(&self, model: &str, turns: &[Turn]) -> Result<String, LlmError> {
        let messages = turns.iter().map(to_request_message).collect::<Vec<_>>();

        let request = CreateChatCompletionRequestArgs::default()
            .model(model)
            .messages(messages)
            .temperature(self.temperature)
            .max_completion_tokens(self.max_tokens)
            .build()
            .map_err(|e| LlmError::Backend(e.to_string()))?;

        let response = timeout(self.request_timeout, self.client.chat().create(request))
            .await
            .map_err(|_| LlmError::Backend(format!("chat completion timed out after {} seconds", self.request_timeout.as_secs())))?
            .map_err(classify_openai_error)?;

        let content = response.choices.first().and_then(|choice| choice.message.content.clone()).unwrap_or_default();

        Ok(content.trim().to_string())
    }
}

#[async_trait]
impl GenericLlmClient for OpenAiLlmClient {
    #[instrument(skip(self, turns))]
    async fn chat_completion(&self, model: &str, turns: &[Turn]) -> Result<String, LlmError> {
        debug!("Generating completion from {} turns", turns.len());

        with_rate_limit_retry(MAX_RATE_LIMIT_RETRIES, |attempt| {
            if attempt > 0 {
                debug!("Chat completion retry {attempt}/{MAX_RATE_LIMIT_RETRIES}");
            }

            self.create_completion(model, turns)
        })
        .await
    }

    #[instrument(skip(self, text))]
    async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        let request = CreateEmbeddingRequestArgs::default()
            .model(&self.embedding_model)
            .input(text)
            .build()
            .map_err(|e| LlmError::Backend(e.to_string()))?;

        let response = timeout(self.request_timeout, self.client.embeddings().create(request))
            .await
            .map_err(|_| LlmError::Backend(format!("embedding timed out after {} seconds", self.request_timeout.as_secs())))?
            .map_err(|e| LlmError::Backend(e.to_string()))?;

        let embedding = response
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| LlmError::Backend("embedding response contained no data".to_string()))?;

        Ok(embedding)
    }
}

/// Map a turn to the OpenAI request message for its role.
fn to_request_message(turn: &Turn) -> ChatCompletionRequestMessage {
    match turn.role {
        Role::System => ChatCompletionRequestMessage::System(ChatCompletionRequestSystemMessage {
            content: ChatCompletionRequestSystemMessageContent::Text(turn.content.clone()),
            name: None,
        }),
        Role::User => ChatCompletionRequestMessage::User(ChatCompletionRequestUserMessage {
            content: ChatCompletionRequestUserMessageContent::Text(turn.content.clone()),
            name: None,
        }),
        Role::Assistant => ChatCompletionRequestMessage::Assistant(ChatCompletionRequestAssistantMessage {
            content: Some(ChatCompletionRequestAssistantMessageContent::Text(turn.content.clone())),
            ..Default::default()
        }),
    }
}

/// Classify an OpenAI error: rate-limit signals become `RateLimited` for the
/// retry policy, everything else is a terminal backend error.
fn classify_openai_error(err: OpenAIError) -> LlmError {
    match &err {
        OpenAIError::ApiError(api) => {
            let code = api.code.as_deref().unwrap_or_default().to_ascii_lowercase();
            let kind = api.r#type.as_deref().unwrap_or_default().to_ascii_lowercase();
            let message = api.message.to_ascii_lowercase();

            if code.contains("rate_limit") || kind.contains("rate") || message.contains("rate limit") || message.contains("429") {
                LlmError::RateLimited
            } else {
                LlmError::Backend(err.to_string())
            }
        }
        _ => LlmError::Backend(err.to_string()),
    }
}

// Tests.

#[cfg(test)]
mod tests {
    use async_openai::error::ApiError;

    use super::*;

    fn api_error(message: &str, kind: Option<&str>, code: Option<&str>) -> OpenAIError {
        OpenAIError::ApiError(ApiError {
            message: message.to_string(),
            r#type: kind.map(str::to_string),
            param: None,
            code: code.map(str::to_string),
        })
    }

    #[test]
    fn rate_limit_api_errors_are_classified_for_retry() {
        let by_code = api_error("slow down", None, Some("rate_limit_exceeded"));
        assert!(matches!(classify_openai_error(by_code), LlmError::RateLimited));

        let by_type = api_error("slow down", Some("rate_limit_error"), None);
        assert!(matches!(classify_openai_error(by_type), LlmError::RateLimited));

        let by_message = api_error("Rate limit reached for requests", None, None);
        assert!(matches!(classify_openai_error(by_message), LlmError::RateLimited));
    }

    #[test]
    fn other_api_errors_are_terminal() {
        let err = api_error("invalid api key", Some("invalid_request_error"), Some("invalid_api_key"));
        assert!(matches!(classify_openai_error(err), LlmError::Backend(_)));
    }

    #[test]
    fn turns_map_to_their_wire_roles() {
        let system = to_request_message(&Turn::system("s"));
        assert!(matches!(system, ChatCompletionRequestMessage::System(_)));

        let user = to_request_message(&Turn::user("u"));
        assert!(matches!(user, ChatCompletionRequestMessage::User(_)));

        let assistant = to_request_message(&Turn::assistant("a"));
        assert!(matches!(assistant, ChatCompletionRequestMessage::Assistant(_)));
    }
}
