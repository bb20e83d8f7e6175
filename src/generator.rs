//! # Answer generator
//!
//! Chat-completion client invoked only when both cache lookups miss. The
//! generator produces text and nothing else; persisting the new pair is the
//! retrieval engine's job.

use async_openai::{
    Client,
    config::OpenAIConfig,
    types::chat::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessage,
        ChatCompletionRequestSystemMessageContent, ChatCompletionRequestUserMessage,
        ChatCompletionRequestUserMessageContent, CreateChatCompletionRequestArgs,
    },
};
use async_trait::async_trait;
use tracing::debug;

use crate::config::MistConfig;
use crate::error::MistError;

/// Produces a natural-language answer from a raw question.
///
/// Failures are [`MistError::Generator`]. Implementations must never touch
/// the answer store.
#[async_trait]
pub trait AnswerGenerator: Send + Sync {
    async fn generate(&self, question: &str) -> Result<String, MistError>;
}

/// OpenAI-compatible chat completion generator.
pub struct ChatGenerator {
    client: Client<OpenAIConfig>,
    model: String,
    system_prompt: Option<String>,
}

impl ChatGenerator {
    /// Build a generator from the application configuration.
    pub fn new(config: &MistConfig) -> Self {
        let openai_config = OpenAIConfig::new()
            .with_api_key(config.api_key.clone())
            .with_api_base(config.api_base.clone());

        Self {
            client: Client::with_config(openai_config),
            model: config.model.clone(),
            system_prompt: config.system_prompt.clone(),
        }
    }
}

#[async_trait]
impl AnswerGenerator for ChatGenerator {
    async fn generate(&self, question: &str) -> Result<String, MistError> {
        let mut messages: Vec<ChatCompletionRequestMessage> = Vec::new();

        if let Some(prompt) = &self.system_prompt {
            messages.push(ChatCompletionRequestMessage::System(
                ChatCompletionRequestSystemMessage {
                    content: ChatCompletionRequestSystemMessageContent::Text(prompt.clone()),
                    name: None,
                },
            ));
        }

        messages.push(ChatCompletionRequestMessage::User(
            ChatCompletionRequestUserMessage {
                content: ChatCompletionRequestUserMessageContent::Text(question.to_string()),
                name: None,
            },
        ));

        let request = CreateChatCompletionRequestArgs::default()
            .model(self.model.clone())
            .messages(messages)
            .build()
            .map_err(|e| MistError::Generator(e.to_string()))?;

        debug!("Sending request: {:?}", request);

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e| MistError::Generator(e.to_string()))?;

        let mut answer = String::new();
        response.choices.iter().for_each(|chat_choice| {
            if let Some(ref content) = chat_choice.message.content {
                answer.push_str(content);
            }
        });

        if answer.is_empty() {
            return Err(MistError::Generator(
                "completion contained no text".to_string(),
            ));
        }

        Ok(answer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    fn mock_config(api_base: String) -> MistConfig {
        MistConfig {
            api_key: "mock_api_key".to_string(),
            api_base,
            model: "campus-model".to_string(),
            system_prompt: Some("You are Mist, a helpful campus assistant.".to_string()),
            embedding_api_key: None,
            embedding_model: "gemini-embedding-001".to_string(),
            embedding_dimension: 4,
            embedding_api_url: None,
            answers_db_url: "answers.db".to_string(),
            similarity_threshold: 0.80,
            index_ttl_seconds: None,
            backfill_batch_size: 50,
        }
    }

    #[tokio::test]
    async fn generates_answer_from_chat_completion() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/v1/chat/completions");
                then.status(200).json_body(serde_json::json!({
                    "id": "cmpl-1",
                    "object": "chat.completion",
                    "created": 0,
                    "model": "campus-model",
                    "choices": [{
                        "index": 0,
                        "message": {
                            "role": "assistant",
                            "content": "The library opens at 8am."
                        },
                        "finish_reason": "stop"
                    }]
                }));
            })
            .await;

        let config = mock_config(format!("{}/v1", server.base_url()));
        let generator = ChatGenerator::new(&config);

        let answer = generator
            .generate("When does the library open?")
            .await
            .unwrap();
        assert_eq!(answer, "The library opens at 8am.");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn transport_failure_is_a_generator_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/v1/chat/completions");
                then.status(500).body("quota exceeded");
            })
            .await;

        let config = mock_config(format!("{}/v1", server.base_url()));
        let generator = ChatGenerator::new(&config);

        let err = generator.generate("anything").await.unwrap_err();
        assert!(matches!(err, MistError::Generator(_)));
    }
}
