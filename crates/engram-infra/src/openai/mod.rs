//! OpenAI-compatible providers for embedding, summarization, and chat.
//!
//! All three share the async-openai client and accept a configurable
//! `base_url`, so DeepSeek, OpenAI, or a self-hosted proxy all work.

use async_openai::Client;
use async_openai::config::OpenAIConfig;
use async_openai::types::chat::{
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
};
use async_openai::types::embeddings::{CreateEmbeddingRequestArgs, EmbeddingInput};
use engram_core::compression::Summarizer;
use engram_core::embedding::EmbeddingProvider;
use engram_core::turn::ChatModel;
use engram_types::error::{CompletionFailure, EmbeddingUnavailable, SummarizationFailure};
use tracing::debug;

pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";
pub const DEFAULT_CHAT_MODEL: &str = "gpt-4o-mini";

/// Sampling temperature for summarization: low, the output should be
/// faithful rather than creative.
const SUMMARY_TEMPERATURE: f32 = 0.3;

fn make_client(base_url: Option<&str>, api_key: Option<&str>) -> Client<OpenAIConfig> {
    let api_key = api_key
        .map(String::from)
        .or_else(|| std::env::var("OPENAI_API_KEY").ok())
        .unwrap_or_default();

    let config = match base_url {
        Some(url) => OpenAIConfig::new().with_api_base(url).with_api_key(api_key),
        None => OpenAIConfig::new().with_api_key(api_key),
    };
    Client::with_config(config)
}

/// Embeddings via the OpenAI-compatible `/embeddings` endpoint.
pub struct OpenAiEmbeddingProvider {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiEmbeddingProvider {
    pub fn new(base_url: Option<&str>, model: &str, api_key: Option<&str>) -> Self {
        Self {
            client: make_client(base_url, api_key),
            model: model.to_string(),
        }
    }
}

impl EmbeddingProvider for OpenAiEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingUnavailable> {
        let request = CreateEmbeddingRequestArgs::default()
            .model(&self.model)
            .input(EmbeddingInput::String(text.to_string()))
            .build()
            .map_err(|e| EmbeddingUnavailable(e.to_string()))?;

        let response = self
            .client
            .embeddings()
            .create(request)
            .await
            .map_err(|e| EmbeddingUnavailable(e.to_string()))?;

        response
            .data
            .into_iter()
            .next()
            .map(|e| e.embedding)
            .ok_or_else(|| EmbeddingUnavailable("empty embedding response".to_string()))
    }
}

/// Summarization via a chat completion with a compression prompt.
pub struct OpenAiSummarizer {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiSummarizer {
    pub fn new(base_url: Option<&str>, model: &str, api_key: Option<&str>) -> Self {
        Self {
            client: make_client(base_url, api_key),
            model: model.to_string(),
        }
    }
}

impl Summarizer for OpenAiSummarizer {
    async fn summarize(
        &self,
        text: &str,
        target_ratio: f32,
    ) -> Result<String, SummarizationFailure> {
        let system = format!(
            "You condense conversation history. Compress the given text to \
             roughly 1/{target_ratio:.0} of its length. Preserve named \
             entities, decisions made, and open questions. Output only the \
             condensed text."
        );

        let messages = vec![
            ChatCompletionRequestMessage::System(
                ChatCompletionRequestSystemMessageArgs::default()
                    .content(system)
                    .build()
                    .map_err(|e| SummarizationFailure(e.to_string()))?,
            ),
            ChatCompletionRequestMessage::User(
                ChatCompletionRequestUserMessageArgs::default()
                    .content(text.to_string())
                    .build()
                    .map_err(|e| SummarizationFailure(e.to_string()))?,
            ),
        ];

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .temperature(SUMMARY_TEMPERATURE)
            .messages(messages)
            .build()
            .map_err(|e| SummarizationFailure(e.to_string()))?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e| SummarizationFailure(e.to_string()))?;

        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();
        if content.trim().is_empty() {
            return Err(SummarizationFailure("empty summary response".to_string()));
        }

        debug!(
            input_chars = text.len(),
            output_chars = content.len(),
            "summarization complete"
        );
        Ok(content)
    }
}

/// Chat completions answering user turns against the assembled context.
pub struct OpenAiChatModel {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiChatModel {
    pub fn new(base_url: Option<&str>, model: &str, api_key: Option<&str>) -> Self {
        Self {
            client: make_client(base_url, api_key),
            model: model.to_string(),
        }
    }
}

impl ChatModel for OpenAiChatModel {
    async fn complete(&self, context: &str, user_text: &str) -> Result<String, CompletionFailure> {
        let messages = vec![
            ChatCompletionRequestMessage::System(
                ChatCompletionRequestSystemMessageArgs::default()
                    .content(context.to_string())
                    .build()
                    .map_err(|e| CompletionFailure(e.to_string()))?,
            ),
            ChatCompletionRequestMessage::User(
                ChatCompletionRequestUserMessageArgs::default()
                    .content(user_text.to_string())
                    .build()
                    .map_err(|e| CompletionFailure(e.to_string()))?,
            ),
        ];

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .build()
            .map_err(|e| CompletionFailure(e.to_string()))?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e| CompletionFailure(e.to_string()))?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| CompletionFailure("empty completion response".to_string()))
    }
}
