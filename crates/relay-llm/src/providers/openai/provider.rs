use crate::error::{Error, Result};
use crate::model::{ModelMetadata, ModelPurpose, ModelsMetadata};
use crate::provider::{ProviderAdapter, ProviderError, ProviderSummary};
use crate::providers::openai::types::{
    ApiErrorEnvelope, ApiUsage, ChatMessage, ChatRequest, ChatResponse, EmbeddingsRequest,
    EmbeddingsResponse, OpenAiConfig, FINISH_REASON_CONTENT_FILTER, FINISH_REASON_LENGTH,
};
use crate::response::ResponseContent;
use crate::usage::{TokensUsage, UNKNOWN_TOKENS};
use crate::util::truncate_chars;
use reqwest::Client;
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use tracing::{debug, instrument};

/// Longest raw body kept in an error message
const MAX_ERROR_BODY_CHARS: usize = 300;

/// Statuses that mean "try again later"
const OVERLOADED_STATUSES: &[u16] = &[429, 500, 502, 503, 504, 529];

/// Error codes and phrases of a context-length failure
const TOKEN_LIMIT_MARKERS: &[&str] = &[
    "context_length_exceeded",
    "maximum context length",
    "too many tokens",
    "reduce the length",
];

/// Error codes of a moderation refusal
const REJECTION_CODES: &[&str] = &[FINISH_REASON_CONTENT_FILTER, "content_policy_violation"];

/// OpenAI (and OpenAI-compatible) adapter
pub struct OpenAiProvider {
    client: Client,
    config: OpenAiConfig,
    models_metadata: Arc<ModelsMetadata>,
}

impl OpenAiProvider {
    /// Create a new adapter
    ///
    /// # Errors
    /// Returns [`Error::Network`] if the HTTP client cannot be built.
    pub fn new(config: OpenAiConfig, models_metadata: Arc<ModelsMetadata>) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::Network(e.to_string()))?;

        debug!(config = ?config, "Created OpenAI adapter");

        Ok(Self {
            client,
            config,
            models_metadata,
        })
    }

    /// Configuration in use
    #[must_use]
    pub fn config(&self) -> &OpenAiConfig {
        &self.config
    }

    fn model(&self, model_key: &str) -> std::result::Result<&ModelMetadata, ProviderError> {
        self.models_metadata
            .get(model_key)
            .map_err(|e| ProviderError::new(e.to_string()).with_code("unknown_model"))
    }

    async fn post<B, R>(&self, path: &str, body: &B) -> std::result::Result<R, ProviderError>
    where
        B: Serialize + Sync,
        R: DeserializeOwned,
    {
        let url = format!("{}/{}", self.config.base_url, path);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::new("OpenAI request timed out").with_code("timeout")
                } else if e.is_connect() {
                    ProviderError::new(format!(
                        "Failed to connect to {}",
                        self.config.base_url
                    ))
                } else {
                    ProviderError::new(e.to_string())
                }
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ProviderError::new(e.to_string()).with_status(status.as_u16()))?;

        if !status.is_success() {
            return Err(api_error(status.as_u16(), &body));
        }

        serde_json::from_str(&body).map_err(|e| {
            ProviderError::new(format!(
                "Malformed OpenAI response ({e}): {}",
                truncate_chars(&body, MAX_ERROR_BODY_CHARS)
            ))
        })
    }

    async fn complete(
        &self,
        model: &ModelMetadata,
        prompt: &str,
    ) -> std::result::Result<ProviderSummary, ProviderError> {
        let request = ChatRequest {
            model: model.urn.clone(),
            messages: vec![ChatMessage::user(prompt)],
            max_tokens: model.max_completion_tokens,
        };

        let response: ChatResponse = self.post("chat/completions", &request).await?;
        let usage = token_usage(response.usage, model.max_total_tokens);

        let Some(choice) = response.choices.into_iter().next() else {
            return Ok(ProviderSummary::new(None, false, usage));
        };

        let finish_reason = choice.finish_reason.as_deref();
        if finish_reason == Some(FINISH_REASON_CONTENT_FILTER) {
            return Err(ProviderError::new("Completion was blocked by the content filter")
                .with_code(FINISH_REASON_CONTENT_FILTER));
        }

        Ok(ProviderSummary::new(
            choice.message.content.map(ResponseContent::Text),
            finish_reason == Some(FINISH_REASON_LENGTH),
            usage,
        ))
    }

    async fn embed(
        &self,
        model: &ModelMetadata,
        content: &str,
    ) -> std::result::Result<ProviderSummary, ProviderError> {
        let request = EmbeddingsRequest {
            model: model.urn.clone(),
            input: content.to_string(),
        };

        let response: EmbeddingsResponse = self.post("embeddings", &request).await?;
        let usage = token_usage(response.usage, model.max_total_tokens);
        let vector = response.data.into_iter().next().map(|d| d.embedding);

        Ok(ProviderSummary::new(
            vector.map(ResponseContent::Embeddings),
            false,
            usage,
        ))
    }
}

/// Build a [`ProviderError`] from a non-2xx response
pub(crate) fn api_error(status: u16, body: &str) -> ProviderError {
    match serde_json::from_str::<ApiErrorEnvelope>(body) {
        Ok(envelope) => {
            let error = ProviderError::new(envelope.error.message.clone()).with_status(status);
            match envelope.error.code_text() {
                Some(code) => error.with_code(code),
                None => error,
            }
        }
        Err(_) => ProviderError::new(format!(
            "HTTP {status}: {}",
            truncate_chars(body, MAX_ERROR_BODY_CHARS)
        ))
        .with_status(status),
    }
}

fn token_usage(usage: Option<ApiUsage>, max_total_tokens: i64) -> TokensUsage {
    match usage {
        Some(usage) => TokensUsage::new(usage.prompt_tokens, usage.completion_tokens, max_total_tokens),
        None => TokensUsage::new(UNKNOWN_TOKENS, UNKNOWN_TOKENS, max_total_tokens),
    }
}

#[async_trait::async_trait]
impl ProviderAdapter for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    #[instrument(skip(self, content), fields(chars = content.len()))]
    async fn invoke(
        &self,
        task_type: ModelPurpose,
        model_key: &str,
        content: &str,
    ) -> std::result::Result<ProviderSummary, ProviderError> {
        let model = self.model(model_key)?;
        match task_type {
            ModelPurpose::Completions => self.complete(model, content).await,
            ModelPurpose::Embeddings => self.embed(model, content).await,
        }
    }

    fn is_overloaded(&self, error: &ProviderError) -> bool {
        error
            .status_code
            .is_some_and(|s| OVERLOADED_STATUSES.contains(&s))
            || error.code.as_deref() == Some("timeout")
            || error.mentions("rate limit")
            || error.mentions("overloaded")
            || error.mentions("timed out")
    }

    fn is_token_limit_exceeded(&self, error: &ProviderError) -> bool {
        matches!(error.status_code, None | Some(400))
            && TOKEN_LIMIT_MARKERS.iter().any(|m| error.mentions(m))
    }

    fn is_rejection(&self, error: &ProviderError) -> bool {
        error
            .code
            .as_deref()
            .is_some_and(|c| REJECTION_CODES.contains(&c))
    }
}
