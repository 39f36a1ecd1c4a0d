use crate::error::Result;
use crate::manifest::{ProviderConfig, ProviderEnv};
use crate::util::mask_api_key;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Default OpenAI API URL
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Environment value holding the API key
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Environment value overriding the API URL
pub const BASE_URL_ENV: &str = "OPENAI_BASE_URL";

/// Finish reason for a completion cut at `max_tokens`
pub const FINISH_REASON_LENGTH: &str = "length";

/// Finish reason for a completion blocked by moderation
pub const FINISH_REASON_CONTENT_FILTER: &str = "content_filter";

// ============================================================================
// API Types
// ============================================================================

/// Request for the chat completions endpoint
#[derive(Debug, Serialize)]
pub struct ChatRequest {
    /// Vendor model name
    pub model: String,
    /// Conversation, a single user message here
    pub messages: Vec<ChatMessage>,
    /// Completion ceiling
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<i64>,
}

/// One chat message
#[derive(Debug, Serialize, Deserialize)]
pub struct ChatMessage {
    /// `system`, `user` or `assistant`
    pub role: String,
    /// Message text
    #[serde(default)]
    pub content: Option<String>,
}

impl ChatMessage {
    /// User message
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: Some(content.into()),
        }
    }
}

/// Response from the chat completions endpoint
#[derive(Debug, Deserialize)]
pub struct ChatResponse {
    /// Generated choices; only the first is used
    #[serde(default)]
    pub choices: Vec<ChatChoice>,
    /// Token accounting
    #[serde(default)]
    pub usage: Option<ApiUsage>,
}

/// One generated choice
#[derive(Debug, Deserialize)]
pub struct ChatChoice {
    /// Generated message
    pub message: ChatMessage,
    /// Why generation stopped
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// Token accounting returned by the API
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ApiUsage {
    /// Prompt tokens
    #[serde(default)]
    pub prompt_tokens: i64,
    /// Completion tokens; absent for embeddings
    #[serde(default)]
    pub completion_tokens: i64,
}

/// Request for the embeddings endpoint
#[derive(Debug, Serialize)]
pub struct EmbeddingsRequest {
    /// Vendor model name
    pub model: String,
    /// Text to embed
    pub input: String,
}

/// Response from the embeddings endpoint
#[derive(Debug, Deserialize)]
pub struct EmbeddingsResponse {
    /// One entry per input
    #[serde(default)]
    pub data: Vec<EmbeddingData>,
    /// Token accounting
    #[serde(default)]
    pub usage: Option<ApiUsage>,
}

/// One embedding vector
#[derive(Debug, Deserialize)]
pub struct EmbeddingData {
    /// The vector
    pub embedding: Vec<f64>,
}

/// Error envelope returned with non-2xx statuses
#[derive(Debug, Deserialize)]
pub struct ApiErrorEnvelope {
    /// Error details
    pub error: ApiErrorBody,
}

/// Error details
#[derive(Debug, Deserialize)]
pub struct ApiErrorBody {
    /// Human readable message
    pub message: String,
    /// Error type, e.g. `invalid_request_error`
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    /// Error code; a string for most errors, sometimes a number or null
    #[serde(default)]
    pub code: Option<serde_json::Value>,
}

impl ApiErrorBody {
    /// Code as text, falling back to the error type
    pub fn code_text(&self) -> Option<String> {
        match &self.code {
            Some(serde_json::Value::String(code)) => Some(code.clone()),
            Some(serde_json::Value::Number(code)) => Some(code.to_string()),
            _ => self.kind.clone(),
        }
    }
}

// ============================================================================
// Configuration
// ============================================================================

/// OpenAI adapter configuration
#[derive(Clone)]
pub struct OpenAiConfig {
    /// API key
    pub api_key: String,
    /// Base URL (default: https://api.openai.com/v1)
    pub base_url: String,
    /// HTTP client timeout; the router's per-attempt timeout still applies
    pub timeout: Duration,
}

impl fmt::Debug for OpenAiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiConfig")
            .field("api_key", &mask_api_key(&self.api_key))
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl OpenAiConfig {
    /// Create a configuration for the public API
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(300),
        }
    }

    /// Read the key and URL from the provider environment
    ///
    /// A `base_url` in the caller config wins over the environment.
    ///
    /// # Errors
    /// Returns a configuration error if `OPENAI_API_KEY` is missing.
    pub fn from_env(env: &ProviderEnv, provider_config: Option<&ProviderConfig>) -> Result<Self> {
        let mut config = Self::new(env.require(API_KEY_ENV)?);

        let base_url = provider_config
            .and_then(|c| c.base_url.as_deref())
            .or_else(|| env.get(BASE_URL_ENV));
        if let Some(url) = base_url {
            config = config.with_base_url(url);
        }

        if let Some(millis) = provider_config.and_then(|c| c.retry.request_timeout_millis) {
            config = config.with_timeout(Duration::from_millis(millis));
        }

        Ok(config)
    }

    /// Set the base URL; a trailing slash is dropped
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Set the HTTP timeout
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}
