//! Scripted provider adapter for testing
//!
//! Plays back queued outcomes in order and records every call. When the
//! queue is empty it answers with a fixed completion or embedding.

use super::adapter::{ProviderAdapter, ProviderError, ProviderSummary};
use crate::model::ModelPurpose;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Error code the mock treats as a content rejection
pub const MOCK_REJECTION_CODE: &str = "content_filter";

struct MockStep {
    delay: Option<Duration>,
    result: Result<ProviderSummary, ProviderError>,
}

/// A call received by the [`MockProvider`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockCall {
    /// Task type
    pub task_type: ModelPurpose,
    /// Model key
    pub model_key: String,
    /// Prompt or content
    pub content: String,
}

/// A provider adapter that returns queued outcomes
#[derive(Clone, Default)]
pub struct MockProvider {
    steps: Arc<Mutex<VecDeque<MockStep>>>,
    calls: Arc<Mutex<Vec<MockCall>>>,
}

impl MockProvider {
    /// Create a mock with an empty script
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, delay: Option<Duration>, result: Result<ProviderSummary, ProviderError>) {
        self.steps
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(MockStep { delay, result });
    }

    /// Queue a successful summary
    pub fn push_summary(&self, summary: ProviderSummary) {
        self.push(None, Ok(summary));
    }

    /// Queue a vendor error
    pub fn push_error(&self, error: ProviderError) {
        self.push(None, Err(error));
    }

    /// Queue a summary that is only returned after `delay`
    pub fn push_delayed(&self, delay: Duration, summary: ProviderSummary) {
        self.push(Some(delay), Ok(summary));
    }

    /// Queue an HTTP 429 error
    pub fn push_overloaded(&self) {
        self.push_error(ProviderError::new("Too many requests").with_status(429));
    }

    /// Queue a context-length error with the given message
    pub fn push_token_limit(&self, message: impl Into<String>) {
        self.push_error(ProviderError::new(message).with_status(400));
    }

    /// Every call received so far
    #[must_use]
    pub fn calls(&self) -> Vec<MockCall> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Number of steps not yet played
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.steps.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

#[async_trait::async_trait]
impl ProviderAdapter for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn invoke(
        &self,
        task_type: ModelPurpose,
        model_key: &str,
        content: &str,
    ) -> Result<ProviderSummary, ProviderError> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(MockCall {
                task_type,
                model_key: model_key.to_string(),
                content: content.to_string(),
            });

        let step = self
            .steps
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front();

        match step {
            Some(MockStep { delay, result }) => {
                if let Some(delay) = delay {
                    tokio::time::sleep(delay).await;
                }
                result
            }
            None => Ok(match task_type {
                ModelPurpose::Completions => ProviderSummary::text("mock response"),
                ModelPurpose::Embeddings => ProviderSummary::embeddings(vec![0.0; 4]),
            }),
        }
    }

    fn is_overloaded(&self, error: &ProviderError) -> bool {
        matches!(error.status_code, Some(429 | 503 | 529)) || error.mentions("overloaded")
    }

    fn is_token_limit_exceeded(&self, error: &ProviderError) -> bool {
        error.status_code == Some(400)
            && (error.mentions("too long")
                || error.mentions("context length")
                || error.mentions("too many tokens")
                || error.mentions("max input tokens"))
    }

    fn is_rejection(&self, error: &ProviderError) -> bool {
        error.code.as_deref() == Some(MOCK_REJECTION_CODE)
    }
}
