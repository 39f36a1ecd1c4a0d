//! Prompt reduction after token-limit failures
//!
//! The adapter never grows a prompt: every strategy ratio is clamped below a
//! minimum constant so repeated exceedances keep shrinking it.

use crate::error::{Error, Result};
use crate::model::ModelsMetadata;
use crate::response::{default_missing_values, InvocationResponse};
use crate::usage::TokensUsage;
use std::sync::Arc;
use tracing::debug;

/// Distance from the completion ceiling that still counts as "hit the limit"
pub const COMPLETION_TOKENS_BUFFER: i64 = 5;

/// Largest ratio applied when the completion ran into its ceiling
pub const MIN_COMPLETION_REDUCTION_RATIO: f64 = 0.75;

/// Largest ratio applied when the prompt overflowed the total budget
pub const MIN_PROMPT_REDUCTION_RATIO: f64 = 0.85;

/// Strategy that computes a smaller prompt from token usage feedback
pub trait PromptReductionStrategy: Send + Sync {
    /// Return the reduced prompt
    ///
    /// # Errors
    /// Returns a configuration error for an unknown `model_key`.
    fn adapt_prompt(
        &self,
        prompt: &str,
        model_key: &str,
        usage: &TokensUsage,
        models_metadata: &ModelsMetadata,
    ) -> Result<String>;
}

/// Proportional truncation driven by the token budget
#[derive(Debug, Clone, Copy, Default)]
pub struct TokenLimitReductionStrategy;

impl TokenLimitReductionStrategy {
    fn reduction_ratio(usage: &TokensUsage, max_completion_tokens: Option<i64>) -> f64 {
        let mut ratio = 1.0;

        if let Some(limit) = max_completion_tokens {
            if usage.completion_tokens >= limit.saturating_sub(COMPLETION_TOKENS_BUFFER) {
                ratio = (limit as f64 / usage.completion_tokens.saturating_add(1) as f64)
                    .min(MIN_COMPLETION_REDUCTION_RATIO);
            }
        }

        if ratio >= 1.0 {
            let used = usage
                .prompt_tokens
                .saturating_add(usage.completion_tokens)
                .saturating_add(1) as f64;
            ratio = (usage.max_total_tokens as f64 / used).min(MIN_PROMPT_REDUCTION_RATIO);
        }

        ratio.max(0.0)
    }
}

impl PromptReductionStrategy for TokenLimitReductionStrategy {
    fn adapt_prompt(
        &self,
        prompt: &str,
        model_key: &str,
        usage: &TokensUsage,
        models_metadata: &ModelsMetadata,
    ) -> Result<String> {
        if prompt.trim().is_empty() {
            return Ok(prompt.to_string());
        }

        let model = models_metadata.get(model_key)?;
        let usage = default_missing_values(model_key, *usage, models_metadata)?;
        let ratio = Self::reduction_ratio(&usage, model.max_completion_tokens);

        let length = prompt.chars().count();
        let new_length = (length as f64 * ratio).floor() as usize;

        debug!(
            model_key,
            ratio,
            from_chars = length,
            to_chars = new_length,
            "Cropping prompt"
        );

        Ok(prompt.chars().take(new_length).collect())
    }
}

/// Applies a [`PromptReductionStrategy`] to exceeded responses
#[derive(Clone)]
pub struct PromptAdapter {
    strategy: Arc<dyn PromptReductionStrategy>,
}

impl Default for PromptAdapter {
    fn default() -> Self {
        Self::new(Arc::new(TokenLimitReductionStrategy))
    }
}

impl std::fmt::Debug for PromptAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PromptAdapter").finish_non_exhaustive()
    }
}

impl PromptAdapter {
    /// Create an adapter with a custom strategy
    #[must_use]
    pub fn new(strategy: Arc<dyn PromptReductionStrategy>) -> Self {
        Self { strategy }
    }

    /// Reduce a prompt from explicit token usage
    ///
    /// # Errors
    /// Propagates strategy errors.
    pub fn adapt_prompt(
        &self,
        prompt: &str,
        model_key: &str,
        usage: &TokensUsage,
        models_metadata: &ModelsMetadata,
    ) -> Result<String> {
        self.strategy
            .adapt_prompt(prompt, model_key, usage, models_metadata)
    }

    /// Reduce a prompt using the usage attached to an exceeded response
    ///
    /// # Errors
    /// Returns [`Error::BadResponseMetadata`] when the response carries no
    /// token usage.
    pub fn adapt_prompt_from_response(
        &self,
        prompt: &str,
        response: &InvocationResponse,
        models_metadata: &ModelsMetadata,
    ) -> Result<String> {
        let usage = response
            .tokens_usage
            .as_ref()
            .ok_or_else(|| Error::BadResponseMetadata {
                model_key: response.model_key.clone(),
                reason: "token usage is required to crop the prompt".to_string(),
            })?;

        self.adapt_prompt(prompt, &response.model_key, usage, models_metadata)
    }
}
