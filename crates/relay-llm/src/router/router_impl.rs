//! Router implementation
//!
//! Walks the quality tiers of one provider. Within a tier, overloaded
//! attempts are retried after a jittered delay. An exceeded prompt moves to
//! the next tier, or gets cropped when there is no next tier.

use super::outcome::handle_unsuccessful_outcome;
use crate::error::{Error, Result};
use crate::error_patterns::ErrorPattern;
use crate::manifest::{FactoryInput, ProviderConfig, ProviderEnv, ProviderManifest};
use crate::model::{ModelKeysSet, ModelPurpose, ModelsMetadata, QualityTier};
use crate::prompt::PromptAdapter;
use crate::provider::{execute_attempt, Attempt, ExecutionEnv, ProviderAdapter};
use crate::response::{Generated, InvocationContext, InvocationResponse, InvocationStatus};
use crate::retry::RetryConfig;
use crate::stats::{StatKind, StatsCounter};
use crate::util::duration_millis;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Context key holding the resource name
pub const RESOURCE_KEY: &str = "resource";

/// Per-call options for [`Router::execute_completion`]
#[derive(Debug, Clone, Default)]
pub struct CompletionOptions {
    /// Parse the completion as a JSON object
    pub as_json: bool,
    /// Use only this tier instead of primary-then-secondary
    pub quality: Option<QualityTier>,
    /// Caller context attached to every attempt
    pub context: InvocationContext,
}

impl CompletionOptions {
    /// Plain text completion with default tiers
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request a JSON object
    #[must_use]
    pub fn json(mut self) -> Self {
        self.as_json = true;
        self
    }

    /// Pin the quality tier
    #[must_use]
    pub fn with_quality(mut self, quality: QualityTier) -> Self {
        self.quality = Some(quality);
        self
    }

    /// Attach caller context
    #[must_use]
    pub fn with_context(mut self, context: InvocationContext) -> Self {
        self.context = context;
        self
    }
}

/// Tiered invocation router for one provider
#[derive(Clone)]
pub struct Router {
    provider_name: String,
    model_family: String,
    adapter: Arc<dyn ProviderAdapter>,
    models_metadata: Arc<ModelsMetadata>,
    model_keys: ModelKeysSet,
    error_patterns: Arc<[ErrorPattern]>,
    retry: RetryConfig,
    prompt_adapter: PromptAdapter,
    stats: Arc<StatsCounter>,
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router")
            .field("provider_name", &self.provider_name)
            .field("model_family", &self.model_family)
            .field("model_keys", &self.model_keys)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

impl Router {
    /// Build a router from a resolved manifest
    ///
    /// # Errors
    /// Returns [`Error::Configuration`] for invalid models or missing
    /// environment values, and whatever the factory fails with.
    pub fn from_manifest(
        manifest: &ProviderManifest,
        env: &ProviderEnv,
        provider_config: Option<&ProviderConfig>,
    ) -> Result<Self> {
        let models_metadata = Arc::new(manifest.resolve_metadata()?);
        let model_keys = manifest.model_keys();
        model_keys.validate_against(&models_metadata)?;

        let adapter = manifest.factory.create(FactoryInput {
            env,
            model_keys: &model_keys,
            models_metadata: &models_metadata,
            error_patterns: &manifest.error_patterns,
            provider_config,
        })?;

        info!(
            provider = %manifest.provider_name,
            family = %manifest.model_family,
            "LLM router initialized"
        );

        Ok(Self {
            provider_name: manifest.provider_name.clone(),
            model_family: manifest.model_family.clone(),
            adapter,
            models_metadata,
            model_keys,
            error_patterns: manifest.error_patterns.clone().into(),
            retry: manifest.resolve_retry(provider_config),
            prompt_adapter: PromptAdapter::default(),
            stats: Arc::new(StatsCounter::new()),
        })
    }

    /// Build a router around an existing adapter
    ///
    /// # Errors
    /// Returns [`Error::Configuration`] if the keys do not resolve to
    /// models of the right purpose.
    pub fn new(
        provider_name: impl Into<String>,
        model_family: impl Into<String>,
        adapter: Arc<dyn ProviderAdapter>,
        models_metadata: ModelsMetadata,
        model_keys: ModelKeysSet,
        error_patterns: Vec<ErrorPattern>,
    ) -> Result<Self> {
        model_keys.validate_against(&models_metadata)?;
        Ok(Self {
            provider_name: provider_name.into(),
            model_family: model_family.into(),
            adapter,
            models_metadata: Arc::new(models_metadata),
            model_keys,
            error_patterns: error_patterns.into(),
            retry: RetryConfig::default(),
            prompt_adapter: PromptAdapter::default(),
            stats: Arc::new(StatsCounter::new()),
        })
    }

    /// Replace the retry settings
    #[must_use]
    pub fn with_retry_config(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Share a stats counter with other routers
    #[must_use]
    pub fn with_stats(mut self, stats: Arc<StatsCounter>) -> Self {
        self.stats = stats;
        self
    }

    /// Replace the prompt reduction
    #[must_use]
    pub fn with_prompt_adapter(mut self, prompt_adapter: PromptAdapter) -> Self {
        self.prompt_adapter = prompt_adapter;
        self
    }

    /// Provider name
    #[must_use]
    pub fn provider_name(&self) -> &str {
        &self.provider_name
    }

    /// Model family label
    #[must_use]
    pub fn model_family(&self) -> &str {
        &self.model_family
    }

    /// Retry settings in effect
    #[must_use]
    pub fn retry_config(&self) -> &RetryConfig {
        &self.retry
    }

    /// Invocation counters
    #[must_use]
    pub fn stats(&self) -> &Arc<StatsCounter> {
        &self.stats
    }

    /// One-line counter summary
    #[must_use]
    pub fn status_summary(&self) -> String {
        self.stats.summary()
    }

    /// Counter table
    #[must_use]
    pub fn status_details(&self) -> String {
        self.stats.details()
    }

    /// Log the counter summary
    pub fn display_status_summary(&self) {
        info!(provider = %self.provider_name, "{}", self.status_summary());
    }

    /// Log the counter table
    pub fn display_status_details(&self) {
        info!(provider = %self.provider_name, "\n{}", self.status_details());
    }

    /// `"<family> (embeddings: <urn>, completions: <urn>[, <urn>])"`
    #[must_use]
    pub fn models_used_description(&self) -> String {
        let urn = |key: &str| {
            self.models_metadata
                .get(key)
                .map_or_else(|_| key.to_string(), |m| m.urn.clone())
        };

        let mut completions = vec![urn(&self.model_keys.primary_completion_key)];
        if let Some(secondary) = &self.model_keys.secondary_completion_key {
            completions.push(urn(secondary));
        }

        format!(
            "{} (embeddings: {}, completions: {})",
            self.model_family,
            urn(&self.model_keys.embeddings_key),
            completions.join(", ")
        )
    }

    /// Completion tiers to walk, in order
    ///
    /// # Errors
    /// Returns [`Error::Configuration`] when the pinned tier has no model.
    pub fn completion_tiers(&self, quality: Option<QualityTier>) -> Result<Vec<String>> {
        let tiers: Vec<String> = match quality {
            Some(tier) => self
                .model_keys
                .completion_key(tier)
                .map(str::to_string)
                .into_iter()
                .collect(),
            None => std::iter::once(self.model_keys.primary_completion_key.clone())
                .chain(self.model_keys.secondary_completion_key.clone())
                .collect(),
        };

        if tiers.is_empty() {
            return Err(Error::config(format!(
                "no completion model configured for the {} tier",
                quality.map_or("requested", |q| q.as_str())
            )));
        }
        Ok(tiers)
    }

    /// Embed `content`
    ///
    /// Returns `Ok(None)` when every attempt failed in a recoverable way.
    ///
    /// # Errors
    /// Returns rejections, configuration errors and unclassified vendor
    /// errors.
    #[instrument(skip(self, content, context), fields(provider = %self.provider_name))]
    pub async fn generate_embeddings(
        &self,
        resource: &str,
        content: &str,
        context: Option<InvocationContext>,
    ) -> Result<Option<Vec<f64>>> {
        let tiers = [self.model_keys.embeddings_key.clone()];
        let generated = self
            .iterate_over_models(
                resource,
                ModelPurpose::Embeddings,
                content,
                &tiers,
                false,
                context.unwrap_or_default(),
            )
            .await?;

        generated
            .map(|g| {
                g.into_embeddings().ok_or_else(|| Error::BadResponseContent {
                    model_key: self.model_keys.embeddings_key.clone(),
                    reason: "embeddings call produced a non-vector result".to_string(),
                })
            })
            .transpose()
    }

    /// Complete `prompt`, falling back across tiers
    ///
    /// Returns `Ok(None)` when every tier failed in a recoverable way.
    ///
    /// # Errors
    /// Returns rejections, configuration errors and unclassified vendor
    /// errors.
    #[instrument(skip(self, prompt, options), fields(provider = %self.provider_name, as_json = options.as_json))]
    pub async fn execute_completion(
        &self,
        resource: &str,
        prompt: &str,
        options: CompletionOptions,
    ) -> Result<Option<Generated>> {
        let tiers = self.completion_tiers(options.quality)?;
        self.iterate_over_models(
            resource,
            ModelPurpose::Completions,
            prompt,
            &tiers,
            options.as_json,
            options.context,
        )
        .await
    }

    /// Release the vendor client
    ///
    /// # Errors
    /// Returns the adapter's close error.
    pub async fn close(&self) -> Result<()> {
        debug!(provider = %self.provider_name, "Closing LLM router");
        self.adapter.close().await.map_err(Error::from)
    }

    async fn iterate_over_models(
        &self,
        resource: &str,
        task_type: ModelPurpose,
        content: &str,
        model_keys: &[String],
        as_json: bool,
        mut context: InvocationContext,
    ) -> Result<Option<Generated>> {
        context.insert(RESOURCE_KEY.to_string(), resource.into());

        let total_tiers = model_keys.len();
        let mut tier_index = 0;
        let mut attempts = 0;
        let mut prompt = content.to_string();
        let mut last_status = None;

        while let Some(model_key) = model_keys.get(tier_index) {
            let response = self
                .invoke_with_retries(
                    resource,
                    task_type,
                    model_key,
                    &prompt,
                    as_json,
                    &context,
                    &mut attempts,
                )
                .await?;
            last_status = response.as_ref().map(|r| r.status);

            if let Some(response) = &response {
                if response.status == InvocationStatus::Completed {
                    let generated =
                        response
                            .generated
                            .clone()
                            .ok_or_else(|| Error::BadResponseContent {
                                model_key: model_key.clone(),
                                reason: "completed response without content".to_string(),
                            })?;
                    self.stats.record(StatKind::Success);
                    debug!(resource, model_key = %model_key, attempts, "LLM invocation completed");
                    return Ok(Some(generated));
                }
            }

            let decision = handle_unsuccessful_outcome(
                response.as_ref(),
                tier_index,
                total_tiers,
                &context,
                resource,
            )?;

            if decision.should_switch_to_next_llm {
                self.stats.record(StatKind::Switch);
                tier_index += 1;
                attempts = 0;
                debug!(resource, from = %model_key, tier = tier_index, "Switching to next LLM");
                continue;
            }

            if decision.should_crop_prompt {
                let Some(response) = &response else { break };
                if attempts >= self.retry.max_attempts {
                    debug!(resource, model_key = %model_key, attempts, "No attempts left to crop");
                    break;
                }

                let cropped = self.prompt_adapter.adapt_prompt_from_response(
                    &prompt,
                    response,
                    &self.models_metadata,
                )?;
                if cropped.trim().is_empty() {
                    debug!(resource, model_key = %model_key, "Prompt cropped to nothing");
                    break;
                }

                self.stats.record(StatKind::Crop);
                debug!(
                    resource,
                    model_key = %model_key,
                    from_chars = prompt.chars().count(),
                    to_chars = cropped.chars().count(),
                    "Cropped prompt"
                );
                prompt = cropped;
                continue;
            }

            break;
        }

        self.stats.record(StatKind::Failure);
        warn!(
            resource,
            task = %task_type,
            model_key = model_keys.get(tier_index).map(String::as_str),
            status = ?last_status,
            "LLM invocation failed"
        );
        Ok(None)
    }

    /// Run attempts on one model until it stops being overloaded
    ///
    /// Returns `None` when the attempt budget ran out while overloaded.
    #[allow(clippy::too_many_arguments)]
    async fn invoke_with_retries(
        &self,
        resource: &str,
        task_type: ModelPurpose,
        model_key: &str,
        content: &str,
        as_json: bool,
        context: &InvocationContext,
        attempts: &mut u32,
    ) -> Result<Option<InvocationResponse>> {
        let env = ExecutionEnv {
            models_metadata: &self.models_metadata,
            error_patterns: &self.error_patterns,
            request_timeout: self.retry.request_timeout(),
        };

        loop {
            *attempts += 1;
            let response = execute_attempt(
                self.adapter.as_ref(),
                Attempt {
                    resource,
                    task_type,
                    model_key,
                    content,
                    as_json,
                    context,
                },
                env,
            )
            .await?;

            if response.status != InvocationStatus::Overloaded {
                return Ok(Some(response));
            }

            if *attempts >= self.retry.max_attempts {
                debug!(resource, model_key, attempts = *attempts, "Retries exhausted");
                return Ok(None);
            }

            self.stats.record(StatKind::Retry);
            let delay = self.retry.retry_delay();
            debug!(
                resource,
                model_key,
                attempt = *attempts,
                delay_ms = duration_millis(delay),
                "LLM overloaded, retrying"
            );
            tokio::time::sleep(delay).await;
        }
    }
}
