//! One classified attempt against one model
//!
//! Turns an adapter call into an [`InvocationResponse`]:
//! - timeout or overload predicate → `Overloaded`
//! - token-limit predicate or incomplete response → `Exceeded` with usage
//! - success → post-processed content (`Completed`, or `Overloaded` on bad JSON)
//! - rejection predicate → [`Error::Rejection`]
//! - anything else → the vendor error, unchanged

use super::adapter::{ProviderAdapter, ProviderError};
use crate::error::{Error, Result};
use crate::error_patterns::{extract_from_error_message, ErrorPattern};
use crate::model::{ModelPurpose, ModelsMetadata};
use crate::response::{
    default_missing_values, post_process, InvocationContext, InvocationResponse,
    InvocationStatus,
};
use crate::util::duration_millis;
use std::time::Duration;
use tracing::{debug, warn};

/// Context key holding the last vendor error message
pub const LAST_ERROR_KEY: &str = "last_error";

/// Context key set when an attempt timed out
pub const TIMEOUT_MILLIS_KEY: &str = "timeout_millis";

/// Everything needed for one attempt
#[derive(Debug, Clone, Copy)]
pub struct Attempt<'a> {
    /// Resource being processed, for logs and rejections
    pub resource: &'a str,
    /// Embeddings or completions
    pub task_type: ModelPurpose,
    /// Model to invoke
    pub model_key: &'a str,
    /// Prompt or content to send
    pub content: &'a str,
    /// Parse the completion as a JSON object
    pub as_json: bool,
    /// Caller context copied into the response
    pub context: &'a InvocationContext,
}

/// Shared, read-only inputs for classification
#[derive(Debug, Clone, Copy)]
pub struct ExecutionEnv<'a> {
    /// Resolved model metadata
    pub models_metadata: &'a ModelsMetadata,
    /// Vendor error patterns, in priority order
    pub error_patterns: &'a [ErrorPattern],
    /// Per-attempt timeout
    pub request_timeout: Duration,
}

/// Run one attempt and classify its outcome
///
/// # Errors
/// Returns rejections, bad response content, configuration errors, and
/// unclassified vendor errors.
pub async fn execute_attempt(
    adapter: &dyn ProviderAdapter,
    attempt: Attempt<'_>,
    env: ExecutionEnv<'_>,
) -> Result<InvocationResponse> {
    let skeleton =
        InvocationResponse::skeleton(attempt.content, attempt.model_key, attempt.context.clone());

    let outcome = tokio::time::timeout(
        env.request_timeout,
        adapter.invoke(attempt.task_type, attempt.model_key, attempt.content),
    )
    .await;

    let summary = match outcome {
        Err(_) => {
            let timeout_millis = duration_millis(env.request_timeout);
            warn!(
                resource = attempt.resource,
                model_key = attempt.model_key,
                timeout_millis,
                "LLM call timed out"
            );
            return Ok(skeleton
                .with_status(InvocationStatus::Overloaded)
                .with_context_entry(TIMEOUT_MILLIS_KEY, timeout_millis));
        }
        Ok(Err(error)) => return classify_error(adapter, attempt, env, skeleton, error),
        Ok(Ok(summary)) => summary,
    };

    if summary.is_incomplete_response {
        let usage =
            default_missing_values(attempt.model_key, summary.token_usage, env.models_metadata)?;
        debug!(
            resource = attempt.resource,
            model_key = attempt.model_key,
            prompt_tokens = usage.prompt_tokens,
            completion_tokens = usage.completion_tokens,
            "LLM response was incomplete"
        );
        return Ok(skeleton
            .with_status(InvocationStatus::Exceeded)
            .with_tokens_usage(usage));
    }

    let content = summary
        .response_content
        .ok_or_else(|| Error::BadResponseContent {
            model_key: attempt.model_key.to_string(),
            reason: "complete response without content".to_string(),
        })?;

    post_process(
        skeleton.with_tokens_usage(summary.token_usage),
        attempt.task_type,
        content,
        attempt.as_json,
        env.models_metadata,
    )
}

fn classify_error(
    adapter: &dyn ProviderAdapter,
    attempt: Attempt<'_>,
    env: ExecutionEnv<'_>,
    skeleton: InvocationResponse,
    error: ProviderError,
) -> Result<InvocationResponse> {
    if adapter.is_rejection(&error) {
        return Err(Error::Rejection {
            resource: attempt.resource.to_string(),
            model_key: attempt.model_key.to_string(),
            reason: error.message,
        });
    }

    if adapter.is_overloaded(&error) {
        debug!(
            model_key = attempt.model_key,
            error = %error,
            "LLM is overloaded"
        );
        return Ok(skeleton
            .with_status(InvocationStatus::Overloaded)
            .with_context_entry(LAST_ERROR_KEY, error.message));
    }

    if adapter.is_token_limit_exceeded(&error) {
        let usage = extract_from_error_message(
            attempt.model_key,
            attempt.content,
            &error.message,
            env.models_metadata,
            env.error_patterns,
        )?;
        debug!(
            model_key = attempt.model_key,
            prompt_tokens = usage.prompt_tokens,
            max_total_tokens = usage.max_total_tokens,
            "LLM token limit exceeded"
        );
        return Ok(skeleton
            .with_status(InvocationStatus::Exceeded)
            .with_tokens_usage(usage)
            .with_context_entry(LAST_ERROR_KEY, error.message));
    }

    Err(Error::Provider(error))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ModelMetadata;
    use crate::provider::adapter::{MockProviderAdapter, ProviderSummary};
    use crate::response::{Generated, JSON_PARSE_ERROR_KEY};
    use crate::usage::TokensUsage;
    use mockall::predicate::eq;

    fn metadata() -> ModelsMetadata {
        ModelsMetadata::new(vec![ModelMetadata {
            key: "GPT".to_string(),
            urn: "gpt-4o".to_string(),
            purpose: ModelPurpose::Completions,
            dimensions: None,
            max_completion_tokens: Some(4096),
            max_total_tokens: 8192,
        }])
        .unwrap()
    }

    fn patterns() -> Vec<ErrorPattern> {
        vec![ErrorPattern::tokens(
            r"maximum context length is (\d+) tokens.*?resulted in (\d+) tokens",
            true,
        )
        .unwrap()]
    }

    fn adapter_with(
        result: std::result::Result<ProviderSummary, ProviderError>,
    ) -> MockProviderAdapter {
        let mut adapter = MockProviderAdapter::new();
        adapter
            .expect_invoke()
            .with(eq(ModelPurpose::Completions), eq("GPT"), eq("prompt"))
            .times(1)
            .return_once(move |_, _, _| result);
        adapter
            .expect_is_rejection()
            .returning(|e| e.code.as_deref() == Some("content_filter"));
        adapter
            .expect_is_overloaded()
            .returning(|e| e.status_code == Some(429));
        adapter
            .expect_is_token_limit_exceeded()
            .returning(|e| e.mentions("context length"));
        adapter
    }

    async fn run(adapter: &MockProviderAdapter, as_json: bool) -> Result<InvocationResponse> {
        let metadata = metadata();
        let patterns = patterns();
        let context = InvocationContext::new();
        execute_attempt(
            adapter,
            Attempt {
                resource: "src/lib.rs",
                task_type: ModelPurpose::Completions,
                model_key: "GPT",
                content: "prompt",
                as_json,
                context: &context,
            },
            ExecutionEnv {
                models_metadata: &metadata,
                error_patterns: &patterns,
                request_timeout: Duration::from_secs(5),
            },
        )
        .await
    }

    #[tokio::test]
    async fn test_success_is_completed() {
        let adapter = adapter_with(Ok(ProviderSummary::text("hello")));
        let response = run(&adapter, false).await.unwrap();
        assert_eq!(response.status, InvocationStatus::Completed);
        assert_eq!(response.generated, Some(Generated::Text("hello".to_string())));
    }

    #[tokio::test]
    async fn test_bad_json_is_overloaded() {
        let adapter = adapter_with(Ok(ProviderSummary::text("{not json}")));
        let response = run(&adapter, true).await.unwrap();
        assert_eq!(response.status, InvocationStatus::Overloaded);
        assert!(response.context.contains_key(JSON_PARSE_ERROR_KEY));
    }

    #[tokio::test]
    async fn test_overloaded_error() {
        let adapter = adapter_with(Err(ProviderError::new("slow down").with_status(429)));
        let response = run(&adapter, false).await.unwrap();
        assert_eq!(response.status, InvocationStatus::Overloaded);
        assert_eq!(response.context[LAST_ERROR_KEY], "slow down");
    }

    #[tokio::test]
    async fn test_token_limit_error_parses_usage() {
        let adapter = adapter_with(Err(ProviderError::new(
            "This model's maximum context length is 8192 tokens. However, your messages resulted in 9001 tokens.",
        )
        .with_status(400)));

        let response = run(&adapter, false).await.unwrap();
        assert_eq!(response.status, InvocationStatus::Exceeded);
        assert_eq!(response.tokens_usage, Some(TokensUsage::new(9001, 0, 8192)));
    }

    #[tokio::test]
    async fn test_incomplete_response_is_exceeded_with_defaults() {
        let adapter = adapter_with(Ok(ProviderSummary::new(
            None,
            false,
            TokensUsage::new(-1, 4096, -1),
        )));

        let response = run(&adapter, false).await.unwrap();
        assert_eq!(response.status, InvocationStatus::Exceeded);
        assert_eq!(response.tokens_usage, Some(TokensUsage::new(4097, 4096, 8192)));
    }

    #[tokio::test]
    async fn test_rejection_is_error() {
        let adapter = adapter_with(Err(
            ProviderError::new("filtered").with_code("content_filter")
        ));
        let err = run(&adapter, false).await.unwrap_err();
        assert!(err.is_rejection());
    }

    #[tokio::test]
    async fn test_unclassified_error_is_rethrown() {
        let original = ProviderError::new("invalid api key").with_status(401);
        let adapter = adapter_with(Err(original.clone()));
        match run(&adapter, false).await.unwrap_err() {
            Error::Provider(error) => assert_eq!(error, original),
            other => panic!("unexpected error: {other}"),
        }
    }
}
