//! Invocation responses and their post-processing
//!
//! Every attempt produces a fresh [`InvocationResponse`]; later stages derive
//! new values from it with the `with_*` methods instead of mutating it.

use crate::error::{Error, Result};
use crate::model::{ModelPurpose, ModelsMetadata};
use crate::usage::TokensUsage;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Context key under which a JSON parse failure is recorded
pub const JSON_PARSE_ERROR_KEY: &str = "json_parse_error";

/// Free-form diagnostic bag carried through an invocation
pub type InvocationContext = serde_json::Map<String, Value>;

// ============================================================================
// Status & Content
// ============================================================================

/// Outcome of a single attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InvocationStatus {
    /// Outcome could not be classified; always fatal
    Unknown,
    /// The model produced usable content
    Completed,
    /// The token budget was exceeded
    Exceeded,
    /// The vendor is busy, throttling, or returned malformed content
    Overloaded,
}

/// Raw content returned by a provider adapter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResponseContent {
    /// Completion text
    Text(String),
    /// Embedding vector
    Embeddings(Vec<f64>),
}

impl ResponseContent {
    /// Whether there is nothing usable in the content
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Text(text) => text.trim().is_empty(),
            Self::Embeddings(vector) => vector.is_empty(),
        }
    }
}

/// Post-processed content handed back to callers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Generated {
    /// Completion text
    Text(String),
    /// Completion parsed as a JSON object
    Json(Value),
    /// Embedding vector
    Embeddings(Vec<f64>),
}

impl Generated {
    /// Completion text, if this is text
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Parsed JSON, if this is JSON
    #[must_use]
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Self::Json(value) => Some(value),
            _ => None,
        }
    }

    /// Consume into an embedding vector, if this is one
    #[must_use]
    pub fn into_embeddings(self) -> Option<Vec<f64>> {
        match self {
            Self::Embeddings(vector) => Some(vector),
            _ => None,
        }
    }
}

// ============================================================================
// Invocation Response
// ============================================================================

/// Summary of one attempt against one model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvocationResponse {
    /// Outcome
    pub status: InvocationStatus,
    /// Prompt or content that was sent
    pub request: String,
    /// Model that was invoked
    pub model_key: String,
    /// Diagnostic context
    pub context: InvocationContext,
    /// Present only when `status` is `Completed`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated: Option<Generated>,
    /// Token usage, when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokens_usage: Option<TokensUsage>,
}

impl InvocationResponse {
    /// Skeleton response with `Unknown` status
    #[must_use]
    pub fn skeleton(
        request: impl Into<String>,
        model_key: impl Into<String>,
        context: InvocationContext,
    ) -> Self {
        Self {
            status: InvocationStatus::Unknown,
            request: request.into(),
            model_key: model_key.into(),
            context,
            generated: None,
            tokens_usage: None,
        }
    }

    /// Copy with a different status
    #[must_use]
    pub fn with_status(mut self, status: InvocationStatus) -> Self {
        self.status = status;
        if status != InvocationStatus::Completed {
            self.generated = None;
        }
        self
    }

    /// Copy with token usage
    #[must_use]
    pub fn with_tokens_usage(mut self, usage: TokensUsage) -> Self {
        self.tokens_usage = Some(usage);
        self
    }

    /// Copy with an extra context entry
    #[must_use]
    pub fn with_context_entry(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Copy marked as completed with generated content
    #[must_use]
    pub fn completed(mut self, generated: Generated) -> Self {
        self.status = InvocationStatus::Completed;
        self.generated = Some(generated);
        self
    }
}

// ============================================================================
// Response Tools
// ============================================================================

/// Replace unknown token counts with safe values
///
/// - unknown completion tokens become 0
/// - an unknown ceiling becomes the model's published `max_total_tokens`
/// - an unknown prompt count assumes the budget was fully consumed
///
/// # Errors
/// Returns a configuration error for an unknown `model_key`.
pub fn default_missing_values(
    model_key: &str,
    usage: TokensUsage,
    models_metadata: &ModelsMetadata,
) -> Result<TokensUsage> {
    let mut usage = usage;

    if !usage.has_completion_tokens() {
        usage.completion_tokens = 0;
    }
    if !usage.has_max_total_tokens() {
        usage.max_total_tokens = models_metadata.get(model_key)?.max_total_tokens;
    }
    if !usage.has_prompt_tokens() {
        usage.prompt_tokens = usage
            .max_total_tokens
            .saturating_sub(usage.completion_tokens)
            .saturating_add(1)
            .max(1);
    }

    Ok(usage)
}

/// Cut out the JSON object embedded in a completion
///
/// Takes everything from the first `{` to the last `}` and turns control
/// characters into spaces before parsing.
///
/// # Errors
/// Returns the parse failure as text.
pub fn extract_json_object(content: &str) -> std::result::Result<Value, String> {
    let start = content
        .find('{')
        .ok_or_else(|| "no '{' found in generated content".to_string())?;
    let end = content
        .rfind('}')
        .filter(|end| *end > start)
        .ok_or_else(|| "no closing '}' found in generated content".to_string())?;

    let cleaned: String = content[start..=end]
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect();

    serde_json::from_str(&cleaned).map_err(|e| e.to_string())
}

/// Turn raw adapter content into a final response
///
/// For completions with `as_json` the content must contain a JSON object; a
/// parse failure is reported as `Overloaded` (ask again for a better-formed
/// answer) with the error stored under [`JSON_PARSE_ERROR_KEY`].
///
/// # Errors
/// Returns [`Error::BadResponseContent`] if the content shape does not match
/// `task_type`, or a configuration error for an unknown model.
pub fn post_process(
    skeleton: InvocationResponse,
    task_type: ModelPurpose,
    content: ResponseContent,
    as_json: bool,
    models_metadata: &ModelsMetadata,
) -> Result<InvocationResponse> {
    let model = models_metadata.get(&skeleton.model_key)?;

    match (task_type, content) {
        (ModelPurpose::Completions, ResponseContent::Text(text)) => {
            if !as_json {
                return Ok(skeleton.completed(Generated::Text(text)));
            }

            match extract_json_object(&text) {
                Ok(value) => Ok(skeleton.completed(Generated::Json(value))),
                Err(parse_error) => {
                    tracing::warn!(
                        model_key = %skeleton.model_key,
                        error = %parse_error,
                        "Generated content is not valid JSON, will ask again"
                    );
                    Ok(skeleton
                        .with_status(InvocationStatus::Overloaded)
                        .with_context_entry(JSON_PARSE_ERROR_KEY, parse_error))
                }
            }
        }
        (ModelPurpose::Embeddings, ResponseContent::Embeddings(vector)) => {
            if let Some(dimensions) = model.dimensions {
                if vector.len() != dimensions {
                    tracing::debug!(
                        model_key = %skeleton.model_key,
                        expected = dimensions,
                        actual = vector.len(),
                        "Embedding dimensions differ from declared metadata"
                    );
                }
            }
            Ok(skeleton.completed(Generated::Embeddings(vector)))
        }
        (task_type, content) => Err(Error::BadResponseContent {
            model_key: skeleton.model_key,
            reason: format!(
                "expected {} content but got {}",
                task_type,
                match content {
                    ResponseContent::Text(_) => "text",
                    ResponseContent::Embeddings(_) => "an embedding vector",
                }
            ),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ModelMetadata;
    use serde_json::json;

    fn metadata() -> ModelsMetadata {
        ModelsMetadata::new(vec![
            ModelMetadata {
                key: "GPT".to_string(),
                urn: "gpt-4o".to_string(),
                purpose: ModelPurpose::Completions,
                dimensions: None,
                max_completion_tokens: Some(4096),
                max_total_tokens: 128_000,
            },
            ModelMetadata {
                key: "EMB".to_string(),
                urn: "text-embedding-3-small".to_string(),
                purpose: ModelPurpose::Embeddings,
                dimensions: Some(3),
                max_completion_tokens: None,
                max_total_tokens: 8191,
            },
        ])
        .unwrap()
    }

    fn skeleton(model_key: &str) -> InvocationResponse {
        InvocationResponse::skeleton("prompt", model_key, InvocationContext::new())
    }

    #[test]
    fn test_default_missing_values_all_unknown() {
        let usage = default_missing_values("GPT", TokensUsage::unknown(), &metadata()).unwrap();
        assert_eq!(usage.completion_tokens, 0);
        assert_eq!(usage.max_total_tokens, 128_000);
        assert_eq!(usage.prompt_tokens, 128_001);
    }

    #[test]
    fn test_default_missing_values_keeps_measured() {
        let usage =
            default_missing_values("GPT", TokensUsage::new(-1, 500, 1000), &metadata()).unwrap();
        assert_eq!(usage, TokensUsage::new(501, 500, 1000));

        let usage =
            default_missing_values("GPT", TokensUsage::new(10, 20, 30), &metadata()).unwrap();
        assert_eq!(usage, TokensUsage::new(10, 20, 30));
    }

    #[test]
    fn test_default_missing_values_prompt_at_least_one() {
        let usage =
            default_missing_values("GPT", TokensUsage::new(-1, 5000, 100), &metadata()).unwrap();
        assert_eq!(usage.prompt_tokens, 1);

        let usage =
            default_missing_values("GPT", TokensUsage::new(-1, i64::MAX, 100), &metadata()).unwrap();
        assert_eq!(usage.prompt_tokens, 1);
    }

    #[test]
    fn test_default_missing_values_bounds_hold_for_every_unknown_combination() {
        let meta = metadata();
        for prompt in [-1, 0, 70] {
            for completion in [-1, 0, 90] {
                for max in [-1, 50, 128_000] {
                    let input = TokensUsage::new(prompt, completion, max);
                    let usage = default_missing_values("GPT", input, &meta).unwrap();
                    assert!(usage.completion_tokens >= 0);
                    assert!(usage.prompt_tokens >= 0);
                    if prompt < 0 {
                        assert!(usage.prompt_tokens >= 1);
                    }
                    if max < 0 {
                        assert_eq!(usage.max_total_tokens, 128_000);
                    }
                }
            }
        }
    }

    #[test]
    fn test_post_process_json_completed() {
        let response = post_process(
            skeleton("GPT"),
            ModelPurpose::Completions,
            ResponseContent::Text(r#"{"key":"value"}"#.to_string()),
            true,
            &metadata(),
        )
        .unwrap();

        assert_eq!(response.status, InvocationStatus::Completed);
        assert_eq!(response.generated, Some(Generated::Json(json!({"key": "value"}))));
    }

    #[test]
    fn test_post_process_json_inside_prose() {
        let text = "Here you go:\n```json\n{\"summary\": \"line one\nline two\"}\n```";
        let response = post_process(
            skeleton("GPT"),
            ModelPurpose::Completions,
            ResponseContent::Text(text.to_string()),
            true,
            &metadata(),
        )
        .unwrap();

        assert_eq!(
            response.generated.unwrap().as_json().unwrap()["summary"],
            json!("line one line two")
        );
    }

    #[test]
    fn test_post_process_malformed_json_is_overloaded() {
        let response = post_process(
            skeleton("GPT"),
            ModelPurpose::Completions,
            ResponseContent::Text(r#"{"key": value"#.to_string()),
            true,
            &metadata(),
        )
        .unwrap();

        assert_eq!(response.status, InvocationStatus::Overloaded);
        assert!(response.generated.is_none());
        assert!(response.context.contains_key(JSON_PARSE_ERROR_KEY));
    }

    #[test]
    fn test_post_process_plain_text() {
        let response = post_process(
            skeleton("GPT"),
            ModelPurpose::Completions,
            ResponseContent::Text("not json".to_string()),
            false,
            &metadata(),
        )
        .unwrap();

        assert_eq!(response.status, InvocationStatus::Completed);
        assert_eq!(response.generated.unwrap().as_text(), Some("not json"));
    }

    #[test]
    fn test_post_process_embeddings_pass_through() {
        let response = post_process(
            skeleton("EMB"),
            ModelPurpose::Embeddings,
            ResponseContent::Embeddings(vec![0.1, 0.2, 0.3]),
            true,
            &metadata(),
        )
        .unwrap();

        assert_eq!(response.status, InvocationStatus::Completed);
        assert_eq!(
            response.generated.unwrap().into_embeddings(),
            Some(vec![0.1, 0.2, 0.3])
        );
    }

    #[test]
    fn test_post_process_wrong_shape_is_bad_content() {
        let err = post_process(
            skeleton("GPT"),
            ModelPurpose::Completions,
            ResponseContent::Embeddings(vec![1.0]),
            false,
            &metadata(),
        )
        .unwrap_err();

        assert!(matches!(err, Error::BadResponseContent { .. }));
    }

    #[test]
    fn test_with_status_drops_generated() {
        let response = skeleton("GPT")
            .completed(Generated::Text("x".to_string()))
            .with_status(InvocationStatus::Exceeded);
        assert!(response.generated.is_none());
    }
}
