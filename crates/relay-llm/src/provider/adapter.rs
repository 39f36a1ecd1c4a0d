//! Provider adapter trait definition
//!
//! An adapter performs exactly one vendor call and reports it in a
//! vendor-neutral shape. Failure classification is done through capability
//! predicates over a normalized [`ProviderError`] rather than through the
//! vendor SDK's error types.

use crate::model::ModelPurpose;
use crate::response::ResponseContent;
use crate::usage::TokensUsage;
use thiserror::Error;

/// Normalized vendor error: message text plus optional HTTP status and code
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ProviderError {
    /// Vendor supplied message
    pub message: String,
    /// HTTP status, when the error came from an HTTP response
    pub status_code: Option<u16>,
    /// Vendor error code or type, e.g. `"rate_limit_exceeded"`
    pub code: Option<String>,
}

impl ProviderError {
    /// Create an error from a message
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status_code: None,
            code: None,
        }
    }

    /// Attach an HTTP status
    #[must_use]
    pub fn with_status(mut self, status: u16) -> Self {
        self.status_code = Some(status);
        self
    }

    /// Attach a vendor error code
    #[must_use]
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// Case-insensitive search in the message and code
    #[must_use]
    pub fn mentions(&self, needle: &str) -> bool {
        let needle = needle.to_lowercase();
        self.message.to_lowercase().contains(&needle)
            || self
                .code
                .as_deref()
                .is_some_and(|c| c.to_lowercase().contains(&needle))
    }
}

/// Vendor-neutral summary of one successful vendor call
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderSummary {
    /// Truncated by length, or no usable content
    pub is_incomplete_response: bool,
    /// Generated content, if any
    pub response_content: Option<ResponseContent>,
    /// Reported usage, with `-1` for anything not reported
    pub token_usage: TokensUsage,
}

impl ProviderSummary {
    /// Build a summary, deriving the completeness flag
    ///
    /// The response is incomplete when the vendor stopped on length or when
    /// the content is absent or empty.
    #[must_use]
    pub fn new(
        response_content: Option<ResponseContent>,
        stopped_on_length: bool,
        token_usage: TokensUsage,
    ) -> Self {
        let is_empty = response_content.as_ref().is_none_or(ResponseContent::is_empty);
        Self {
            is_incomplete_response: stopped_on_length || is_empty,
            response_content,
            token_usage,
        }
    }

    /// Complete text response with unknown usage
    #[must_use]
    pub fn text(content: impl Into<String>) -> Self {
        Self::new(
            Some(ResponseContent::Text(content.into())),
            false,
            TokensUsage::unknown(),
        )
    }

    /// Complete embeddings response with unknown usage
    #[must_use]
    pub fn embeddings(vector: Vec<f64>) -> Self {
        Self::new(
            Some(ResponseContent::Embeddings(vector)),
            false,
            TokensUsage::unknown(),
        )
    }
}

/// Capability interface implemented once per vendor
///
/// `invoke` must return `Err` for every vendor failure; the router decides
/// with the predicates whether that failure is an overload, a token-limit
/// breach, a rejection, or fatal.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Provider name for logs
    fn name(&self) -> &str;

    /// Perform one vendor call for `model_key`
    async fn invoke(
        &self,
        task_type: ModelPurpose,
        model_key: &str,
        content: &str,
    ) -> Result<ProviderSummary, ProviderError>;

    /// Rate limiting, throttling, service unavailable, timeouts
    fn is_overloaded(&self, error: &ProviderError) -> bool;

    /// Context-length or input-length validation failures
    fn is_token_limit_exceeded(&self, error: &ProviderError) -> bool;

    /// Content refused or filtered by the vendor
    fn is_rejection(&self, _error: &ProviderError) -> bool {
        false
    }

    /// Release vendor client resources
    async fn close(&self) -> Result<(), ProviderError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_incomplete_on_length() {
        let summary = ProviderSummary::new(
            Some(ResponseContent::Text("partial".to_string())),
            true,
            TokensUsage::unknown(),
        );
        assert!(summary.is_incomplete_response);
    }

    #[test]
    fn test_summary_incomplete_on_empty_content() {
        assert!(ProviderSummary::new(None, false, TokensUsage::unknown()).is_incomplete_response);
        assert!(ProviderSummary::text("  ").is_incomplete_response);
        assert!(ProviderSummary::embeddings(vec![]).is_incomplete_response);
        assert!(!ProviderSummary::text("done").is_incomplete_response);
    }

    #[test]
    fn test_error_mentions() {
        let error = ProviderError::new("Rate Limit reached")
            .with_status(429)
            .with_code("rate_limit_exceeded");
        assert!(error.mentions("rate limit"));
        assert!(error.mentions("RATE_LIMIT"));
        assert!(!error.mentions("context"));
        assert_eq!(error.to_string(), "Rate Limit reached");
    }
}
