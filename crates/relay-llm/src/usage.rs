//! Token usage accounting
//!
//! Vendors rarely report every count, so each field is either a measured,
//! non-negative value or [`UNKNOWN_TOKENS`]. The `-1` convention is kept on
//! the wire because callers compare against `< 0`.

use serde::{Deserialize, Serialize};

/// Sentinel for a token count that was not measured
pub const UNKNOWN_TOKENS: i64 = -1;

/// Token usage for one invocation attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokensUsage {
    /// Tokens consumed by the prompt
    pub prompt_tokens: i64,
    /// Tokens generated by the model
    pub completion_tokens: i64,
    /// Prompt + completion ceiling in effect
    pub max_total_tokens: i64,
}

impl TokensUsage {
    /// Create a usage record
    #[must_use]
    pub const fn new(prompt_tokens: i64, completion_tokens: i64, max_total_tokens: i64) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            max_total_tokens,
        }
    }

    /// Every field unknown
    #[must_use]
    pub const fn unknown() -> Self {
        Self::new(UNKNOWN_TOKENS, UNKNOWN_TOKENS, UNKNOWN_TOKENS)
    }

    /// Whether the prompt token count was measured
    #[must_use]
    pub const fn has_prompt_tokens(&self) -> bool {
        self.prompt_tokens >= 0
    }

    /// Whether the completion token count was measured
    #[must_use]
    pub const fn has_completion_tokens(&self) -> bool {
        self.completion_tokens >= 0
    }

    /// Whether the token ceiling is known
    #[must_use]
    pub const fn has_max_total_tokens(&self) -> bool {
        self.max_total_tokens >= 0
    }

    /// Whether prompt plus completion went over the ceiling
    ///
    /// Unknown values never count as exceeded.
    #[must_use]
    pub fn is_exceeded(&self) -> bool {
        self.has_prompt_tokens()
            && self.has_max_total_tokens()
            && self
                .prompt_tokens
                .saturating_add(self.completion_tokens.max(0))
                > self.max_total_tokens
    }
}

impl Default for TokensUsage {
    fn default() -> Self {
        Self::unknown()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_is_default() {
        let usage = TokensUsage::default();
        assert_eq!(usage, TokensUsage::new(-1, -1, -1));
        assert!(!usage.has_prompt_tokens());
        assert!(!usage.has_completion_tokens());
        assert!(!usage.has_max_total_tokens());
    }

    #[test]
    fn test_is_exceeded() {
        assert!(TokensUsage::new(9279, 0, 8192).is_exceeded());
        assert!(!TokensUsage::new(100, 50, 8192).is_exceeded());
        assert!(!TokensUsage::new(-1, 0, 8192).is_exceeded());
        assert!(TokensUsage::new(8000, 500, 8192).is_exceeded());
        assert!(TokensUsage::new(i64::MAX, i64::MAX, 8192).is_exceeded());
    }

    #[test]
    fn test_wire_format_keeps_sentinel() {
        let json = serde_json::to_value(TokensUsage::new(-1, 0, -1)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"promptTokens": -1, "completionTokens": 0, "maxTotalTokens": -1})
        );
    }
}
