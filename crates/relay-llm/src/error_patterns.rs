//! Token accounting recovered from vendor error text
//!
//! Vendors report context-length failures as free text, e.g.
//! `"Max input tokens: 8192, request input token count: 9279"`. Each provider
//! declares an ordered list of [`ErrorPattern`]s describing how to read the
//! limit and the usage out of such messages.

use crate::error::{Error, Result};
use crate::model::ModelsMetadata;
use crate::usage::{TokensUsage, UNKNOWN_TOKENS};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Average characters per token used when nothing better is known
pub const CHARS_PER_TOKEN_ESTIMATE: f64 = 2.8;

/// Unit of the two numbers captured by an [`ErrorPattern`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatternUnits {
    /// Captured numbers are token counts
    Tokens,
    /// Captured numbers are character counts
    Chars,
}

/// How to read a limit and a usage value out of a vendor error message
#[derive(Debug, Clone)]
pub struct ErrorPattern {
    /// Regex with at least two capture groups
    pub pattern: Regex,
    /// Unit of the captured numbers
    pub units: PatternUnits,
    /// Whether the limit is captured before the usage value
    pub is_max_first: bool,
}

impl ErrorPattern {
    /// Compile a pattern
    ///
    /// # Errors
    /// Returns a configuration error if the regex is invalid or declares fewer
    /// than two capture groups.
    pub fn new(pattern: &str, units: PatternUnits, is_max_first: bool) -> Result<Self> {
        let pattern = Regex::new(pattern)
            .map_err(|e| Error::config(format!("invalid error pattern '{pattern}': {e}")))?;

        // captures_len() counts the implicit whole-match group
        if pattern.captures_len() < 3 {
            return Err(Error::config(format!(
                "error pattern '{}' needs at least two capture groups",
                pattern.as_str()
            )));
        }

        Ok(Self {
            pattern,
            units,
            is_max_first,
        })
    }

    /// Token-count pattern
    ///
    /// # Errors
    /// See [`ErrorPattern::new`].
    pub fn tokens(pattern: &str, is_max_first: bool) -> Result<Self> {
        Self::new(pattern, PatternUnits::Tokens, is_max_first)
    }

    /// Character-count pattern
    ///
    /// # Errors
    /// See [`ErrorPattern::new`].
    pub fn chars(pattern: &str, is_max_first: bool) -> Result<Self> {
        Self::new(pattern, PatternUnits::Chars, is_max_first)
    }
}

fn parse_count(raw: Option<regex::Match<'_>>) -> Option<i64> {
    let digits: String = raw?
        .as_str()
        .chars()
        .filter(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

/// Read token usage out of a vendor error message
///
/// Patterns are tried in order and the first one that matches wins, even if
/// its numbers turn out to be unreadable. Without a match the result is
/// `{prompt: -1, completion: 0, max: -1}`.
///
/// # Errors
/// Returns a configuration error only when a character-based pattern matches
/// and `model_key` is unknown.
pub fn parse_token_usage(
    model_key: &str,
    error_text: &str,
    models_metadata: &ModelsMetadata,
    patterns: &[ErrorPattern],
) -> Result<TokensUsage> {
    let mut usage = TokensUsage::new(UNKNOWN_TOKENS, 0, UNKNOWN_TOKENS);

    let Some((pattern, captures)) = patterns.iter().find_map(|p| {
        p.pattern
            .captures(error_text)
            .filter(|c| c.len() >= 3)
            .map(|c| (p, c))
    }) else {
        return Ok(usage);
    };

    let first = parse_count(captures.get(1));
    let second = parse_count(captures.get(2));
    let (limit, used) = if pattern.is_max_first {
        (first, second)
    } else {
        (second, first)
    };

    match pattern.units {
        PatternUnits::Tokens => {
            usage.max_total_tokens = limit.unwrap_or(UNKNOWN_TOKENS);
            usage.prompt_tokens = used.unwrap_or(UNKNOWN_TOKENS);
            if let Some(completion) = parse_count(captures.get(3)) {
                usage.completion_tokens = completion;
            }
        }
        PatternUnits::Chars => {
            let max_total_tokens = models_metadata.get(model_key)?.max_total_tokens;
            let estimate = match (limit, used) {
                (Some(limit_chars), Some(used_chars)) if limit_chars > 0 => {
                    ((used_chars as f64 / limit_chars as f64) * max_total_tokens as f64).ceil()
                        as i64
                }
                _ => 0,
            };
            usage.max_total_tokens = max_total_tokens;
            usage.prompt_tokens = estimate.max(max_total_tokens.saturating_add(1));
        }
    }

    debug!(
        model_key,
        pattern = pattern.pattern.as_str(),
        prompt_tokens = usage.prompt_tokens,
        completion_tokens = usage.completion_tokens,
        max_total_tokens = usage.max_total_tokens,
        "Parsed token usage from error message"
    );

    Ok(usage)
}

/// Token usage for a token-limit error, filling gaps with estimates
///
/// An unknown prompt count is estimated from the prompt length and forced
/// above the assumed ceiling; an unknown ceiling falls back to the model's
/// published limit.
///
/// # Errors
/// Returns a configuration error for an unknown `model_key`.
pub fn extract_from_error_message(
    model_key: &str,
    prompt_text: &str,
    error_text: &str,
    models_metadata: &ModelsMetadata,
    patterns: &[ErrorPattern],
) -> Result<TokensUsage> {
    let mut usage = parse_token_usage(model_key, error_text, models_metadata, patterns)?;
    let published_max = models_metadata.get(model_key)?.max_total_tokens;

    if !usage.has_prompt_tokens() {
        let assumed_max = if usage.has_max_total_tokens() {
            usage.max_total_tokens
        } else {
            published_max
        };
        let estimate = (prompt_text.chars().count() as f64 / CHARS_PER_TOKEN_ESTIMATE).floor() as i64;
        usage.prompt_tokens = estimate.max(assumed_max.saturating_add(1));
    }

    if !usage.has_max_total_tokens() {
        usage.max_total_tokens = published_max;
    }

    Ok(usage)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ModelMetadata, ModelPurpose};

    fn metadata() -> ModelsMetadata {
        ModelsMetadata::new(vec![ModelMetadata {
            key: "TITAN".to_string(),
            urn: "amazon.titan-embed-text-v1".to_string(),
            purpose: ModelPurpose::Embeddings,
            dimensions: Some(1536),
            max_completion_tokens: None,
            max_total_tokens: 8192,
        }])
        .unwrap()
    }

    fn bedrock_patterns() -> Vec<ErrorPattern> {
        vec![
            ErrorPattern::tokens(
                r"Max input tokens: (\d+), request input token count: (\d+)",
                true,
            )
            .unwrap(),
            ErrorPattern::chars(r"maxLength: (\d+), actual: (\d+)", true).unwrap(),
        ]
    }

    #[test]
    fn test_tokens_pattern_max_first() {
        let usage = parse_token_usage(
            "TITAN",
            "Max input tokens: 8192, request input token count: 9279",
            &metadata(),
            &bedrock_patterns(),
        )
        .unwrap();

        assert_eq!(usage, TokensUsage::new(9279, 0, 8192));
    }

    #[test]
    fn test_tokens_pattern_used_first_with_completion() {
        let patterns = vec![ErrorPattern::tokens(
            r"you requested (\d+) tokens but the limit is (\d+) \((\d+) for completion\)",
            false,
        )
        .unwrap()];

        let usage = parse_token_usage(
            "TITAN",
            "you requested 10500 tokens but the limit is 8192 (700 for completion)",
            &metadata(),
            &patterns,
        )
        .unwrap();

        assert_eq!(usage, TokensUsage::new(10500, 700, 8192));
    }

    #[test]
    fn test_chars_pattern_exceeds_limit() {
        let usage = parse_token_usage(
            "TITAN",
            "Input is too long, maxLength: 50000, actual: 52611",
            &metadata(),
            &bedrock_patterns(),
        )
        .unwrap();

        assert_eq!(usage.max_total_tokens, 8192);
        assert!(usage.prompt_tokens > 8192);
        // ceil(52611 / 50000 * 8192) = 8620
        assert_eq!(usage.prompt_tokens, 8620);
    }

    #[test]
    fn test_chars_pattern_is_floored_above_limit() {
        let usage = parse_token_usage(
            "TITAN",
            "maxLength: 50000, actual: 10",
            &metadata(),
            &bedrock_patterns(),
        )
        .unwrap();

        assert_eq!(usage.prompt_tokens, 8193);
    }

    #[test]
    fn test_first_matching_pattern_wins() {
        let patterns = vec![
            ErrorPattern::tokens(r"limit (\d+) used (\d+)", true).unwrap(),
            ErrorPattern::tokens(r"limit (\d+) used (\d+)", false).unwrap(),
        ];

        let usage =
            parse_token_usage("TITAN", "limit 100 used 200", &metadata(), &patterns).unwrap();
        assert_eq!(usage.max_total_tokens, 100);
        assert_eq!(usage.prompt_tokens, 200);
    }

    #[test]
    fn test_no_match_returns_sentinel() {
        let expected = TokensUsage::new(-1, 0, -1);

        let usage =
            parse_token_usage("TITAN", "something else", &metadata(), &bedrock_patterns()).unwrap();
        assert_eq!(usage, expected);

        let usage = parse_token_usage("TITAN", "something else", &metadata(), &[]).unwrap();
        assert_eq!(usage, expected);
    }

    #[test]
    fn test_pattern_needs_two_groups() {
        assert!(ErrorPattern::tokens(r"limit (\d+)", true).is_err());
        assert!(ErrorPattern::tokens(r"limit (\d+", true).is_err());
    }

    #[test]
    fn test_extract_estimates_unknown_prompt() {
        let prompt = "x".repeat(28_000);
        let usage = extract_from_error_message(
            "TITAN",
            &prompt,
            "context too long",
            &metadata(),
            &bedrock_patterns(),
        )
        .unwrap();

        // 28000 / 2.8 = 10000 which is above 8192 + 1
        assert_eq!(usage.prompt_tokens, 10_000);
        assert_eq!(usage.max_total_tokens, 8192);
        assert_eq!(usage.completion_tokens, 0);
    }

    #[test]
    fn test_extract_short_prompt_still_exceeds() {
        let usage = extract_from_error_message(
            "TITAN",
            "short prompt",
            "context too long",
            &metadata(),
            &[],
        )
        .unwrap();

        assert_eq!(usage.prompt_tokens, 8193);
        assert!(usage.is_exceeded());
    }

    #[test]
    fn test_extract_keeps_parsed_values() {
        let usage = extract_from_error_message(
            "TITAN",
            "irrelevant",
            "Max input tokens: 8192, request input token count: 9279",
            &metadata(),
            &bedrock_patterns(),
        )
        .unwrap();

        assert_eq!(usage, TokensUsage::new(9279, 0, 8192));
    }

    #[test]
    fn test_extract_unknown_model_is_configuration_error() {
        let err = extract_from_error_message("NOPE", "p", "e", &metadata(), &[]).unwrap_err();
        assert!(err.is_configuration());
    }
}
