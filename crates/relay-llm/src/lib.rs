//! Relay LLM - tiered LLM invocation router
//!
//! This crate sends completion and embedding requests to one vendor and
//! absorbs the vendor's failure modes:
//! - Retry: overloaded or timed-out attempts wait a jittered delay and retry
//! - Tiers: a primary and an optional secondary completions model
//! - Cropping: prompts over the context limit are cut proportionally
//! - Error patterns: token usage recovered from vendor error text
//! - Stats: process-wide success / failure / switch / retry / crop counters
//! - OpenAI: reqwest adapter for OpenAI-compatible APIs

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod error_patterns;
pub mod manifest;
pub mod model;
pub mod prompt;
pub mod provider;
pub mod providers;
pub mod response;
pub mod retry;
pub mod router;
pub mod stats;
pub mod usage;
pub mod util;

pub use error::{Error, Result};
pub use error_patterns::{
    extract_from_error_message, parse_token_usage, ErrorPattern, PatternUnits,
    CHARS_PER_TOKEN_ESTIMATE,
};
pub use manifest::{
    factory_fn, FactoryInput, ManifestModels, ModelDecl, ProviderConfig, ProviderEnv,
    ProviderFactory, ProviderManifest,
};
pub use model::{ModelKeysSet, ModelMetadata, ModelPurpose, ModelsMetadata, QualityTier};
pub use prompt::{PromptAdapter, PromptReductionStrategy, TokenLimitReductionStrategy};
pub use provider::{
    execute_attempt, Attempt, ExecutionEnv, MockCall, MockProvider, ProviderAdapter,
    ProviderError, ProviderSummary,
};
pub use response::{
    default_missing_values, post_process, Generated, InvocationContext, InvocationResponse,
    InvocationStatus, ResponseContent,
};
pub use retry::{RetryConfig, RetryOverrides};
pub use router::{
    handle_unsuccessful_outcome, CompletionOptions, OutcomeDecision, Router,
};
pub use stats::{StatKind, StatsCounter, StatsSnapshot};
pub use usage::{TokensUsage, UNKNOWN_TOKENS};

// Re-export vendor adapters
pub use providers::openai::{OpenAiConfig, OpenAiProvider};
