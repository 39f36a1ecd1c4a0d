//! OpenAI - chat completions and embeddings over the public HTTP API
//!
//! Also works against OpenAI-compatible servers through `OPENAI_BASE_URL`.

pub mod provider;
pub mod types;


pub use provider::OpenAiProvider;
pub use types::{OpenAiConfig, API_KEY_ENV, BASE_URL_ENV, DEFAULT_BASE_URL};

use crate::error::Result;
use crate::error_patterns::ErrorPattern;
use crate::manifest::{factory_fn, ManifestModels, ModelDecl, ProviderManifest};
use crate::provider::ProviderAdapter;
use crate::retry::RetryConfig;
use std::sync::Arc;

/// Provider name used in logs and manifests
pub const PROVIDER_NAME: &str = "OpenAI";

/// Context-length messages, most specific first
const ERROR_PATTERNS: &[&str] = &[
    r"maximum context length is (\d+) tokens\. However, you requested \d+ tokens \((\d+) in the messages, (\d+) in the completion\)",
    r"maximum context length is (\d+) tokens.*?resulted in (\d+) tokens",
    r"maximum context length is (\d+) tokens.*?requested (\d+) tokens",
];

/// Manifest for the default OpenAI model family
///
/// # Errors
/// Returns a configuration error if a built-in error pattern fails to
/// compile.
pub fn manifest() -> Result<ProviderManifest> {
    let error_patterns = ERROR_PATTERNS
        .iter()
        .map(|p| ErrorPattern::tokens(p, true))
        .collect::<Result<Vec<_>>>()?;

    Ok(ProviderManifest {
        provider_name: PROVIDER_NAME.to_string(),
        model_family: "GPT-4o".to_string(),
        models: ManifestModels {
            embeddings: ModelDecl::embeddings(
                "OPENAI_EMBEDDINGS",
                "text-embedding-3-small",
                1536,
                8191,
            ),
            primary_completion: ModelDecl::completions("GPT_4O", "gpt-4o", 16_384, 128_000),
            secondary_completion: Some(ModelDecl::completions(
                "GPT_4O_MINI",
                "gpt-4o-mini",
                16_384,
                128_000,
            )),
        },
        error_patterns,
        retry: RetryConfig::default(),
        factory: factory_fn(|input| {
            let config = OpenAiConfig::from_env(input.env, input.provider_config)?;
            let provider = OpenAiProvider::new(config, Arc::clone(input.models_metadata))?;
            Ok(Arc::new(provider) as Arc<dyn ProviderAdapter>)
        }),
    })
}
