//! Provider manifests
//!
//! A manifest is the already-resolved description of one vendor
//! integration: its models, its error patterns, its retry defaults and a
//! factory that builds the adapter. Discovering manifests is up to the
//! application; the router only consumes them.

use crate::error::{Error, Result};
use crate::error_patterns::ErrorPattern;
use crate::model::{ModelKeysSet, ModelMetadata, ModelPurpose, ModelsMetadata};
use crate::provider::ProviderAdapter;
use crate::retry::{RetryConfig, RetryOverrides};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

// ============================================================================
// Model Declarations
// ============================================================================

/// Declarative model entry; the purpose comes from the slot it occupies
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelDecl {
    /// Internal model key
    pub key: String,
    /// Vendor model identifier
    pub urn: String,
    /// Vector size for embeddings models
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<usize>,
    /// Completion ceiling for completions models
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_completion_tokens: Option<i64>,
    /// Prompt + completion ceiling
    pub max_total_tokens: i64,
}

impl ModelDecl {
    /// Embeddings model declaration
    #[must_use]
    pub fn embeddings(
        key: impl Into<String>,
        urn: impl Into<String>,
        dimensions: usize,
        max_total_tokens: i64,
    ) -> Self {
        Self {
            key: key.into(),
            urn: urn.into(),
            dimensions: Some(dimensions),
            max_completion_tokens: None,
            max_total_tokens,
        }
    }

    /// Completions model declaration
    #[must_use]
    pub fn completions(
        key: impl Into<String>,
        urn: impl Into<String>,
        max_completion_tokens: i64,
        max_total_tokens: i64,
    ) -> Self {
        Self {
            key: key.into(),
            urn: urn.into(),
            dimensions: None,
            max_completion_tokens: Some(max_completion_tokens),
            max_total_tokens,
        }
    }

    fn resolve(&self, purpose: ModelPurpose) -> ModelMetadata {
        ModelMetadata {
            key: self.key.clone(),
            urn: self.urn.clone(),
            purpose,
            dimensions: self.dimensions,
            max_completion_tokens: self.max_completion_tokens,
            max_total_tokens: self.max_total_tokens,
        }
    }
}

/// The model slots of a manifest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestModels {
    /// Embeddings model
    pub embeddings: ModelDecl,
    /// Primary completions model
    pub primary_completion: ModelDecl,
    /// Optional secondary completions model
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secondary_completion: Option<ModelDecl>,
}

// ============================================================================
// Environment & Caller Config
// ============================================================================

/// Environment values handed to a provider factory
#[derive(Debug, Clone, Default)]
pub struct ProviderEnv {
    values: HashMap<String, String>,
}

impl ProviderEnv {
    /// Empty environment
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Environment from explicit pairs
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            values: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Snapshot of the process environment
    #[must_use]
    pub fn from_process() -> Self {
        Self::from_pairs(std::env::vars())
    }

    /// Set a value
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    /// Optional value; blank values count as missing
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.trim().is_empty())
    }

    /// Required value
    ///
    /// # Errors
    /// Returns [`Error::Configuration`] if the value is missing or blank.
    pub fn require(&self, key: &str) -> Result<&str> {
        self.get(key)
            .ok_or_else(|| Error::config(format!("required environment value '{key}' is not set")))
    }
}

/// Caller supplied provider settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Endpoint override
    pub base_url: Option<String>,
    /// Retry overrides applied on top of the manifest defaults
    pub retry: RetryOverrides,
}

// ============================================================================
// Factory & Manifest
// ============================================================================

/// Everything a factory receives to build an adapter
#[derive(Clone, Copy)]
pub struct FactoryInput<'a> {
    /// Environment values
    pub env: &'a ProviderEnv,
    /// Role → model key mapping
    pub model_keys: &'a ModelKeysSet,
    /// Resolved metadata for every declared model
    pub models_metadata: &'a Arc<ModelsMetadata>,
    /// Vendor error patterns
    pub error_patterns: &'a [ErrorPattern],
    /// Caller config, if any
    pub provider_config: Option<&'a ProviderConfig>,
}

/// Builds a provider adapter from a resolved manifest
pub trait ProviderFactory: Send + Sync {
    /// Create the adapter
    ///
    /// # Errors
    /// Returns a configuration error for missing environment values, or a
    /// network error if the vendor client cannot be built.
    fn create(&self, input: FactoryInput<'_>) -> Result<Arc<dyn ProviderAdapter>>;
}

impl<F> ProviderFactory for F
where
    F: Fn(FactoryInput<'_>) -> Result<Arc<dyn ProviderAdapter>> + Send + Sync,
{
    fn create(&self, input: FactoryInput<'_>) -> Result<Arc<dyn ProviderAdapter>> {
        self(input)
    }
}

/// Wrap a closure as a shareable [`ProviderFactory`]
pub fn factory_fn<F>(factory: F) -> Arc<dyn ProviderFactory>
where
    F: Fn(FactoryInput<'_>) -> Result<Arc<dyn ProviderAdapter>> + Send + Sync + 'static,
{
    Arc::new(factory)
}

/// Resolved description of one vendor integration
#[derive(Clone)]
pub struct ProviderManifest {
    /// Provider name, e.g. `"OpenAI"`
    pub provider_name: String,
    /// Model family label
    pub model_family: String,
    /// Declared models
    pub models: ManifestModels,
    /// Vendor error patterns, in priority order
    pub error_patterns: Vec<ErrorPattern>,
    /// Provider retry defaults
    pub retry: RetryConfig,
    /// Adapter factory
    pub factory: Arc<dyn ProviderFactory>,
}

impl fmt::Debug for ProviderManifest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderManifest")
            .field("provider_name", &self.provider_name)
            .field("model_family", &self.model_family)
            .field("models", &self.models)
            .field("error_patterns", &self.error_patterns.len())
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

impl ProviderManifest {
    /// Role → model key mapping
    #[must_use]
    pub fn model_keys(&self) -> ModelKeysSet {
        ModelKeysSet {
            embeddings_key: self.models.embeddings.key.clone(),
            primary_completion_key: self.models.primary_completion.key.clone(),
            secondary_completion_key: self
                .models
                .secondary_completion
                .as_ref()
                .map(|m| m.key.clone()),
        }
    }

    /// Validate every declared model and build the metadata table
    ///
    /// # Errors
    /// Returns [`Error::Configuration`] for invalid or duplicate models.
    pub fn resolve_metadata(&self) -> Result<ModelsMetadata> {
        let mut models = vec![
            self.models.embeddings.resolve(ModelPurpose::Embeddings),
            self.models
                .primary_completion
                .resolve(ModelPurpose::Completions),
        ];
        if let Some(secondary) = &self.models.secondary_completion {
            models.push(secondary.resolve(ModelPurpose::Completions));
        }
        ModelsMetadata::new(models)
    }

    /// Retry settings after applying caller overrides
    #[must_use]
    pub fn resolve_retry(&self, provider_config: Option<&ProviderConfig>) -> RetryConfig {
        match provider_config {
            Some(config) => self.retry.with_overrides(&config.retry),
            None => self.retry,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::MockProvider;

    fn manifest() -> ProviderManifest {
        ProviderManifest {
            provider_name: "Mock".to_string(),
            model_family: "MockFamily".to_string(),
            models: ManifestModels {
                embeddings: ModelDecl::embeddings("EMB", "mock-embed", 4, 8192),
                primary_completion: ModelDecl::completions("BIG", "mock-big", 4096, 128_000),
                secondary_completion: Some(ModelDecl::completions(
                    "SMALL", "mock-small", 2048, 16_000,
                )),
            },
            error_patterns: vec![],
            retry: RetryConfig::default(),
            factory: factory_fn(|_input| {
                Ok(Arc::new(MockProvider::new()) as Arc<dyn ProviderAdapter>)
            }),
        }
    }

    #[test]
    fn test_resolve_metadata() {
        let manifest = manifest();
        let metadata = manifest.resolve_metadata().unwrap();
        assert_eq!(metadata.len(), 3);
        assert_eq!(metadata.get("EMB").unwrap().purpose, ModelPurpose::Embeddings);
        assert_eq!(metadata.get("SMALL").unwrap().purpose, ModelPurpose::Completions);

        let keys = manifest.model_keys();
        assert!(keys.validate_against(&metadata).is_ok());
        assert_eq!(keys.secondary_completion_key.as_deref(), Some("SMALL"));
    }

    #[test]
    fn test_resolve_metadata_rejects_invalid_model() {
        let mut manifest = manifest();
        manifest.models.embeddings.dimensions = None;
        assert!(manifest.resolve_metadata().unwrap_err().is_configuration());
    }

    #[test]
    fn test_env_require() {
        let env = ProviderEnv::from_pairs([("API_KEY", "abc"), ("BLANK", "  ")]);
        assert_eq!(env.require("API_KEY").unwrap(), "abc");
        assert!(env.require("BLANK").unwrap_err().is_configuration());
        assert!(env.require("MISSING").is_err());
        assert_eq!(env.get("BLANK"), None);
    }

    #[test]
    fn test_resolve_retry_applies_overrides() {
        let manifest = manifest();
        let config = ProviderConfig {
            base_url: None,
            retry: RetryOverrides {
                max_attempts: Some(9),
                ..Default::default()
            },
        };
        assert_eq!(manifest.resolve_retry(Some(&config)).max_attempts, 9);
        assert_eq!(manifest.resolve_retry(None), RetryConfig::default());
    }
}
