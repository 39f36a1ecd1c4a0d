//! Model metadata and role types
//!
//! Models are addressed by an internal key (e.g. `"GPT_COMPLETIONS_GPT4"`)
//! that is distinct from the vendor's external identifier, the `urn`.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

// ============================================================================
// Purpose & Quality Tier
// ============================================================================

/// What a model is used for, which is also the task type of an invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelPurpose {
    /// Vector embeddings
    Embeddings,
    /// Text completions
    Completions,
}

impl ModelPurpose {
    /// Returns the string representation
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Embeddings => "embeddings",
            Self::Completions => "completions",
        }
    }
}

impl fmt::Display for ModelPurpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Completion quality tier within one provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityTier {
    /// The main (usually stronger) completion model
    Primary,
    /// The optional fallback completion model
    Secondary,
}

impl QualityTier {
    /// Returns the string representation
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::Secondary => "secondary",
        }
    }
}

impl fmt::Display for QualityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for QualityTier {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "primary" => Ok(Self::Primary),
            "secondary" => Ok(Self::Secondary),
            other => Err(Error::config(format!("unknown quality tier '{other}'"))),
        }
    }
}

// ============================================================================
// Model Metadata
// ============================================================================

/// Resolved, immutable description of one model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelMetadata {
    /// Internal model key
    pub key: String,
    /// Vendor model identifier
    pub urn: String,
    /// Embeddings or completions
    pub purpose: ModelPurpose,
    /// Vector size, required for embeddings models
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<usize>,
    /// Completion ceiling, required for completions models
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_completion_tokens: Option<i64>,
    /// Prompt + completion ceiling
    pub max_total_tokens: i64,
}

impl ModelMetadata {
    /// Check the per-purpose invariants
    ///
    /// # Errors
    /// Returns [`Error::Configuration`] describing the first violated rule.
    pub fn validate(&self) -> Result<()> {
        if self.key.trim().is_empty() {
            return Err(Error::config("model key must not be empty"));
        }
        if self.urn.trim().is_empty() {
            return Err(Error::config(format!("model '{}' has an empty urn", self.key)));
        }
        if self.max_total_tokens <= 0 {
            return Err(Error::config(format!(
                "model '{}' must declare a positive max_total_tokens",
                self.key
            )));
        }

        match self.purpose {
            ModelPurpose::Embeddings => {
                if self.dimensions.is_none_or(|d| d == 0) {
                    return Err(Error::config(format!(
                        "embeddings model '{}' must declare dimensions",
                        self.key
                    )));
                }
            }
            ModelPurpose::Completions => {
                if self.max_completion_tokens.is_none_or(|t| t <= 0) {
                    return Err(Error::config(format!(
                        "completions model '{}' must declare max_completion_tokens",
                        self.key
                    )));
                }
            }
        }

        if let Some(max_completion) = self.max_completion_tokens {
            if max_completion > self.max_total_tokens {
                return Err(Error::config(format!(
                    "model '{}' has max_completion_tokens ({}) above max_total_tokens ({})",
                    self.key, max_completion, self.max_total_tokens
                )));
            }
        }

        Ok(())
    }
}

/// Read-only lookup table of resolved model metadata
#[derive(Debug, Clone, Default)]
pub struct ModelsMetadata {
    models: HashMap<String, ModelMetadata>,
}

impl ModelsMetadata {
    /// Build a table, validating every entry
    ///
    /// # Errors
    /// Returns a configuration error for invalid or duplicate models.
    pub fn new(models: impl IntoIterator<Item = ModelMetadata>) -> Result<Self> {
        let mut table = HashMap::new();
        for model in models {
            model.validate()?;
            if table.contains_key(&model.key) {
                return Err(Error::config(format!("duplicate model key '{}'", model.key)));
            }
            table.insert(model.key.clone(), model);
        }
        Ok(Self { models: table })
    }

    /// Look up a model by key
    ///
    /// # Errors
    /// Returns [`Error::Configuration`] for an unknown key.
    pub fn get(&self, key: &str) -> Result<&ModelMetadata> {
        self.models
            .get(key)
            .ok_or_else(|| Error::config(format!("unknown model key '{key}'")))
    }

    /// Whether the key is known
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.models.contains_key(key)
    }

    /// Number of models
    #[must_use]
    pub fn len(&self) -> usize {
        self.models.len()
    }

    /// Whether the table is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

// ============================================================================
// Model Keys Set
// ============================================================================

/// Maps logical roles onto model keys
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelKeysSet {
    /// Embeddings model
    pub embeddings_key: String,
    /// Primary completions model
    pub primary_completion_key: String,
    /// Optional secondary completions model
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secondary_completion_key: Option<String>,
}

impl ModelKeysSet {
    /// Completion model key for a tier, if that tier is configured
    #[must_use]
    pub fn completion_key(&self, tier: QualityTier) -> Option<&str> {
        match tier {
            QualityTier::Primary => Some(&self.primary_completion_key),
            QualityTier::Secondary => self.secondary_completion_key.as_deref(),
        }
    }

    /// Ensure every key exists in the metadata table with the right purpose
    ///
    /// # Errors
    /// Returns [`Error::Configuration`] on the first mismatch.
    pub fn validate_against(&self, metadata: &ModelsMetadata) -> Result<()> {
        let expect = |key: &str, purpose: ModelPurpose| -> Result<()> {
            let model = metadata.get(key)?;
            if model.purpose != purpose {
                return Err(Error::config(format!(
                    "model '{key}' is declared for {} but used for {purpose}",
                    model.purpose
                )));
            }
            Ok(())
        };

        expect(&self.embeddings_key, ModelPurpose::Embeddings)?;
        expect(&self.primary_completion_key, ModelPurpose::Completions)?;
        if let Some(secondary) = &self.secondary_completion_key {
            expect(secondary, ModelPurpose::Completions)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn completions(key: &str, max_completion: i64, max_total: i64) -> ModelMetadata {
        ModelMetadata {
            key: key.to_string(),
            urn: format!("{}-urn", key.to_lowercase()),
            purpose: ModelPurpose::Completions,
            dimensions: None,
            max_completion_tokens: Some(max_completion),
            max_total_tokens: max_total,
        }
    }

    #[test]
    fn test_validate_completions() {
        assert!(completions("GPT", 4096, 128_000).validate().is_ok());

        let mut missing = completions("GPT", 4096, 128_000);
        missing.max_completion_tokens = None;
        assert!(missing.validate().unwrap_err().is_configuration());

        let too_big = completions("GPT", 200_000, 128_000);
        assert!(too_big.validate().is_err());
    }

    #[test]
    fn test_validate_embeddings_requires_dimensions() {
        let mut model = ModelMetadata {
            key: "EMB".to_string(),
            urn: "text-embedding-3-small".to_string(),
            purpose: ModelPurpose::Embeddings,
            dimensions: None,
            max_completion_tokens: None,
            max_total_tokens: 8191,
        };
        assert!(model.validate().is_err());

        model.dimensions = Some(1536);
        assert!(model.validate().is_ok());
    }

    #[test]
    fn test_models_metadata_rejects_duplicates() {
        let result = ModelsMetadata::new(vec![
            completions("GPT", 4096, 128_000),
            completions("GPT", 4096, 128_000),
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_unknown_key_is_configuration_error() {
        let table = ModelsMetadata::new(vec![completions("GPT", 4096, 128_000)]).unwrap();
        assert!(table.get("GPT").is_ok());
        assert!(table.get("MISSING").unwrap_err().is_configuration());
    }

    #[test]
    fn test_keys_set_checks_purpose() {
        let table = ModelsMetadata::new(vec![completions("GPT", 4096, 128_000)]).unwrap();
        let keys = ModelKeysSet {
            embeddings_key: "GPT".to_string(),
            primary_completion_key: "GPT".to_string(),
            secondary_completion_key: None,
        };
        assert!(keys.validate_against(&table).is_err());
        assert_eq!(keys.completion_key(QualityTier::Primary), Some("GPT"));
        assert_eq!(keys.completion_key(QualityTier::Secondary), None);
    }

    #[test]
    fn test_quality_tier_from_str() {
        assert_eq!("Primary".parse::<QualityTier>().unwrap(), QualityTier::Primary);
        assert_eq!("secondary".parse::<QualityTier>().unwrap(), QualityTier::Secondary);
        assert!("tertiary".parse::<QualityTier>().is_err());
    }
}
