//! Application configuration
//!
//! Contains the configuration structures for the `relay` binary.

mod loader;

pub use loader::{load_config, DEFAULT_CONFIG};

use relay_llm::{ProviderConfig, RetryOverrides};
use serde::{Deserialize, Serialize};

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    pub provider: ProviderSection,
    #[serde(default)]
    pub stats: StatsSection,
}

/// Which vendor to use and how to talk to it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderSection {
    #[serde(default = "default_provider_name")]
    pub name: String,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub retry: RetryOverrides,
}

fn default_provider_name() -> String {
    "openai".to_string()
}

impl Default for ProviderSection {
    fn default() -> Self {
        Self {
            name: default_provider_name(),
            base_url: None,
            retry: RetryOverrides::default(),
        }
    }
}

impl ProviderSection {
    /// Settings handed to the provider manifest
    pub fn provider_config(&self) -> ProviderConfig {
        ProviderConfig {
            base_url: self.base_url.clone(),
            retry: self.retry,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatsSection {
    #[serde(default)]
    pub details: bool,
}
