//! Error types for relay-llm
//!
//! Overloaded and token-exceeded outcomes are not errors: they are
//! [`InvocationStatus`](crate::response::InvocationStatus) values that drive
//! the router's retry/switch/crop policy. Everything here terminates an
//! invocation.

use crate::provider::ProviderError;
use thiserror::Error;

/// LLM invocation error type
#[derive(Debug, Error)]
pub enum Error {
    /// Missing or invalid model key, environment value or quality tier list
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Generated payload does not have the shape expected for the task
    #[error("bad response content from model '{model_key}': {reason}")]
    BadResponseContent {
        /// Model that produced the payload
        model_key: String,
        /// What was wrong with it
        reason: String,
    },

    /// Token usage metadata needed for prompt cropping is absent
    #[error("bad response metadata for model '{model_key}': {reason}")]
    BadResponseMetadata {
        /// Model whose response lacked the metadata
        model_key: String,
        /// Which field was missing
        reason: String,
    },

    /// The vendor refused or filtered the content, or the outcome was unknown
    #[error("rejected while processing '{resource}' with model '{model_key}': {reason}")]
    Rejection {
        /// Resource being processed
        resource: String,
        /// Model that rejected it
        model_key: String,
        /// Vendor or router supplied reason
        reason: String,
    },

    /// Vendor error that is neither an overload nor a token-limit error
    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Network error while building or using a vendor client
    #[error("network error: {0}")]
    Network(String),
}

impl Error {
    /// Shorthand for a configuration error
    pub(crate) fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Whether this error is one of the configuration kind
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }

    /// Whether this error is a vendor rejection
    #[must_use]
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::Rejection { .. })
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
