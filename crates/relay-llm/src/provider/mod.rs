//! Provider adapters
//!
//! # Module Structure
//!
//! - `adapter`: `ProviderAdapter` trait, `ProviderError`, `ProviderSummary`
//! - `execute`: one timed, classified attempt
//! - `mock`: scripted adapter for tests

mod adapter;
mod execute;
mod mock;

pub use adapter::{ProviderAdapter, ProviderError, ProviderSummary};
pub use execute::{execute_attempt, Attempt, ExecutionEnv, LAST_ERROR_KEY, TIMEOUT_MILLIS_KEY};
pub use mock::{MockCall, MockProvider, MOCK_REJECTION_CODE};
