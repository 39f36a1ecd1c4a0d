//! Router - tiered invocation over one provider
//!
//! # Module Structure
//!
//! - `outcome`: what to do after an unsuccessful attempt
//! - `router_impl`: `Router` with its retry, switch and crop loop

mod outcome;
mod router_impl;


pub use outcome::{handle_unsuccessful_outcome, OutcomeDecision};
pub use router_impl::{CompletionOptions, Router, RESOURCE_KEY};
