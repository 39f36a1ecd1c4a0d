//! Vendor adapters
//!
//! Each vendor module exposes a `manifest()` describing its models and
//! error patterns, plus the adapter the manifest's factory builds.

pub mod openai;
