//! Text-generation provider abstractions.
//!
//! The remote summarizer and extractor talk to a provider through
//! [`box_provider::BoxLlmProvider`]; concrete providers live in memora-infra.

pub mod box_provider;
pub mod provider;
