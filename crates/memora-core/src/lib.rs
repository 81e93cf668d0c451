//! Business logic and store trait definitions for Memora.
//!
//! This crate defines the "ports" (the record store, snapshot cipher, and
//! LLM provider traits) that the infrastructure layer implements, plus the
//! services built on them: the session governor, memory extractor, backup
//! codec, and account service. It depends only on `memora-types` -- never
//! on `memora-infra` or any database/IO crate.

pub mod account;
pub mod backup;
pub mod chat;
pub mod llm;
pub mod memory;
pub mod store;
