//! Shared domain types for Memora.
//!
//! This crate contains the entities persisted by the local-first record
//! store (User, Conversation, Memory), the backup artifact shapes, global
//! configuration, LLM request/response types, and the error taxonomy.
//!
//! Zero infrastructure dependencies -- only serde, uuid, chrono, thiserror.

pub mod backup;
pub mod config;
pub mod conversation;
pub mod error;
pub mod llm;
pub mod memory;
pub mod record;
pub mod user;
