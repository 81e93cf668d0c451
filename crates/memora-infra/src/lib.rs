//! Infrastructure for Memora: the SQLite record store, the backup vault,
//! configuration loading, and the OpenAI-compatible text-generation client.

pub mod config;
pub mod crypto;
pub mod llm;
pub mod sqlite;
