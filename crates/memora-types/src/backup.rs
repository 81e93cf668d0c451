//! Backup snapshot and account export envelope.
//!
//! A `BackupSnapshot` only ever exists transiently: it is built on export,
//! serialized to JSON, encrypted, and discarded. Import reverses that.

use serde::{Deserialize, Serialize};

use crate::conversation::Conversation;
use crate::memory::Memory;
use crate::user::User;

/// Version string written into every account export envelope.
pub const EXPORT_FORMAT_VERSION: &str = "1.0";

/// Every collection of the record store, keyed by collection name.
///
/// Collections missing from a decoded document deserialize as empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BackupSnapshot {
    #[serde(default)]
    pub users: Vec<User>,
    #[serde(default)]
    pub conversations: Vec<Conversation>,
    #[serde(default)]
    pub memories: Vec<Memory>,
}

impl BackupSnapshot {
    pub fn record_count(&self) -> usize {
        self.users.len() + self.conversations.len() + self.memories.len()
    }
}

/// Whole-account export: the user profile plus the encrypted backup artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountExport {
    pub version: String,
    pub user: User,
    /// Encrypted backup artifact, as produced by the backup codec.
    pub database: String,
    /// Export time in epoch milliseconds.
    #[serde(rename = "exportedAt")]
    pub exported_at: i64,
}
