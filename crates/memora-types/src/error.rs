use thiserror::Error;
use uuid::Uuid;

use crate::record::Collection;

/// Errors from record store operations (used by trait definitions in memora-core).
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record '{id}' already exists in {collection}")]
    DuplicateKey { collection: Collection, id: Uuid },

    #[error("record '{id}' not found in {collection}")]
    NotFound { collection: Collection, id: Uuid },

    /// A guarded write found the record in a state it no longer accepts.
    #[error("record '{id}' in {collection} changed concurrently")]
    Conflict { collection: Collection, id: Uuid },

    #[error("storage quota exceeded")]
    QuotaExceeded,

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("query error: {0}")]
    Query(String),

    #[error("database connection error")]
    Connection,
}

/// Errors from backup export and import.
///
/// Never carries ciphertext, plaintext, or key material.
#[derive(Debug, Error)]
pub enum BackupError {
    #[error("corrupt backup: {0}")]
    CorruptBackup(String),

    #[error("backup encryption failed")]
    Encryption,

    #[error("unsupported export version '{0}'")]
    UnsupportedVersion(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Errors from conversation and session governor operations.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("conversation '{0}' not found")]
    ConversationNotFound(Uuid),

    #[error("user '{0}' not found")]
    UserNotFound(Uuid),

    #[error("conversation '{conversation_id}' was rolled over into '{successor}'; resubmit there")]
    Superseded { conversation_id: Uuid, successor: Uuid },

    #[error("message content is empty")]
    EmptyMessage,

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Errors from account-level operations.
#[derive(Debug, Error)]
pub enum AccountError {
    #[error("user '{0}' not found")]
    UserNotFound(Uuid),

    #[error("invalid display name: {0}")]
    InvalidName(String),

    #[error(transparent)]
    Backup(#[from] BackupError),

    #[error(transparent)]
    Store(#[from] StoreError),
}
