//! SnapshotCipher trait definition.

use memora_types::error::BackupError;

/// Authenticated symmetric encryption for backup artifacts.
///
/// `open` must reject tampered or foreign ciphertext with
/// `BackupError::CorruptBackup`; it never returns unauthenticated plaintext.
/// Implementations live in memora-infra (e.g., `VaultCrypto`).
pub trait SnapshotCipher: Send + Sync {
    fn seal(&self, plaintext: &[u8]) -> Result<Vec<u8>, BackupError>;

    fn open(&self, sealed: &[u8]) -> Result<Vec<u8>, BackupError>;
}
