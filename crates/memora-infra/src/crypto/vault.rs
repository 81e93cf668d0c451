//! AES-256-GCM encryption for backup artifacts.
//!
//! The 32-byte key comes from one of:
//! - a raw key (tests, embedding)
//! - a passphrase, stretched with Argon2id
//! - a key file in the data directory, generated on first use
//!
//! Sealed format: `nonce (12 bytes) || ciphertext`
//!
//! SECURITY: error types never contain plaintext or key material.

use std::path::Path;

use aes_gcm::aead::{Aead, KeyInit, OsRng};
use aes_gcm::{AeadCore, Aes256Gcm, Nonce};
use memora_core::backup::cipher::SnapshotCipher;
use memora_types::config::BackupConfig;
use memora_types::error::BackupError;
use thiserror::Error;

const NONCE_SIZE: usize = 12;

/// Fixed Argon2id salt. The passphrase carries the entropy; nothing is
/// stored for verification.
const KDF_SALT: &[u8] = b"memora-backup-v1";

/// File name of the generated key inside the data directory.
pub const KEY_FILE: &str = "backup.key";

/// Errors from vault operations. Never include plaintext or key material.
#[derive(Debug, Error)]
pub enum VaultError {
    #[error("encryption failed")]
    EncryptionFailed,

    #[error("decryption failed")]
    DecryptionFailed,

    #[error("invalid ciphertext: too short")]
    CiphertextTooShort,

    #[error("key derivation failed")]
    KeyDerivationFailed,

    #[error("key file error: {0}")]
    KeyFile(String),
}

/// AES-256-GCM cipher with a random nonce per call, so sealing the same
/// plaintext twice never produces the same output.
pub struct VaultCrypto {
    cipher: Aes256Gcm,
}

impl VaultCrypto {
    pub fn new(key: &[u8; 32]) -> Self {
        Self {
            cipher: Aes256Gcm::new(key.into()),
        }
    }

    /// Derive the key from a passphrase with Argon2id
    /// (19 MiB memory, 2 iterations, 1 lane).
    pub fn from_password(password: &str) -> Result<Self, VaultError> {
        use argon2::{Algorithm, Argon2, Params, Version};

        let params =
            Params::new(19456, 2, 1, Some(32)).map_err(|_| VaultError::KeyDerivationFailed)?;
        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

        let mut key = [0u8; 32];
        argon2
            .hash_password_into(password.as_bytes(), KDF_SALT, &mut key)
            .map_err(|_| VaultError::KeyDerivationFailed)?;

        Ok(Self::new(&key))
    }

    /// Load the hex key at `path`, generating and writing a random one if
    /// the file does not exist yet.
    pub fn from_key_file(path: &Path) -> Result<Self, VaultError> {
        match std::fs::read_to_string(path) {
            Ok(contents) => {
                let bytes = hex_decode(contents.trim())
                    .map_err(|_| VaultError::KeyFile(format!("{} is corrupted", path.display())))?;
                let key: [u8; 32] = bytes.try_into().map_err(|_| {
                    VaultError::KeyFile(format!("{} has an invalid key length", path.display()))
                })?;
                Ok(Self::new(&key))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let key = rand_bytes();
                write_key_file(path, &hex_encode(&key))?;
                tracing::info!(path = %path.display(), "Generated new backup key");
                Ok(Self::new(&key))
            }
            Err(e) => Err(VaultError::KeyFile(format!(
                "cannot read {}: {}",
                path.display(),
                e.kind()
            ))),
        }
    }

    /// Pick the key source from configuration: the passphrase in
    /// `config.passphrase_env` when set and non-empty, else the key file.
    pub fn from_config(config: &BackupConfig, data_dir: &Path) -> Result<Self, VaultError> {
        match std::env::var(&config.passphrase_env) {
            Ok(passphrase) if !passphrase.is_empty() => {
                tracing::debug!(env = %config.passphrase_env, "Backup key derived from passphrase");
                Self::from_password(&passphrase)
            }
            _ => Self::from_key_file(&data_dir.join(KEY_FILE)),
        }
    }

    /// Returns `nonce (12 bytes) || ciphertext`.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, VaultError> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext)
            .map_err(|_| VaultError::EncryptionFailed)?;

        let mut result = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        result.extend_from_slice(&nonce);
        result.extend_from_slice(&ciphertext);
        Ok(result)
    }

    pub fn decrypt(&self, data: &[u8]) -> Result<Vec<u8>, VaultError> {
        if data.len() < NONCE_SIZE {
            return Err(VaultError::CiphertextTooShort);
        }
        let (nonce_bytes, ciphertext) = data.split_at(NONCE_SIZE);
        self.cipher
            .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
            .map_err(|_| VaultError::DecryptionFailed)
    }
}

impl SnapshotCipher for VaultCrypto {
    fn seal(&self, plaintext: &[u8]) -> Result<Vec<u8>, BackupError> {
        self.encrypt(plaintext).map_err(|_| BackupError::Encryption)
    }

    fn open(&self, sealed: &[u8]) -> Result<Vec<u8>, BackupError> {
        self.decrypt(sealed)
            .map_err(|e| BackupError::CorruptBackup(e.to_string()))
    }
}

fn write_key_file(path: &Path, hex_key: &str) -> Result<(), VaultError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| VaultError::KeyFile(format!("cannot create {}: {}", parent.display(), e.kind())))?;
    }
    std::fs::write(path, hex_key)
        .map_err(|e| VaultError::KeyFile(format!("cannot write {}: {}", path.display(), e.kind())))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600)).map_err(|e| {
            VaultError::KeyFile(format!("cannot restrict {}: {}", path.display(), e.kind()))
        })?;
    }
    Ok(())
}

fn rand_bytes() -> [u8; 32] {
    use aes_gcm::aead::rand_core::RngCore;
    let mut key = [0u8; 32];
    OsRng.fill_bytes(&mut key);
    key
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn hex_decode(s: &str) -> Result<Vec<u8>, String> {
    if s.len() % 2 != 0 || !s.is_ascii() {
        return Err("malformed hex string".to_string());
    }
    (0..s.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&s[i..i + 2], 16).map_err(|e| format!("invalid hex at {i}: {e}"))
        })
        .collect()
}
