//! Cryptographic operations for Memora.
//!
//! - `vault`: AES-256-GCM sealing of backup artifacts, keyed from a
//!   passphrase (Argon2id) or a generated key file.

pub mod vault;
