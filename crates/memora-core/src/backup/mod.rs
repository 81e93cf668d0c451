//! Encrypted whole-store backup.
//!
//! `cipher` is the port the infrastructure layer implements (AES-256-GCM in
//! memora-infra); `codec` builds and restores the snapshot artifact.

pub mod cipher;
pub mod codec;
