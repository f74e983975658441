//! # plasmoscan-vault
//!
//! Secure credential storage for plasmoscan field devices.
//!
//! Session state survives process restarts in an encrypted vault file:
//! AES-256-GCM per entry, key derived from the device passphrase with
//! Argon2id. The session manager is the vault's only writer.

pub mod cipher;
pub mod error;
pub mod kdf;
pub mod store;

pub use error::{VaultError, VaultResult};
pub use kdf::{derive_key, DerivedKey, KdfParams, MIN_PASSPHRASE_LENGTH};
pub use store::{FileCredentialStore, MemoryCredentialStore};
