//! Error types for vault operations.

use thiserror::Error;

/// Result alias for vault-internal operations.
pub type VaultResult<T> = std::result::Result<T, VaultError>;

/// Vault operation errors.
#[derive(Error, Debug)]
pub enum VaultError {
    /// Key derivation failed.
    #[error("Key derivation failed: {0}")]
    KeyDerivation(String),

    /// Encryption failed.
    #[error("Encryption failed: {0}")]
    Encryption(String),

    /// Decryption failed - wrong key or corrupted data.
    #[error("Decryption failed: {0}")]
    Decryption(String),

    /// Vault file is not in the expected format.
    #[error("Vault format error: {0}")]
    Format(String),

    /// Passphrase too short.
    #[error("Passphrase too short (minimum {0} characters required)")]
    PassphraseTooShort(usize),

    /// File I/O failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<VaultError> for plasmoscan_core::Error {
    fn from(e: VaultError) -> Self {
        plasmoscan_core::Error::Storage(e.to_string())
    }
}
