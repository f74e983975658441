//! Key derivation using Argon2id.

use argon2::{Algorithm, Argon2, Params, Version};
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{VaultError, VaultResult};

/// Minimum device passphrase length.
pub const MIN_PASSPHRASE_LENGTH: usize = 12;

/// Argon2id parameters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct KdfParams {
    /// Memory in KiB (default: 32768 = 32 MiB, sized for handheld devices).
    pub memory_kib: u32,
    /// Time iterations (default: 3).
    pub iterations: u32,
    /// Parallelism degree (default: 2).
    pub parallelism: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            memory_kib: 32768, // 32 MiB
            iterations: 3,
            parallelism: 2,
        }
    }
}

impl KdfParams {
    /// High-security parameters for workstation deployments.
    pub fn high_security() -> Self {
        Self {
            memory_kib: 131072, // 128 MiB
            iterations: 4,
            parallelism: 4,
        }
    }
}

/// Key wrapper with automatic zeroization on drop.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct DerivedKey {
    key: [u8; 32],
}

impl DerivedKey {
    /// Create a new derived key from raw bytes.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self { key: bytes }
    }

    /// Get the key bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.key
    }
}

impl std::fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DerivedKey")
            .field("key", &"[REDACTED]")
            .finish()
    }
}

/// Derive a 256-bit key from a device passphrase using Argon2id.
pub fn derive_key(
    passphrase: &[u8],
    salt: &[u8; 32],
    params: &KdfParams,
) -> VaultResult<DerivedKey> {
    if passphrase.len() < MIN_PASSPHRASE_LENGTH {
        return Err(VaultError::PassphraseTooShort(MIN_PASSPHRASE_LENGTH));
    }

    let argon2_params = Params::new(
        params.memory_kib,
        params.iterations,
        params.parallelism,
        Some(32),
    )
    .map_err(|e| VaultError::KeyDerivation(e.to_string()))?;

    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, argon2_params);

    let mut key = [0u8; 32];
    argon2
        .hash_password_into(passphrase, salt, &mut key)
        .map_err(|e| VaultError::KeyDerivation(e.to_string()))?;

    Ok(DerivedKey { key })
}
