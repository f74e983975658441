//! AES-256-GCM sealing for vault entries.
//!
//! Entries are stored as `nonce (12 bytes) || ciphertext+tag`, with a fresh
//! random nonce per write.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use rand::RngCore;

use crate::error::{VaultError, VaultResult};

/// Nonce size for AES-GCM (bytes).
pub const NONCE_LEN: usize = 12;

/// Generate cryptographically secure random bytes.
pub fn generate_random<const N: usize>() -> [u8; N] {
    let mut bytes = [0u8; N];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes
}

/// Generate a random KDF salt (32 bytes).
pub fn generate_salt() -> [u8; 32] {
    generate_random()
}

/// Encrypt a vault entry. Returns `nonce || ciphertext+tag`.
pub fn seal(key: &[u8; 32], plaintext: &[u8]) -> VaultResult<Vec<u8>> {
    let cipher =
        Aes256Gcm::new_from_slice(key).map_err(|e| VaultError::Encryption(e.to_string()))?;

    let nonce_bytes: [u8; NONCE_LEN] = generate_random();
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, plaintext)
        .map_err(|_| VaultError::Encryption("AES-GCM encryption failed".into()))?;

    let mut sealed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    sealed.extend_from_slice(&nonce_bytes);
    sealed.extend_from_slice(&ciphertext);
    Ok(sealed)
}

/// Decrypt a vault entry produced by [`seal`].
pub fn open(key: &[u8; 32], sealed: &[u8]) -> VaultResult<Vec<u8>> {
    if sealed.len() < NONCE_LEN {
        return Err(VaultError::Decryption("sealed entry too short".to_string()));
    }
    let (nonce_bytes, ciphertext) = sealed.split_at(NONCE_LEN);

    let cipher = Aes256Gcm::new_from_slice(key)
        .map_err(|_| VaultError::Decryption("Invalid key".to_string()))?;

    let nonce = Nonce::from_slice(nonce_bytes);

    cipher
        .decrypt(nonce, ciphertext)
        .map_err(|_| VaultError::Decryption("AES-GCM decryption failed".to_string()))
}
