//! Credential store implementations.
//!
//! [`FileCredentialStore`] is the on-device store: a single JSON file whose
//! entries are sealed with AES-256-GCM under a key derived from the device
//! passphrase. [`MemoryCredentialStore`] backs tests.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use base64::Engine;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use plasmoscan_core::{CredentialStore, Error, Result};

use crate::cipher;
use crate::error::{VaultError, VaultResult};
use crate::kdf::{self, DerivedKey, KdfParams};

/// On-disk vault format version.
const VAULT_VERSION: u32 = 1;

fn b64() -> base64::engine::GeneralPurpose {
    base64::engine::general_purpose::STANDARD
}

/// Serialized vault file shape.
#[derive(Debug, Serialize, Deserialize)]
struct VaultFile {
    version: u32,
    kdf: KdfParams,
    /// base64-encoded KDF salt.
    salt: String,
    /// key -> base64(nonce || ciphertext+tag)
    entries: HashMap<String, String>,
}

/// Encrypted file-backed credential store.
///
/// Writes are all-or-nothing: the new file is written to a temp path and
/// renamed over the old one before the in-memory view is updated, so a
/// failed write leaves the previous value intact.
pub struct FileCredentialStore {
    path: PathBuf,
    key: DerivedKey,
    kdf: KdfParams,
    salt: [u8; 32],
    /// Sealed entry bytes, as stored on disk.
    entries: RwLock<HashMap<String, Vec<u8>>>,
}

impl FileCredentialStore {
    /// Open (or create) a vault at `path`, unlocking with the device
    /// passphrase.
    ///
    /// A structurally corrupt vault file is an explicit open error; corrupt
    /// individual entries are skipped with a warning and read as absent.
    pub async fn open(path: impl AsRef<Path>, passphrase: &str) -> Result<Self> {
        Self::open_with_params(path, passphrase, KdfParams::default()).await
    }

    /// Open with explicit KDF parameters (used when a deployment profile
    /// overrides the handheld defaults).
    pub async fn open_with_params(
        path: impl AsRef<Path>,
        passphrase: &str,
        params: KdfParams,
    ) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let store = match tokio::fs::read(&path).await {
            Ok(raw) => Self::load(path, passphrase, raw)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let salt = cipher::generate_salt();
                let key = kdf::derive_key(passphrase.as_bytes(), &salt, &params)
                    .map_err(Error::from)?;
                info!(
                    subsystem = "vault",
                    op = "open",
                    path = %path.display(),
                    "Creating new credential vault"
                );
                Self {
                    path,
                    key,
                    kdf: params,
                    salt,
                    entries: RwLock::new(HashMap::new()),
                }
            }
            Err(e) => return Err(Error::Io(e)),
        };

        Ok(store)
    }

    fn load(path: PathBuf, passphrase: &str, raw: Vec<u8>) -> Result<Self> {
        let file: VaultFile = serde_json::from_slice(&raw)
            .map_err(|e| VaultError::Format(format!("unreadable vault file: {e}")))?;
        if file.version != VAULT_VERSION {
            return Err(
                VaultError::Format(format!("unsupported vault version {}", file.version)).into(),
            );
        }

        let salt_bytes = b64()
            .decode(&file.salt)
            .map_err(|e| VaultError::Format(format!("bad salt encoding: {e}")))?;
        let salt: [u8; 32] = salt_bytes
            .try_into()
            .map_err(|_| VaultError::Format("salt must be 32 bytes".to_string()))?;

        let key =
            kdf::derive_key(passphrase.as_bytes(), &salt, &file.kdf).map_err(Error::from)?;

        let mut entries = HashMap::with_capacity(file.entries.len());
        for (k, v) in file.entries {
            match b64().decode(&v) {
                Ok(sealed) => {
                    entries.insert(k, sealed);
                }
                Err(e) => {
                    // Unreadable entries are dropped, not fatal.
                    warn!(
                        subsystem = "vault",
                        op = "load",
                        key = %k,
                        error = %e,
                        "Skipping corrupt vault entry"
                    );
                }
            }
        }

        debug!(
            subsystem = "vault",
            op = "load",
            entry_count = entries.len(),
            path = %path.display(),
            "Credential vault loaded"
        );

        Ok(Self {
            path,
            key,
            kdf: file.kdf,
            salt,
            entries: RwLock::new(entries),
        })
    }

    /// Write the given entry map to disk atomically (temp file + rename).
    async fn persist(&self, entries: &HashMap<String, Vec<u8>>) -> VaultResult<()> {
        let file = VaultFile {
            version: VAULT_VERSION,
            kdf: self.kdf.clone(),
            salt: b64().encode(self.salt),
            entries: entries
                .iter()
                .map(|(k, v)| (k.clone(), b64().encode(v)))
                .collect(),
        };

        let json = serde_json::to_vec_pretty(&file)
            .map_err(|e| VaultError::Format(e.to_string()))?;

        let tmp = self.path.with_extension("vault.tmp");
        tokio::fs::write(&tmp, &json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl CredentialStore for FileCredentialStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let entries = self.entries.read().await;
        let Some(sealed) = entries.get(key) else {
            return Ok(None);
        };
        match cipher::open(self.key.as_bytes(), sealed) {
            Ok(plaintext) => Ok(Some(plaintext)),
            Err(e) => {
                // Undecryptable data reads as absent rather than failing the
                // caller; the entry will be overwritten on the next put.
                warn!(
                    subsystem = "vault",
                    op = "get",
                    key = %key,
                    error = %e,
                    "Vault entry failed to decrypt, treating as absent"
                );
                Ok(None)
            }
        }
    }

    async fn put(&self, key: &str, value: &[u8]) -> Result<()> {
        let sealed = cipher::seal(self.key.as_bytes(), value).map_err(Error::from)?;

        let mut entries = self.entries.write().await;
        let mut next = entries.clone();
        next.insert(key.to_string(), sealed);
        self.persist(&next).await.map_err(Error::from)?;
        *entries = next;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut entries = self.entries.write().await;
        if !entries.contains_key(key) {
            return Ok(());
        }
        let mut next = entries.clone();
        next.remove(key);
        self.persist(&next).await.map_err(Error::from)?;
        *entries = next;
        Ok(())
    }
}

/// In-memory credential store for tests.
///
/// Clones share state. `set_fail_puts` simulates storage write failures for
/// exercising all-or-nothing login semantics.
#[derive(Clone, Default)]
pub struct MemoryCredentialStore {
    entries: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    fail_puts: Arc<AtomicBool>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `put` fail with a storage error.
    pub fn set_fail_puts(&self, fail: bool) {
        self.fail_puts.store(fail, Ordering::SeqCst);
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Overwrite an entry with raw bytes, bypassing `put`. Lets tests plant
    /// corrupt blobs.
    pub fn inject(&self, key: &str, value: Vec<u8>) {
        self.entries.lock().unwrap().insert(key.to_string(), value);
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.entries.lock().unwrap().get(key).cloned())
    }

    async fn put(&self, key: &str, value: &[u8]) -> Result<()> {
        if self.fail_puts.load(Ordering::SeqCst) {
            return Err(Error::Storage("simulated write failure".to_string()));
        }
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_vec());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.entries.lock().unwrap().remove(key);
        Ok(())
    }
}
