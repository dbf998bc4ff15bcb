//! Encrypted file storage.
//!
//! All keys live in one JSON object encrypted with AES-256-GCM under a
//! machine-derived key. On disk the file is `nonce || ciphertext`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use aes_gcm::{
    Aes256Gcm, KeyInit, Nonce,
    aead::{Aead, OsRng, rand_core::RngCore},
};
use async_trait::async_trait;
use parking_lot::Mutex;
use zeroize::Zeroize;

use super::{StorageBackend, StorageError};
use crate::constants::ENCRYPTED_STORE_FILE;
use crate::utils::set_file_permissions;

const NONCE_SIZE: usize = 12;
const KEY_SIZE: usize = 32;
const APP_SALT: &[u8] = b"campus-access-session-store-v1-machine-key";

type Entries = BTreeMap<String, String>;

/// File-backed storage for machines without a usable keychain.
#[derive(Debug, Clone)]
pub struct EncryptedFileBackend {
    inner: Arc<FileStore>,
}

#[derive(Debug)]
struct FileStore {
    path: PathBuf,
    // Serializes read-modify-write cycles on the file.
    lock: Mutex<()>,
}

impl EncryptedFileBackend {
    /// Store in `<home>/session.enc`.
    pub fn new(home: &Path) -> Self {
        Self::at_path(home.join(ENCRYPTED_STORE_FILE))
    }

    pub fn at_path(path: impl Into<PathBuf>) -> Self {
        Self {
            inner: Arc::new(FileStore {
                path: path.into(),
                lock: Mutex::new(()),
            }),
        }
    }

    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    async fn run<T, F>(&self, op: F) -> Result<T, StorageError>
    where
        T: Send + 'static,
        F: FnOnce(&FileStore) -> Result<T, StorageError> + Send + 'static,
    {
        let store = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || {
            let _guard = store.lock.lock();
            op(&store)
        })
        .await
        .map_err(|e| StorageError::Task(e.to_string()))?
    }
}

/// Derive the file key from machine-specific entropy.
fn machine_derived_key() -> [u8; KEY_SIZE] {
    use sha2::{Digest, Sha256};

    let mut hasher = Sha256::new();

    #[cfg(target_os = "linux")]
    {
        if let Ok(id) = std::fs::read_to_string("/etc/machine-id") {
            hasher.update(id.trim().as_bytes());
        } else if let Ok(id) = std::fs::read_to_string("/var/lib/dbus/machine-id") {
            hasher.update(id.trim().as_bytes());
        }
    }

    if let Ok(hostname) = hostname::get() {
        hasher.update(hostname.as_encoded_bytes());
    }

    #[cfg(unix)]
    {
        // SAFETY: getuid has no preconditions and cannot fail
        hasher.update(unsafe { libc::getuid() }.to_le_bytes());
    }
    #[cfg(windows)]
    {
        if let Ok(user) = std::env::var("USERNAME") {
            hasher.update(user.as_bytes());
        }
    }

    if let Some(home) = dirs::home_dir() {
        hasher.update(home.to_string_lossy().as_bytes());
    }

    hasher.update(APP_SALT);

    let mut key = [0u8; KEY_SIZE];
    key.copy_from_slice(&hasher.finalize());
    key
}

fn cipher() -> Result<Aes256Gcm, StorageError> {
    let mut key = machine_derived_key();
    let cipher = Aes256Gcm::new_from_slice(&key)
        .map_err(|e| StorageError::Crypto(format!("Cipher init failed: {e}")));
    key.zeroize();
    cipher
}

impl FileStore {
    fn load(&self) -> Result<Entries, StorageError> {
        if !self.path.exists() {
            return Ok(Entries::new());
        }

        let data = std::fs::read(&self.path)?;
        if data.len() < NONCE_SIZE {
            return Err(StorageError::Corrupt(format!(
                "{} is truncated",
                self.path.display()
            )));
        }

        let (nonce_bytes, ciphertext) = data.split_at(NONCE_SIZE);
        let mut plaintext = cipher()?
            .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
            .map_err(|e| StorageError::Crypto(format!("Decryption failed: {e}")))?;

        let parsed = serde_json::from_slice::<Entries>(&plaintext)
            .map_err(|e| StorageError::Corrupt(e.to_string()));
        plaintext.zeroize();
        parsed
    }

    fn save(&self, entries: &Entries) -> Result<(), StorageError> {
        if entries.is_empty() {
            return self.delete();
        }

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut json =
            serde_json::to_vec(entries).map_err(|e| StorageError::Corrupt(e.to_string()))?;

        let mut nonce_bytes = [0u8; NONCE_SIZE];
        OsRng.fill_bytes(&mut nonce_bytes);

        let ciphertext = cipher()?
            .encrypt(Nonce::from_slice(&nonce_bytes), json.as_slice())
            .map_err(|e| StorageError::Crypto(format!("Encryption failed: {e}")));
        json.zeroize();
        let ciphertext = ciphertext?;

        let mut output = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        output.extend_from_slice(&nonce_bytes);
        output.extend_from_slice(&ciphertext);

        std::fs::write(&self.path, &output)?;
        set_file_permissions(&self.path)?;
        Ok(())
    }

    /// Overwrite with random bytes, then unlink.
    fn delete(&self) -> Result<(), StorageError> {
        if !self.path.exists() {
            return Ok(());
        }

        if let Ok(metadata) = std::fs::metadata(&self.path) {
            let mut noise = vec![0u8; metadata.len() as usize];
            OsRng.fill_bytes(&mut noise);
            let _ = std::fs::write(&self.path, &noise);
        }

        std::fs::remove_file(&self.path)?;
        Ok(())
    }
}

#[async_trait]
impl StorageBackend for EncryptedFileBackend {
    fn name(&self) -> &'static str {
        "encrypted-file"
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let key = key.to_string();
        self.run(move |store| Ok(store.load()?.remove(&key))).await
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let key = key.to_string();
        let value = value.to_string();
        self.run(move |store| {
            // An unreadable file is replaced rather than blocking new writes.
            let mut entries = store.load().unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Discarding unreadable session store");
                Entries::new()
            });
            entries.insert(key, value);
            store.save(&entries)
        })
        .await
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        let key = key.to_string();
        self.run(move |store| {
            let mut entries = store.load()?;
            if entries.remove(&key).is_some() {
                store.save(&entries)?;
            }
            Ok(())
        })
        .await
    }
}
