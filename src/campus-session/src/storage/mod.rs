//! Durable key/value storage for the session token.
//!
//! [`StorageAdapter`] is the only thing the session store talks to. It wraps
//! one [`StorageBackend`] picked once at startup and turns every backend
//! failure into a logged `None`/`false`, so storage trouble can never take the
//! session core down with it.

mod encrypted;
mod keychain;
mod memory;

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use encrypted::EncryptedFileBackend;
pub use keychain::KeyringBackend;
pub use memory::MemoryBackend;

/// Errors raised by storage backends. Never leaves [`StorageAdapter`].
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Keyring error: {0}")]
    Keyring(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Encryption error: {0}")]
    Crypto(String),

    #[error("Corrupt store: {0}")]
    Corrupt(String),

    #[error("Storage task failed: {0}")]
    Task(String),
}

/// A platform key/value primitive. Each call is atomic per key.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Short backend name used in logs.
    fn name(&self) -> &'static str;

    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Removing an absent key succeeds.
    async fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// Which backend to build at composition time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum StorageKind {
    /// OS keychain (Credential Manager, Keychain, Secret Service).
    #[default]
    Keyring,
    /// AES-256-GCM encrypted file in the campus home.
    EncryptedFile,
    /// Process-local map, gone at exit.
    Memory,
}

impl std::str::FromStr for StorageKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('_', "-").as_str() {
            "keyring" | "keychain" => Ok(Self::Keyring),
            "encrypted-file" | "encrypted" | "file" => Ok(Self::EncryptedFile),
            "memory" | "mem" => Ok(Self::Memory),
            other => Err(format!(
                "unknown storage backend '{other}' (expected keyring, encrypted-file or memory)"
            )),
        }
    }
}

impl std::fmt::Display for StorageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Keyring => write!(f, "keyring"),
            Self::EncryptedFile => write!(f, "encrypted-file"),
            Self::Memory => write!(f, "memory"),
        }
    }
}

/// Failure-swallowing facade over a [`StorageBackend`].
///
/// Cloning shares the underlying backend.
#[derive(Clone)]
pub struct StorageAdapter {
    backend: Arc<dyn StorageBackend>,
}

impl std::fmt::Debug for StorageAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageAdapter")
            .field("backend", &self.backend.name())
            .finish()
    }
}

impl StorageAdapter {
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        Self { backend }
    }

    /// Build the adapter for `kind`. File-based backends live under `home`.
    pub fn from_kind(kind: StorageKind, home: &Path) -> Self {
        match kind {
            StorageKind::Keyring => Self::new(Arc::new(KeyringBackend::new())),
            StorageKind::EncryptedFile => Self::new(Arc::new(EncryptedFileBackend::new(home))),
            StorageKind::Memory => Self::memory(),
        }
    }

    /// In-memory adapter.
    pub fn memory() -> Self {
        Self::new(Arc::new(MemoryBackend::new()))
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Read `key`. Failures read as absent.
    pub async fn get(&self, key: &str) -> Option<String> {
        match self.backend.get(key).await {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(backend = self.backend.name(), key, error = %e, "Storage read failed");
                None
            }
        }
    }

    /// Write `key`. Returns false on failure.
    pub async fn set(&self, key: &str, value: &str) -> bool {
        match self.backend.set(key, value).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(backend = self.backend.name(), key, error = %e, "Storage write failed");
                false
            }
        }
    }

    /// Remove `key`. Returns false on failure; an absent key counts as removed.
    pub async fn remove(&self, key: &str) -> bool {
        match self.backend.remove(key).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(backend = self.backend.name(), key, error = %e, "Storage remove failed");
                false
            }
        }
    }
}
