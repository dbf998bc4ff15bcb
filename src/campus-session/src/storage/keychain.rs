//! OS keychain storage.
//!
//! - Windows: Credential Manager
//! - macOS: Keychain
//! - Linux: Secret Service (gnome-keyring, kwallet)
//!
//! The `keyring` API is blocking, so every call runs on the blocking pool.

use async_trait::async_trait;

use super::{StorageBackend, StorageError};
use crate::constants::KEYRING_SERVICE;

/// Keychain-backed storage, one entry per key under a fixed service name.
#[derive(Debug, Clone)]
pub struct KeyringBackend {
    service: String,
}

impl KeyringBackend {
    pub fn new() -> Self {
        Self::with_service(KEYRING_SERVICE)
    }

    pub fn with_service(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    async fn run<T, F>(&self, key: &str, op: F) -> Result<T, StorageError>
    where
        T: Send + 'static,
        F: FnOnce(keyring::Entry) -> Result<T, keyring::Error> + Send + 'static,
    {
        let service = self.service.clone();
        let key = key.to_string();
        tokio::task::spawn_blocking(move || {
            let entry = keyring::Entry::new(&service, &key)?;
            op(entry)
        })
        .await
        .map_err(|e| StorageError::Task(e.to_string()))?
        .map_err(keyring_error)
    }
}

impl Default for KeyringBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn keyring_error(err: keyring::Error) -> StorageError {
    match err {
        keyring::Error::NoStorageAccess(_) => {
            StorageError::Keyring("Cannot access keyring storage".to_string())
        }
        keyring::Error::PlatformFailure(_) => {
            StorageError::Keyring("Platform-specific keyring failure".to_string())
        }
        other => StorageError::Keyring(other.to_string()),
    }
}

#[async_trait]
impl StorageBackend for KeyringBackend {
    fn name(&self) -> &'static str {
        "keyring"
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.run(key, |entry| match entry.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e),
        })
        .await
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let value = value.to_string();
        self.run(key, move |entry| entry.set_password(&value)).await?;
        tracing::debug!(key, "Stored value in keyring");
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.run(key, |entry| match entry.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e),
        })
        .await
    }
}
