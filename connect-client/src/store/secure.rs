// connect-client/src/store/secure.rs
use async_trait::async_trait;
use dashmap::DashMap;
use keyring::Entry;
use std::sync::Arc;

use super::KeyValueStore;
use crate::error::StorageError;

/// Keeps values in the platform credential store (Secret Service, Keychain or
/// the Windows Credential Manager), one credential per key.
///
/// The credential's service name is `prefix` followed by the key, and its
/// user name is the key itself.
#[derive(Clone)]
pub struct KeyringStore {
    prefix: String,
    entries: Arc<DashMap<String, Arc<Entry>>>,
}

impl KeyringStore {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            entries: Arc::new(DashMap::new()),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    fn entry(&self, key: &str) -> Result<Arc<Entry>, StorageError> {
        if let Some(entry) = self.entries.get(key) {
            return Ok(entry.clone());
        }

        let service = format!("{}{}", self.prefix, key);
        let entry = Entry::new(&service, key).map_err(|e| unavailable(key, e))?;
        Ok(self
            .entries
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(entry))
            .clone())
    }
}

fn unavailable(key: &str, e: keyring::Error) -> StorageError {
    StorageError::Unavailable(format!("keyring entry {}: {}", key, e))
}

// Platform credential stores block, so every call runs off the async workers
async fn blocking<T, F>(key: &str, f: F) -> Result<T, StorageError>
where
    F: FnOnce() -> Result<T, StorageError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| StorageError::Unavailable(format!("keyring entry {}: {}", key, e)))?
}

#[async_trait]
impl KeyValueStore for KeyringStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let entry = self.entry(key)?;
        let owned = key.to_string();
        blocking(key, move || match entry.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(unavailable(&owned, e)),
        })
        .await
    }

    async fn set(&self, key: &str, value: String) -> Result<(), StorageError> {
        let entry = self.entry(key)?;
        let owned = key.to_string();
        blocking(key, move || entry.set_password(&value).map_err(|e| unavailable(&owned, e))).await?;
        tracing::debug!("Stored {} in the platform keyring", key);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        let entry = self.entry(key)?;
        let owned = key.to_string();
        blocking(key, move || match entry.delete_password() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(unavailable(&owned, e)),
        })
        .await
    }
}
