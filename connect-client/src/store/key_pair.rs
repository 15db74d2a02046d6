// connect-client/src/store/key_pair.rs
use std::sync::Arc;

use super::KeyValueStore;
use crate::error::StorageError;
use crate::keys::{ConnectKeyPair, KeyPairRecord};

/// Holds the single connect key pair under a fixed key
#[derive(Clone)]
pub struct KeyPairStore {
    kv: Arc<dyn KeyValueStore>,
    key: String,
}

impl KeyPairStore {
    pub fn new(kv: Arc<dyn KeyValueStore>, key: impl Into<String>) -> Self {
        Self { kv, key: key.into() }
    }

    /// A stored key pair that can't be read is an error, never `None`
    pub async fn load(&self) -> Result<Option<ConnectKeyPair>, StorageError> {
        let Some(raw) = self.kv.get(&self.key).await? else {
            return Ok(None);
        };

        let corrupt = |reason: String| StorageError::Corrupt {
            key: self.key.clone(),
            reason,
        };
        let record: KeyPairRecord = serde_json::from_str(&raw).map_err(|e| corrupt(e.to_string()))?;
        let key_pair = ConnectKeyPair::from_record(&record).map_err(corrupt)?;

        Ok(Some(key_pair))
    }

    pub async fn save(&self, key_pair: &ConnectKeyPair) -> Result<(), StorageError> {
        let raw = serde_json::to_string(&key_pair.to_record()).map_err(|e| StorageError::Corrupt {
            key: self.key.clone(),
            reason: e.to_string(),
        })?;
        self.kv.set(&self.key, raw).await
    }

    pub async fn clear(&self) -> Result<(), StorageError> {
        self.kv.remove(&self.key).await
    }
}
