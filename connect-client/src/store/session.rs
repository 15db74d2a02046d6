// connect-client/src/store/session.rs
use common::StoredSessionInfo;
use std::sync::Arc;

use super::KeyValueStore;
use crate::error::StorageError;

/// Holds the stored session information under a fixed key
#[derive(Clone)]
pub struct SessionStore {
    kv: Arc<dyn KeyValueStore>,
    key: String,
}

impl SessionStore {
    pub fn new(kv: Arc<dyn KeyValueStore>, key: impl Into<String>) -> Self {
        Self { kv, key: key.into() }
    }

    /// Malformed session data is treated as no session
    pub async fn load(&self) -> Result<Option<StoredSessionInfo>, StorageError> {
        let Some(raw) = self.kv.get(&self.key).await? else {
            return Ok(None);
        };

        match serde_json::from_str::<StoredSessionInfo>(&raw) {
            Ok(info) => Ok(Some(info)),
            Err(e) => {
                tracing::warn!("Ignoring malformed stored session: {}", e);
                Ok(None)
            }
        }
    }

    pub async fn save(&self, info: &StoredSessionInfo) -> Result<(), StorageError> {
        let raw = serde_json::to_string(info).map_err(|e| StorageError::Corrupt {
            key: self.key.clone(),
            reason: e.to_string(),
        })?;
        self.kv.set(&self.key, raw).await
    }

    pub async fn clear(&self) -> Result<(), StorageError> {
        self.kv.remove(&self.key).await
    }
}
