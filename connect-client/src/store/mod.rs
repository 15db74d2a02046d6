// connect-client/src/store/mod.rs
use async_trait::async_trait;

use crate::error::StorageError;

pub mod file;
pub mod key_pair;
pub mod memory;
pub mod secure;
pub mod session;

pub use file::FileStore;
pub use key_pair::KeyPairStore;
pub use memory::MemoryStore;
pub use secure::KeyringStore;
pub use session::SessionStore;

/// Durable client-local key-value store holding the client's persisted state
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Overwrites any existing value
    async fn set(&self, key: &str, value: String) -> Result<(), StorageError>;

    /// Removing a missing key is not an error
    async fn remove(&self, key: &str) -> Result<(), StorageError>;
}
