// connect-client/src/store/file.rs
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;

use super::KeyValueStore;
use crate::error::StorageError;

/// Stores each key as a JSON file in a directory
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// The directory is created on the first write
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        let valid = !key.is_empty()
            && key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(StorageError::Unavailable(format!("invalid storage key {:?}", key)));
        }
        Ok(self.dir.join(format!("{}.json", key)))
    }
}

fn unavailable(path: &Path, e: std::io::Error) -> StorageError {
    StorageError::Unavailable(format!("{}: {}", path.display(), e))
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let path = self.path_for(key)?;
        match fs::read_to_string(&path).await {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(unavailable(&path, e)),
        }
    }

    async fn set(&self, key: &str, value: String) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| unavailable(&self.dir, e))?;

        // Write to a temporary file first so a crash never leaves half a record
        let tmp_path = path.with_extension("json.tmp");
        fs::write(&tmp_path, value.as_bytes())
            .await
            .map_err(|e| unavailable(&tmp_path, e))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&tmp_path, std::fs::Permissions::from_mode(0o600))
                .await
                .map_err(|e| unavailable(&tmp_path, e))?;
        }

        fs::rename(&tmp_path, &path)
            .await
            .map_err(|e| unavailable(&path, e))?;

        tracing::trace!("Wrote {}", path.display());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(unavailable(&path, e)),
        }
    }
}
