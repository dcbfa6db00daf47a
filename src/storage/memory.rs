use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;

use super::backend::{validate_relative_path, FileMetadata, Storage, StorageId};
use super::error::StorageError;

/// In-process storage; files are plain byte vectors.
pub struct MemoryStorage {
    id: StorageId,
    files: RwLock<HashMap<PathBuf, Vec<u8>>>,
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self {
            id: StorageId::next(),
            files: RwLock::new(HashMap::new()),
        }
    }

    /// Copy of a file's contents.
    pub fn contents(&self, path: impl AsRef<Path>) -> Option<Vec<u8>> {
        self.files.read().get(path.as_ref()).cloned()
    }

    pub fn insert(&self, path: impl Into<PathBuf>, data: Vec<u8>) {
        self.files.write().insert(path.into(), data);
    }

    pub fn file_count(&self) -> usize {
        self.files.read().len()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    fn id(&self) -> StorageId {
        self.id
    }

    async fn open_for_read(&self, path: &Path) -> Result<(), StorageError> {
        validate_relative_path(path)?;
        if self.files.read().contains_key(path) {
            Ok(())
        } else {
            Err(StorageError::NotFound(path.display().to_string()))
        }
    }

    async fn open_for_write(&self, path: &Path) -> Result<(), StorageError> {
        validate_relative_path(path)?;
        self.files.write().entry(path.to_path_buf()).or_default();
        Ok(())
    }

    async fn metadata(&self, path: &Path) -> Result<FileMetadata, StorageError> {
        self.files
            .read()
            .get(path)
            .map(|data| FileMetadata {
                size: data.len() as u64,
            })
            .ok_or_else(|| StorageError::NotFound(path.display().to_string()))
    }

    async fn truncate(&self, path: &Path, size: u64) -> Result<(), StorageError> {
        validate_relative_path(path)?;
        self.files
            .write()
            .entry(path.to_path_buf())
            .or_default()
            .resize(size as usize, 0);
        Ok(())
    }

    async fn write_at(&self, path: &Path, offset: u64, data: &[u8]) -> Result<(), StorageError> {
        validate_relative_path(path)?;
        let mut files = self.files.write();
        let file = files.entry(path.to_path_buf()).or_default();
        let start = offset as usize;
        let end = start + data.len();
        if file.len() < end {
            file.resize(end, 0);
        }
        file[start..end].copy_from_slice(data);
        Ok(())
    }

    async fn read_at(&self, path: &Path, offset: u64, len: usize) -> Result<Bytes, StorageError> {
        let files = self.files.read();
        let file = files
            .get(path)
            .ok_or_else(|| StorageError::NotFound(path.display().to_string()))?;
        let start = (offset as usize).min(file.len());
        let available = file.len() - start;
        if available < len {
            return Err(StorageError::ShortRead {
                path: path.display().to_string(),
                expected: len,
                found: available,
            });
        }
        Ok(Bytes::copy_from_slice(&file[start..start + len]))
    }
}
