use std::path::{Component, Path};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use bytes::Bytes;

use super::error::StorageError;

/// Identity of one storage location. Caches key file state by it so a
/// replaced storage never sees the old one's entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StorageId(u64);

impl StorageId {
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        StorageId(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(&self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileMetadata {
    pub size: u64,
}

/// Byte-addressed file access for one torrent's download location.
///
/// Paths are relative to the storage root. Implementations need not
/// serialize calls themselves; the disk scheduler issues one at a time.
#[async_trait]
pub trait Storage: Send + Sync {
    fn id(&self) -> StorageId;

    /// Resolves an existing file for reading.
    async fn open_for_read(&self, path: &Path) -> Result<(), StorageError>;

    /// Resolves a file for writing, creating it and its parents.
    async fn open_for_write(&self, path: &Path) -> Result<(), StorageError>;

    /// Fails with [`StorageError::NotFound`] when the file does not exist.
    async fn metadata(&self, path: &Path) -> Result<FileMetadata, StorageError>;

    /// Sets the file length, extending with zeros or cutting.
    async fn truncate(&self, path: &Path, size: u64) -> Result<(), StorageError>;

    async fn write_at(&self, path: &Path, offset: u64, data: &[u8]) -> Result<(), StorageError>;

    /// Reads exactly `len` bytes; a short read is an error.
    async fn read_at(&self, path: &Path, offset: u64, len: usize) -> Result<Bytes, StorageError>;

    async fn flush(&self) -> Result<(), StorageError> {
        Ok(())
    }
}

/// Rejects paths that could escape the storage root.
pub fn validate_relative_path(path: &Path) -> Result<(), StorageError> {
    if path.as_os_str().is_empty() {
        return Err(StorageError::PathTraversal(String::new()));
    }
    for component in path.components() {
        match component {
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(StorageError::PathTraversal(path.display().to_string()));
            }
            _ => {}
        }
    }
    Ok(())
}
