use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tokio::sync::Mutex as TokioMutex;
use tracing::{debug, trace};

use super::backend::{validate_relative_path, FileMetadata, Storage, StorageId};
use super::error::{StorageError, StorageOp};

struct OpenFile {
    file: TokioMutex<File>,
    writable: bool,
}

/// Files under a download directory, accessed with tokio's fs.
pub struct FsStorage {
    id: StorageId,
    root: PathBuf,
    handles: DashMap<PathBuf, Arc<OpenFile>>,
}

impl FsStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            id: StorageId::next(),
            root: root.into(),
            handles: DashMap::new(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn full_path(&self, path: &Path) -> Result<PathBuf, StorageError> {
        validate_relative_path(path)?;
        Ok(self.root.join(path))
    }

    async fn handle(&self, path: &Path, write: bool) -> Result<Arc<OpenFile>, StorageError> {
        if let Some(handle) = self.handles.get(path) {
            if handle.writable || !write {
                return Ok(handle.clone());
            }
        }
        // upgrade a read handle (or open fresh)
        self.handles.remove(path);

        let full = self.full_path(path)?;
        let file = if write {
            if let Some(parent) = full.parent() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| StorageError::io(StorageOp::Open, parent, e))?;
            }
            OpenOptions::new()
                .create(true)
                .read(true)
                .write(true)
                .truncate(false)
                .open(&full)
                .await
        } else {
            File::open(&full).await
        }
        .map_err(|e| StorageError::io(StorageOp::Open, path, e))?;

        trace!(path = %path.display(), write, "opened file");
        let handle = Arc::new(OpenFile {
            file: TokioMutex::new(file),
            writable: write,
        });
        self.handles.insert(path.to_path_buf(), handle.clone());
        Ok(handle)
    }

    /// Drops every cached handle after syncing the writable ones.
    pub async fn close_all(&self) -> Result<(), StorageError> {
        self.flush().await?;
        self.handles.clear();
        Ok(())
    }
}

#[async_trait]
impl Storage for FsStorage {
    fn id(&self) -> StorageId {
        self.id
    }

    async fn open_for_read(&self, path: &Path) -> Result<(), StorageError> {
        self.handle(path, false).await.map(|_| ())
    }

    async fn open_for_write(&self, path: &Path) -> Result<(), StorageError> {
        self.handle(path, true).await.map(|_| ())
    }

    async fn metadata(&self, path: &Path) -> Result<FileMetadata, StorageError> {
        let full = self.full_path(path)?;
        let meta = tokio::fs::metadata(&full)
            .await
            .map_err(|e| StorageError::io(StorageOp::Metadata, path, e))?;
        Ok(FileMetadata { size: meta.len() })
    }

    async fn truncate(&self, path: &Path, size: u64) -> Result<(), StorageError> {
        let handle = self.handle(path, true).await?;
        let mut file = handle.file.lock().await;
        // settle buffered writes so their errors stay with their own call
        file.flush()
            .await
            .map_err(|e| StorageError::io(StorageOp::Truncate, path, e))?;
        file.set_len(size)
            .await
            .map_err(|e| StorageError::io(StorageOp::Truncate, path, e))?;
        debug!(path = %path.display(), size, "set file length");
        Ok(())
    }

    async fn write_at(&self, path: &Path, offset: u64, data: &[u8]) -> Result<(), StorageError> {
        let handle = self.handle(path, true).await?;
        let mut file = handle.file.lock().await;
        let io_err = |e| StorageError::io(StorageOp::Write, path, e);
        file.seek(SeekFrom::Start(offset)).await.map_err(io_err)?;
        file.write_all(data).await.map_err(io_err)?;
        // tokio hands the bytes to a blocking task; wait for that write to land
        file.flush().await.map_err(io_err)?;
        Ok(())
    }

    async fn read_at(&self, path: &Path, offset: u64, len: usize) -> Result<Bytes, StorageError> {
        let handle = self.handle(path, false).await?;
        let mut file = handle.file.lock().await;
        file.seek(SeekFrom::Start(offset))
            .await
            .map_err(|e| StorageError::io(StorageOp::Read, path, e))?;

        let mut buf = vec![0u8; len];
        let mut filled = 0;
        while filled < len {
            let n = file
                .read(&mut buf[filled..])
                .await
                .map_err(|e| StorageError::io(StorageOp::Read, path, e))?;
            if n == 0 {
                return Err(StorageError::ShortRead {
                    path: path.display().to_string(),
                    expected: len,
                    found: filled,
                });
            }
            filled += n;
        }
        Ok(Bytes::from(buf))
    }

    async fn flush(&self) -> Result<(), StorageError> {
        let handles: Vec<(PathBuf, Arc<OpenFile>)> = self
            .handles
            .iter()
            .filter(|entry| entry.writable)
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();
        for (path, handle) in handles {
            let mut file = handle.file.lock().await;
            file.flush()
                .await
                .map_err(|e| StorageError::io(StorageOp::Flush, &path, e))?;
            file.sync_data()
                .await
                .map_err(|e| StorageError::io(StorageOp::Flush, &path, e))?;
        }
        Ok(())
    }
}
