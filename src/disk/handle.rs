use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::warn;

use super::error::DiskError;
use super::job::{JobId, JobType};
use super::verify::verify_piece;
use super::worker::{Command, Worker};
use crate::cache::{MetadataCache, PieceCache};
use crate::config::{CacheConfig, DiskConfig};
use crate::metainfo::{Piece, PieceState, Torrent};
use crate::storage::Storage;

/// Notifications from a torrent's disk worker.
#[derive(Debug, Clone)]
pub enum DiskEvent {
    PieceWritten { piece: u32 },
    /// Written after passing its hash check; the torrent's bitfield is set.
    PieceVerified { piece: u32 },
    JobFailed {
        job: JobId,
        job_type: JobType,
        error: DiskError,
    },
    Stalled { job: JobId, count: u32 },
    /// The storage is considered unusable; writes stay halted until
    /// [`DiskHandle::replace_storage`] is called.
    Fatal { reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiskStatus {
    /// Jobs held by the worker, including composites awaiting sub-jobs.
    pub queued: usize,
    /// A storage call is in flight.
    pub active: bool,
    pub halted: bool,
    pub stall_count: u32,
}

/// Caches shared by every torrent's worker.
#[derive(Clone)]
pub struct DiskCaches {
    pub pieces: Arc<PieceCache>,
    pub metadata: Arc<MetadataCache>,
}

impl DiskCaches {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            pieces: Arc::new(PieceCache::new(config.piece_cache_bytes)),
            metadata: Arc::new(MetadataCache::new(config.metadata_cache_entries)),
        }
    }
}

impl Default for DiskCaches {
    fn default() -> Self {
        Self::new(&CacheConfig::default())
    }
}

/// Cheap, cloneable front end to one torrent's disk worker.
#[derive(Clone)]
pub struct DiskHandle {
    tx: mpsc::Sender<Command>,
    events: broadcast::Sender<DiskEvent>,
    torrent: Arc<Torrent>,
}

impl DiskHandle {
    /// Starts a worker task for `torrent`. Must be called within a tokio runtime.
    pub fn spawn(
        torrent: Arc<Torrent>,
        storage: Arc<dyn Storage>,
        caches: DiskCaches,
        config: DiskConfig,
    ) -> Self {
        let (tx, rx) = mpsc::channel(config.command_buffer.max(1));
        let (events, _) = broadcast::channel(config.event_buffer.max(1));
        let worker = Worker::new(Arc::clone(&torrent), storage, caches, config, events.clone());
        tokio::spawn(async move { worker.run(rx).await });

        Self { tx, events, torrent }
    }

    pub fn torrent(&self) -> &Arc<Torrent> {
        &self.torrent
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DiskEvent> {
        self.events.subscribe()
    }

    /// Writes a whole piece. `data` must be exactly the piece's size.
    pub async fn write_piece(&self, piece: u32, data: Bytes) -> Result<(), DiskError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::WritePiece { piece, data, reply }).await?;
        rx.await.map_err(|_| DiskError::WorkerGone)?
    }

    /// Checks `data` against the piece hash, then writes it and marks the
    /// piece verified. A mismatch never reaches storage.
    pub async fn write_verified_piece(&self, piece: u32, data: Bytes) -> Result<(), DiskError> {
        let mut assembled = self.torrent.piece(piece)?;
        // a rewrite of a verified piece starts over
        assembled.reset();
        assembled.complete(data)?;
        self.write_complete_piece(&mut assembled).await
    }

    /// Hashes, writes and verifies a piece held in memory, moving it from
    /// `InMemoryComplete` to `OnDiskVerified` and releasing its buffer.
    ///
    /// A hash mismatch resets the piece to `Missing` without touching
    /// storage. A failed write leaves it `InMemoryComplete` so the caller can
    /// retry with the same buffer.
    pub async fn write_complete_piece(&self, piece: &mut Piece) -> Result<(), DiskError> {
        let index = piece.index;
        let data = match (piece.state(), piece.data()) {
            (PieceState::InMemoryComplete, Some(data)) => data.clone(),
            (state, _) => {
                return Err(DiskError::InvalidRequest(format!(
                    "piece {} is {:?}, not complete in memory",
                    index, state
                )))
            }
        };

        let expected = *self.torrent.piece_hash(index)?;
        let hashed = data.clone();
        let matches = tokio::task::spawn_blocking(move || verify_piece(&hashed, &expected))
            .await
            .map_err(|e| DiskError::InvalidRequest(format!("hash task failed: {}", e)))?;
        if !matches {
            warn!(torrent = %self.torrent.info_hash(), piece = index, "piece failed hash check");
            piece.reset();
            return Err(DiskError::HashMismatch(index));
        }

        self.write_piece(index, data).await?;
        piece.mark_verified()?;
        self.torrent.mark_verified(index)?;
        let _ = self.events.send(DiskEvent::PieceVerified { piece: index });
        Ok(())
    }

    pub async fn read_piece(&self, piece: u32) -> Result<Bytes, DiskError> {
        let len = self.torrent.piece_size(piece)?;
        self.read_block(piece, 0, len).await
    }

    /// Reads `len` bytes at `offset` within `piece`.
    pub async fn read_block(&self, piece: u32, offset: u64, len: u64) -> Result<Bytes, DiskError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::ReadPiece {
            piece,
            offset,
            len,
            reply,
        })
        .await?;
        rx.await.map_err(|_| DiskError::WorkerGone)?
    }

    /// Fails every queued job with [`DiskError::Cancelled`] and returns how
    /// many piece jobs were cancelled.
    pub async fn cancel_all(&self) -> Result<usize, DiskError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::CancelAll { reply }).await?;
        rx.await.map_err(|_| DiskError::WorkerGone)
    }

    /// Points the worker at new storage and lifts a fatal halt.
    pub async fn replace_storage(&self, storage: Arc<dyn Storage>) -> Result<(), DiskError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::ReplaceStorage { storage, reply }).await?;
        rx.await.map_err(|_| DiskError::WorkerGone)
    }

    pub async fn status(&self) -> Result<DiskStatus, DiskError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Status { reply }).await?;
        rx.await.map_err(|_| DiskError::WorkerGone)
    }

    /// Cancels queued jobs and stops the worker once the call in flight
    /// has returned.
    pub async fn shutdown(&self) {
        let _ = self.tx.send(Command::Shutdown).await;
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    async fn send(&self, cmd: Command) -> Result<(), DiskError> {
        self.tx.send(cmd).await.map_err(|_| DiskError::WorkerGone)
    }
}
