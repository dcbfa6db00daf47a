use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;

use super::handle::{DiskCaches, DiskHandle};
use crate::config::{CacheConfig, DiskConfig};
use crate::metainfo::{InfoHash, Torrent};
use crate::storage::Storage;

/// Owns one disk worker per torrent and the caches they share.
pub struct DiskManager {
    handles: DashMap<InfoHash, DiskHandle>,
    caches: DiskCaches,
    config: DiskConfig,
}

impl DiskManager {
    pub fn new(config: DiskConfig, cache_config: &CacheConfig) -> Self {
        Self::with_caches(config, DiskCaches::new(cache_config))
    }

    pub fn with_caches(config: DiskConfig, caches: DiskCaches) -> Self {
        Self {
            handles: DashMap::new(),
            caches,
            config,
        }
    }

    /// Starts a worker for `torrent`, or returns the running one.
    pub fn add_torrent(&self, torrent: Arc<Torrent>, storage: Arc<dyn Storage>) -> DiskHandle {
        let info_hash = *torrent.info_hash();
        self.handles
            .entry(info_hash)
            .or_insert_with(|| {
                debug!(torrent = %info_hash, "adding disk worker");
                DiskHandle::spawn(torrent, storage, self.caches.clone(), self.config.clone())
            })
            .clone()
    }

    pub fn get(&self, info_hash: &InfoHash) -> Option<DiskHandle> {
        self.handles.get(info_hash).map(|h| h.clone())
    }

    /// Cancels the torrent's queued jobs, stops its worker and drops its
    /// cached pieces. Returns false if the torrent was unknown.
    pub async fn remove(&self, info_hash: &InfoHash) -> bool {
        let Some((_, handle)) = self.handles.remove(info_hash) else {
            return false;
        };
        let _ = handle.cancel_all().await;
        handle.shutdown().await;
        self.caches.pieces.remove_torrent(info_hash);
        debug!(torrent = %info_hash, "removed disk worker");
        true
    }

    pub fn caches(&self) -> &DiskCaches {
        &self.caches
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}

impl Default for DiskManager {
    fn default() -> Self {
        Self::new(DiskConfig::default(), &CacheConfig::default())
    }
}
