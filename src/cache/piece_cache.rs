use std::collections::{HashMap, VecDeque};

use bytes::Bytes;
use parking_lot::Mutex;

use crate::metainfo::InfoHash;

type CacheKey = (InfoHash, u32);

struct LruList {
    order: VecDeque<CacheKey>,
    data: HashMap<CacheKey, Bytes>,
    bytes: usize,
}

impl LruList {
    fn touch(&mut self, key: &CacheKey) {
        if let Some(pos) = self.order.iter().position(|k| k == key) {
            self.order.remove(pos);
            self.order.push_back(*key);
        }
    }

    fn remove(&mut self, key: &CacheKey) -> Option<Bytes> {
        let data = self.data.remove(key)?;
        self.order.retain(|k| k != key);
        self.bytes -= data.len();
        Some(data)
    }

    fn pop_front(&mut self) -> Option<Bytes> {
        while let Some(key) = self.order.pop_front() {
            if let Some(data) = self.data.remove(&key) {
                self.bytes -= data.len();
                return Some(data);
            }
        }
        None
    }
}

/// Whole-piece data keyed by `(torrent, piece)`, evicting least recently
/// used pieces once the byte budget is exceeded.
pub struct PieceCache {
    inner: Mutex<LruList>,
    capacity_bytes: usize,
}

impl PieceCache {
    pub fn new(capacity_bytes: usize) -> Self {
        Self {
            inner: Mutex::new(LruList {
                order: VecDeque::new(),
                data: HashMap::new(),
                bytes: 0,
            }),
            capacity_bytes,
        }
    }

    pub fn get(&self, info_hash: &InfoHash, piece: u32) -> Option<Bytes> {
        let key = (*info_hash, piece);
        let mut inner = self.inner.lock();
        let data = inner.data.get(&key)?.clone();
        inner.touch(&key);
        Some(data)
    }

    /// Pieces larger than the whole budget are not cached.
    pub fn insert(&self, info_hash: &InfoHash, piece: u32, data: Bytes) {
        if data.len() > self.capacity_bytes {
            return;
        }
        let key = (*info_hash, piece);
        let mut inner = self.inner.lock();
        inner.remove(&key);
        while inner.bytes + data.len() > self.capacity_bytes {
            if inner.pop_front().is_none() {
                break;
            }
        }
        inner.bytes += data.len();
        inner.data.insert(key, data);
        inner.order.push_back(key);
    }

    pub fn remove(&self, info_hash: &InfoHash, piece: u32) -> Option<Bytes> {
        self.inner.lock().remove(&(*info_hash, piece))
    }

    pub fn contains(&self, info_hash: &InfoHash, piece: u32) -> bool {
        self.inner.lock().data.contains_key(&(*info_hash, piece))
    }

    /// Drops every piece of one torrent.
    pub fn remove_torrent(&self, info_hash: &InfoHash) {
        let mut inner = self.inner.lock();
        let keys: Vec<CacheKey> = inner
            .data
            .keys()
            .filter(|(hash, _)| hash == info_hash)
            .copied()
            .collect();
        for key in keys {
            inner.remove(&key);
        }
    }

    pub fn memory_used(&self) -> usize {
        self.inner.lock().bytes
    }

    pub fn capacity(&self) -> usize {
        self.capacity_bytes
    }

    pub fn len(&self) -> usize {
        self.inner.lock().data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.data.clear();
        inner.order.clear();
        inner.bytes = 0;
    }
}
