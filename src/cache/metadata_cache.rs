use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use crate::storage::StorageId;

type CacheKey = (StorageId, PathBuf);

struct Entries {
    sizes: HashMap<CacheKey, u64>,
    order: VecDeque<CacheKey>,
}

/// Last known on-disk size per `(storage, path)`.
///
/// The disk scheduler consults it to skip get-metadata sub-jobs and keeps it
/// current after every truncate and write.
pub struct MetadataCache {
    entries: Mutex<Entries>,
    capacity: usize,
}

impl MetadataCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(Entries {
                sizes: HashMap::new(),
                order: VecDeque::new(),
            }),
            capacity,
        }
    }

    pub fn size(&self, storage: StorageId, path: &Path) -> Option<u64> {
        self.entries
            .lock()
            .sizes
            .get(&(storage, path.to_path_buf()))
            .copied()
    }

    pub fn set_size(&self, storage: StorageId, path: &Path, size: u64) {
        if self.capacity == 0 {
            return;
        }
        let key = (storage, path.to_path_buf());
        let mut entries = self.entries.lock();
        if entries.sizes.insert(key.clone(), size).is_none() {
            entries.order.push_back(key);
            while entries.sizes.len() > self.capacity {
                let Some(oldest) = entries.order.pop_front() else {
                    break;
                };
                entries.sizes.remove(&oldest);
            }
        }
    }

    /// Records that bytes up to `end` now exist, growing the known size.
    ///
    /// A miss stays a miss: `end` says nothing about bytes past it.
    pub fn extend_to(&self, storage: StorageId, path: &Path, end: u64) {
        let key = (storage, path.to_path_buf());
        if let Some(size) = self.entries.lock().sizes.get_mut(&key) {
            *size = (*size).max(end);
        }
    }

    pub fn invalidate(&self, storage: StorageId, path: &Path) {
        let key = (storage, path.to_path_buf());
        let mut entries = self.entries.lock();
        if entries.sizes.remove(&key).is_some() {
            entries.order.retain(|k| k != &key);
        }
    }

    /// Forgets everything about one storage.
    pub fn clear_storage(&self, storage: StorageId) {
        let mut entries = self.entries.lock();
        entries.sizes.retain(|(id, _), _| *id != storage);
        entries.order.retain(|(id, _)| *id != storage);
    }

    pub fn len(&self) -> usize {
        self.entries.lock().sizes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
