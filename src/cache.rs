//! Caches consulted by the disk scheduler.
//!
//! - [`PieceCache`] holds whole pieces so reads can skip the disk.
//! - [`MetadataCache`] remembers file sizes so write jobs can skip
//!   get-metadata sub-jobs.
//!
//! Both are process-wide and safe to share between torrents: pieces are
//! keyed by info hash, file sizes by storage id.
//!
//! ```
//! use btcore::cache::PieceCache;
//! use btcore::metainfo::InfoHash;
//! use bytes::Bytes;
//!
//! let cache = PieceCache::new(1024 * 1024);
//! let torrent = InfoHash([1; 20]);
//! cache.insert(&torrent, 0, Bytes::from(vec![0u8; 16384]));
//! assert_eq!(cache.get(&torrent, 0).map(|b| b.len()), Some(16384));
//! ```

mod metadata_cache;
mod piece_cache;

pub use metadata_cache::MetadataCache;
pub use piece_cache::PieceCache;

#[cfg(test)]
mod tests;
