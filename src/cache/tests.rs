use std::path::Path;

use bytes::Bytes;

use super::*;
use crate::metainfo::InfoHash;
use crate::storage::StorageId;

const TORRENT: InfoHash = InfoHash([7; 20]);

#[test]
fn test_piece_cache_lru_eviction() {
    let cache = PieceCache::new(300);
    cache.insert(&TORRENT, 0, Bytes::from(vec![0u8; 100]));
    cache.insert(&TORRENT, 1, Bytes::from(vec![1u8; 100]));
    cache.insert(&TORRENT, 2, Bytes::from(vec![2u8; 100]));
    assert_eq!(cache.memory_used(), 300);

    // piece 0 becomes most recent; piece 1 is evicted next
    assert!(cache.get(&TORRENT, 0).is_some());
    cache.insert(&TORRENT, 3, Bytes::from(vec![3u8; 100]));

    assert!(cache.contains(&TORRENT, 0));
    assert!(!cache.contains(&TORRENT, 1));
    assert!(cache.contains(&TORRENT, 3));
    assert_eq!(cache.len(), 3);
    assert_eq!(cache.memory_used(), 300);
}

#[test]
fn test_piece_cache_replace_and_oversize() {
    let cache = PieceCache::new(100);
    cache.insert(&TORRENT, 0, Bytes::from(vec![0u8; 60]));
    cache.insert(&TORRENT, 0, Bytes::from(vec![1u8; 80]));
    assert_eq!(cache.memory_used(), 80);
    assert_eq!(cache.get(&TORRENT, 0).unwrap()[0], 1);

    cache.insert(&TORRENT, 1, Bytes::from(vec![0u8; 101]));
    assert!(!cache.contains(&TORRENT, 1));
    assert!(cache.contains(&TORRENT, 0));
}

#[test]
fn test_piece_cache_keys_by_torrent() {
    let cache = PieceCache::new(1000);
    let other = InfoHash([8; 20]);
    cache.insert(&TORRENT, 0, Bytes::from_static(b"a"));
    cache.insert(&other, 0, Bytes::from_static(b"b"));

    assert_eq!(cache.get(&other, 0), Some(Bytes::from_static(b"b")));
    cache.remove_torrent(&TORRENT);
    assert!(!cache.contains(&TORRENT, 0));
    assert!(cache.contains(&other, 0));
    assert_eq!(cache.memory_used(), 1);

    cache.clear();
    assert!(cache.is_empty());
}

#[test]
fn test_metadata_cache_sizes() {
    let cache = MetadataCache::new(10);
    let storage = StorageId::next();
    let path = Path::new("a/b.bin");

    assert_eq!(cache.size(storage, path), None);
    cache.set_size(storage, path, 100);
    cache.extend_to(storage, path, 50);
    assert_eq!(cache.size(storage, path), Some(100));
    cache.extend_to(storage, path, 150);
    assert_eq!(cache.size(storage, path), Some(150));

    cache.invalidate(storage, path);
    assert!(cache.is_empty());
}

#[test]
fn test_metadata_cache_extend_ignores_unknown_files() {
    let cache = MetadataCache::new(1);
    let storage = StorageId::next();
    let path = Path::new("big.bin");

    cache.set_size(storage, path, 48);
    cache.set_size(storage, Path::new("other"), 8);
    assert_eq!(cache.size(storage, path), None);

    // A write that ends at 8 must not make a 48-byte file look 8 bytes long.
    cache.extend_to(storage, path, 8);
    assert_eq!(cache.size(storage, path), None);
    assert_eq!(cache.len(), 1);
}

#[test]
fn test_metadata_cache_per_storage() {
    let cache = MetadataCache::new(10);
    let old = StorageId::next();
    let new = StorageId::next();
    let path = Path::new("f");

    cache.set_size(old, path, 1);
    cache.set_size(new, path, 2);
    cache.clear_storage(old);

    assert_eq!(cache.size(old, path), None);
    assert_eq!(cache.size(new, path), Some(2));
}

#[test]
fn test_metadata_cache_bounded() {
    let cache = MetadataCache::new(2);
    let storage = StorageId::next();
    cache.set_size(storage, Path::new("1"), 1);
    cache.set_size(storage, Path::new("2"), 2);
    cache.set_size(storage, Path::new("3"), 3);

    assert_eq!(cache.len(), 2);
    assert_eq!(cache.size(storage, Path::new("1")), None);
    assert_eq!(cache.size(storage, Path::new("3")), Some(3));
}
