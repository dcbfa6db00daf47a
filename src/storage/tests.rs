use super::*;
use std::path::Path;
use tempfile::TempDir;

#[tokio::test]
async fn test_fs_write_creates_parents() {
    let temp = TempDir::new().unwrap();
    let storage = FsStorage::new(temp.path());
    let path = Path::new("album/disc1/track.flac");

    storage.open_for_write(path).await.unwrap();
    storage.write_at(path, 4, b"data").await.unwrap();
    storage.flush().await.unwrap();

    let on_disk = tokio::fs::read(temp.path().join(path)).await.unwrap();
    assert_eq!(on_disk, b"\0\0\0\0data");
    assert_eq!(storage.metadata(path).await.unwrap().size, 8);
}

#[tokio::test]
async fn test_fs_read_back() {
    let temp = TempDir::new().unwrap();
    let storage = FsStorage::new(temp.path());
    let path = Path::new("file.bin");

    let data: Vec<u8> = (0..=255).collect();
    storage.write_at(path, 0, &data).await.unwrap();
    let read = storage.read_at(path, 16, 32).await.unwrap();
    assert_eq!(&read[..], &data[16..48]);
}

#[tokio::test]
async fn test_fs_short_read_is_error() {
    let temp = TempDir::new().unwrap();
    let storage = FsStorage::new(temp.path());
    let path = Path::new("small.bin");

    storage.write_at(path, 0, b"abc").await.unwrap();
    let err = storage.read_at(path, 0, 10).await.unwrap_err();
    assert!(matches!(
        err,
        StorageError::ShortRead {
            expected: 10,
            found: 3,
            ..
        }
    ));
}

#[tokio::test]
async fn test_fs_missing_file() {
    let temp = TempDir::new().unwrap();
    let storage = FsStorage::new(temp.path());
    let path = Path::new("nope.bin");

    assert!(matches!(
        storage.metadata(path).await,
        Err(StorageError::NotFound(_))
    ));
    assert!(matches!(
        storage.open_for_read(path).await,
        Err(StorageError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_fs_truncate_extends_and_cuts() {
    let temp = TempDir::new().unwrap();
    let storage = FsStorage::new(temp.path());
    let path = Path::new("sparse.bin");

    storage.truncate(path, 4096).await.unwrap();
    assert_eq!(storage.metadata(path).await.unwrap().size, 4096);
    let zeros = storage.read_at(path, 4000, 96).await.unwrap();
    assert!(zeros.iter().all(|&b| b == 0));

    storage.truncate(path, 10).await.unwrap();
    assert_eq!(storage.metadata(path).await.unwrap().size, 10);
}

#[tokio::test]
async fn test_fs_read_handle_upgrades_to_write() {
    let temp = TempDir::new().unwrap();
    std::fs::write(temp.path().join("existing.bin"), b"hello").unwrap();
    let storage = FsStorage::new(temp.path());
    let path = Path::new("existing.bin");

    storage.open_for_read(path).await.unwrap();
    storage.write_at(path, 0, b"J").await.unwrap();
    assert_eq!(&storage.read_at(path, 0, 5).await.unwrap()[..], b"Jello");
}

#[tokio::test]
async fn test_path_traversal_rejected() {
    let temp = TempDir::new().unwrap();
    let storage = FsStorage::new(temp.path());

    for bad in ["../escape.bin", "/etc/passwd", "a/../../b", ""] {
        let result = storage.open_for_write(Path::new(bad)).await;
        assert!(
            matches!(result, Err(StorageError::PathTraversal(_))),
            "{} accepted",
            bad
        );
    }

    let memory = MemoryStorage::new();
    assert!(matches!(
        memory.write_at(Path::new("../x"), 0, b"x").await,
        Err(StorageError::PathTraversal(_))
    ));
}

#[tokio::test]
async fn test_memory_storage() {
    let storage = MemoryStorage::new();
    let path = Path::new("dir/file");

    assert!(storage.metadata(path).await.is_err());
    storage.open_for_write(path).await.unwrap();
    assert_eq!(storage.metadata(path).await.unwrap().size, 0);

    storage.write_at(path, 2, b"xy").await.unwrap();
    assert_eq!(storage.contents(path).unwrap(), b"\0\0xy");

    storage.truncate(path, 3).await.unwrap();
    assert_eq!(storage.contents(path).unwrap(), b"\0\0x");

    assert!(matches!(
        storage.read_at(path, 2, 2).await,
        Err(StorageError::ShortRead { found: 1, .. })
    ));
}

#[test]
fn test_storage_ids_are_unique() {
    let a = MemoryStorage::new();
    let b = MemoryStorage::new();
    assert_ne!(a.id(), b.id());
}

#[cfg(unix)]
#[test]
fn test_io_error_carries_native_kind() {
    let err = StorageError::io(
        StorageOp::Write,
        Path::new("f"),
        std::io::Error::from_raw_os_error(13),
    );
    assert_eq!(err.kind_name(), "PermissionDenied");
    assert_eq!(err.os_code(), Some(13));
    assert!(err.to_string().contains("os error 13"));

    let missing = StorageError::io(
        StorageOp::Open,
        Path::new("f"),
        std::io::Error::from(std::io::ErrorKind::NotFound),
    );
    assert!(matches!(missing, StorageError::NotFound(_)));
}

#[cfg(target_os = "linux")]
#[tokio::test]
async fn test_fs_write_error_belongs_to_its_call() {
    if !Path::new("/dev/full").exists() {
        return;
    }
    let storage = FsStorage::new("/dev");
    let path = Path::new("full");

    let err = storage.write_at(path, 0, b"no room").await.unwrap_err();
    assert!(matches!(
        err,
        StorageError::Io {
            op: StorageOp::Write,
            ..
        }
    ));
    // ENOSPC
    assert_eq!(err.os_code(), Some(28));
}
