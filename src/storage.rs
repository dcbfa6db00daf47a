//! The storage capability the disk scheduler drives.
//!
//! [`Storage`] is byte-addressed file access relative to a torrent's
//! download location. [`FsStorage`] maps it onto the local filesystem and
//! [`MemoryStorage`] keeps everything in memory.
//!
//! # Security
//!
//! Paths containing `..` or absolute paths are rejected before they reach
//! the filesystem.

mod backend;
mod error;
mod fs;
mod memory;

pub use backend::{validate_relative_path, FileMetadata, Storage, StorageId};
pub use error::{StorageError, StorageOp};
pub use fs::FsStorage;
pub use memory::MemoryStorage;

#[cfg(test)]
mod tests;
