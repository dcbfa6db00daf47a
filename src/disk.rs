//! Per-torrent disk I/O scheduler.
//!
//! Each torrent gets one worker task that owns its [`Storage`] and runs
//! exactly one storage call at a time, so writes, truncates and reads on
//! the same file never race.
//!
//! A piece write or read is a composite job. When it reaches the head of
//! the queue it is replaced by per-file sub-jobs queued ahead of
//! everything else, and re-enters the head once they have all reported:
//!
//! ```text
//! write piece: get-metadata per file -> truncate/zero-fill short files -> write per span -> aggregate
//! read piece:  read per span -> assemble in file order
//! ```
//!
//! The composite's caller is answered exactly once, with success or a
//! [`DiskError::PieceFailed`] carrying every sub-job failure.
//!
//! Every storage call runs under [`DiskConfig::job_timeout`]. A separate
//! check fails the job at the head of the queue if it has not changed for
//! [`DiskConfig::stall_intervals`] checks; after
//! [`DiskConfig::fatal_stall_count`] stalls the worker halts writes until
//! [`DiskHandle::replace_storage`] is called.
//!
//! [`Storage`]: crate::storage::Storage
//! [`DiskConfig::job_timeout`]: crate::config::DiskConfig::job_timeout
//! [`DiskConfig::stall_intervals`]: crate::config::DiskConfig::stall_intervals
//! [`DiskConfig::fatal_stall_count`]: crate::config::DiskConfig::fatal_stall_count
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use btcore::disk::{DiskCaches, DiskHandle};
//! use btcore::config::DiskConfig;
//! use btcore::metainfo::Torrent;
//! use btcore::storage::FsStorage;
//! use bytes::Bytes;
//!
//! # async fn example(torrent: Torrent) -> Result<(), Box<dyn std::error::Error>> {
//! let storage = Arc::new(FsStorage::new("/downloads"));
//! let disk = DiskHandle::spawn(Arc::new(torrent), storage, DiskCaches::default(), DiskConfig::default());
//!
//! disk.write_verified_piece(0, Bytes::from(vec![0u8; 16384])).await?;
//! let data = disk.read_piece(0).await?;
//! # Ok(())
//! # }
//! ```

mod error;
mod handle;
mod job;
mod manager;
mod queue;
mod verify;
mod worker;

pub use error::{DiskError, SubJobFailure};
pub use handle::{DiskCaches, DiskEvent, DiskHandle, DiskStatus};
pub use job::{JobId, JobState, JobType};
pub use manager::DiskManager;
pub use verify::verify_piece;
