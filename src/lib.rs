//! btcore - BitTorrent transfer core
//!
//! The pieces of a BitTorrent client that sit between the network and the
//! disk, with no UI or session policy attached.
//!
//! # Modules
//!
//! - [`bencode`] - BEP-3 Bencode encoding/decoding
//! - [`metainfo`] - Torrent metainfo, info hashes, per-file priorities
//! - [`mapper`] - Piece ↔ file byte-range mapping
//! - [`peer`] - BEP-3/6/9/10 Peer wire codec and extension negotiation
//! - [`tracker`] - BEP-3/15/23 HTTP and UDP tracker clients
//! - [`storage`] - Storage capability, filesystem and in-memory backends
//! - [`cache`] - Piece data and file size caches
//! - [`disk`] - Per-torrent disk I/O scheduler
//! - [`config`] - Tunable settings
//! - [`constants`] - Protocol constants and defaults
//!
//! The library logs through [`tracing`] and never installs a subscriber.

pub mod bencode;
pub mod cache;
pub mod config;
pub mod constants;
pub mod disk;
pub mod error;
pub mod mapper;
pub mod metainfo;
pub mod peer;
pub mod storage;
pub mod tracker;

pub use bencode::{decode, encode, BencodeError, Value};
pub use cache::{MetadataCache, PieceCache};
pub use config::{CacheConfig, DiskConfig, PadStrategy, TrackerConfig};
pub use disk::{DiskCaches, DiskError, DiskEvent, DiskHandle, DiskManager, JobId, JobType};
pub use error::{Error, ErrorCategory, Result};
pub use mapper::{spanning_files_for_piece, spanning_pieces_for_file, SpanningEntry};
pub use metainfo::{FileEntry, FilePriority, InfoHash, MetainfoError, Torrent};
pub use peer::{
    Bitfield, ExtensionHandshake, ExtensionRegistry, Handshake, Message, PeerError, PeerId,
    PeerTransport,
};
pub use storage::{FsStorage, MemoryStorage, Storage, StorageError};
pub use tracker::{AnnounceRequest, AnnounceResponse, Tracker, TrackerError, TrackerEvent, TrackerState};
