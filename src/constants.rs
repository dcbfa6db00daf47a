//! Protocol constants and tuning defaults.
//!
//! Wire constants are fixed by the BEPs. The disk and tracker timings are
//! empirically tuned defaults; [`crate::config`] exposes every one of them
//! so hosts can override them.

use std::time::Duration;

// ============================================================================
// Client identification
// ============================================================================

/// Azureus-style peer id prefix.
pub const CLIENT_PREFIX: &[u8; 8] = b"-BC0001-";

/// User agent sent to HTTP trackers.
pub const USER_AGENT: &str = "btcore/0.1.0";

/// Default BitTorrent listen port.
pub const DEFAULT_PORT: u16 = 6881;

// ============================================================================
// Peer wire protocol (BEP-3, BEP-6, BEP-10)
// ============================================================================

/// Protocol string carried in the handshake.
pub const PROTOCOL_STRING: &[u8; 19] = b"BitTorrent protocol";

/// Handshake frame: pstrlen + pstr + reserved + info hash + peer id.
pub const HANDSHAKE_LEN: usize = 1 + 19 + 8 + 20 + 20;

/// Standard block size for piece requests.
pub const BLOCK_SIZE: u32 = 16 * 1024;

/// Largest frame body accepted from a peer (a 16 MiB piece payload plus the
/// piece message header).
pub const MAX_FRAME_LEN: usize = 16 * 1024 * 1024 + 13;

/// Extension ids we advertise in our BEP-10 handshake.
pub const LOCAL_UT_METADATA_ID: u8 = 2;
pub const LOCAL_UT_PEX_ID: u8 = 3;

/// ut_metadata piece size (BEP-9).
pub const METADATA_PIECE_SIZE: usize = 16 * 1024;

pub const PEER_READ_TIMEOUT: Duration = Duration::from_secs(120);
pub const PEER_WRITE_TIMEOUT: Duration = Duration::from_secs(30);

// ============================================================================
// Trackers (BEP-3, BEP-15, BEP-23)
// ============================================================================

/// Magic protocol id opening every UDP tracker connect request.
pub const UDP_PROTOCOL_ID: u64 = 0x41727101980;

pub const UDP_CONNECT_REQUEST_LEN: usize = 16;
pub const UDP_CONNECT_RESPONSE_LEN: usize = 16;
pub const UDP_ANNOUNCE_REQUEST_LEN: usize = 98;
pub const UDP_ANNOUNCE_RESPONSE_HEADER_LEN: usize = 20;

/// Bytes per IPv4 compact peer entry.
pub const COMPACT_PEER_LEN: usize = 6;
/// Bytes per IPv6 compact peer entry.
pub const COMPACT_PEER6_LEN: usize = 18;

/// No response within this window fails the announce attempt.
pub const TRACKER_ANNOUNCE_TIMEOUT: Duration = Duration::from_secs(20);

/// A UDP connection id may be reused for this long (BEP-15).
pub const UDP_CONNECTION_ID_TTL: Duration = Duration::from_secs(60);

/// Largest UDP tracker datagram we read.
pub const UDP_MAX_DATAGRAM: usize = 2048;

// ============================================================================
// Disk I/O scheduler
// ============================================================================

/// Per-job completion timer.
pub const DISK_JOB_TIMEOUT: Duration = Duration::from_secs(40);

/// How often the queue head is sampled for stall detection.
pub const DISK_STALL_CHECK_INTERVAL: Duration = Duration::from_secs(30);

/// Consecutive samples with an unchanged head before it is declared stalled.
pub const DISK_STALL_INTERVALS: u32 = 2;

/// Stalls in a torrent's lifetime before the storage is considered unusable.
pub const DISK_FATAL_STALL_COUNT: u32 = 3;

/// Zero-fill writes are issued in chunks of this size.
pub const ZERO_FILL_CHUNK: usize = 1024 * 1024;

/// Depth of the command channel feeding a torrent's disk worker.
pub const DISK_COMMAND_BUFFER: usize = 256;

/// Capacity of the disk event broadcast channel.
pub const DISK_EVENT_BUFFER: usize = 1024;

// ============================================================================
// Caches
// ============================================================================

/// Default byte budget for cached piece data.
pub const PIECE_CACHE_BYTES: usize = 64 * 1024 * 1024;

/// Default number of file sizes remembered by the metadata cache.
pub const METADATA_CACHE_ENTRIES: usize = 4096;
