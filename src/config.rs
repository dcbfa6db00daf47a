//! Typed configuration for the disk scheduler, tracker client and caches.
//!
//! Every struct implements `Default` from [`crate::constants`] and derives
//! serde traits so hosts can embed it in their own settings files. Durations
//! are (de)serialized as whole seconds.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::*;

/// How a file shorter than a write's start offset is extended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PadStrategy {
    /// `truncate` the file up to the offset; the filesystem leaves a hole.
    #[default]
    Truncate,
    /// Write real zero bytes up to the offset.
    ZeroFill,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiskConfig {
    #[serde(with = "secs")]
    pub job_timeout: Duration,
    #[serde(with = "secs")]
    pub stall_check_interval: Duration,
    pub stall_intervals: u32,
    pub fatal_stall_count: u32,
    pub pad_strategy: PadStrategy,
    pub zero_fill_chunk: usize,
    pub command_buffer: usize,
    pub event_buffer: usize,
}

impl Default for DiskConfig {
    fn default() -> Self {
        Self {
            job_timeout: DISK_JOB_TIMEOUT,
            stall_check_interval: DISK_STALL_CHECK_INTERVAL,
            stall_intervals: DISK_STALL_INTERVALS,
            fatal_stall_count: DISK_FATAL_STALL_COUNT,
            pad_strategy: PadStrategy::default(),
            zero_fill_chunk: ZERO_FILL_CHUNK,
            command_buffer: DISK_COMMAND_BUFFER,
            event_buffer: DISK_EVENT_BUFFER,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    #[serde(with = "secs")]
    pub announce_timeout: Duration,
    #[serde(with = "secs")]
    pub connection_id_ttl: Duration,
    /// Peers requested per announce; `None` lets the tracker decide.
    pub numwant: Option<u32>,
    pub port: u16,
    pub user_agent: String,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            announce_timeout: TRACKER_ANNOUNCE_TIMEOUT,
            connection_id_ttl: UDP_CONNECTION_ID_TTL,
            numwant: None,
            port: DEFAULT_PORT,
            user_agent: USER_AGENT.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub piece_cache_bytes: usize,
    pub metadata_cache_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            piece_cache_bytes: PIECE_CACHE_BYTES,
            metadata_cache_entries: METADATA_CACHE_ENTRIES,
        }
    }
}

mod secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disk_defaults_follow_constants() {
        let config = DiskConfig::default();
        assert_eq!(config.job_timeout, DISK_JOB_TIMEOUT);
        assert_eq!(config.stall_intervals, 2);
        assert_eq!(config.fatal_stall_count, 3);
        assert_eq!(config.pad_strategy, PadStrategy::Truncate);
    }

    #[test]
    fn test_tracker_defaults() {
        let config = TrackerConfig::default();
        assert_eq!(config.announce_timeout, Duration::from_secs(20));
        assert_eq!(config.numwant, None);
        assert_eq!(config.port, DEFAULT_PORT);
    }
}
