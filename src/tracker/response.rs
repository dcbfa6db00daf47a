use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;

use crate::constants::{COMPACT_PEER6_LEN, COMPACT_PEER_LEN};
use crate::metainfo::InfoHash;
use crate::peer::PeerId;

/// A peer returned from a tracker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Peer {
    pub addr: SocketAddr,
    /// Only non-compact HTTP responses carry the peer id.
    pub peer_id: Option<[u8; 20]>,
}

impl Peer {
    pub fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            peer_id: None,
        }
    }

    /// Parses the 6-byte compact form: IPv4 address then big-endian port.
    pub fn from_compact_v4(bytes: &[u8]) -> Option<Self> {
        let bytes: &[u8; COMPACT_PEER_LEN] = bytes.try_into().ok()?;
        let ip = Ipv4Addr::new(bytes[0], bytes[1], bytes[2], bytes[3]);
        let port = u16::from_be_bytes([bytes[4], bytes[5]]);
        Some(Self::new(SocketAddr::new(IpAddr::V4(ip), port)))
    }

    /// Parses the 18-byte compact IPv6 form.
    pub fn from_compact_v6(bytes: &[u8]) -> Option<Self> {
        let bytes: &[u8; COMPACT_PEER6_LEN] = bytes.try_into().ok()?;
        let mut ip = [0u8; 16];
        ip.copy_from_slice(&bytes[..16]);
        let port = u16::from_be_bytes([bytes[16], bytes[17]]);
        Some(Self::new(SocketAddr::new(IpAddr::V6(Ipv6Addr::from(ip)), port)))
    }
}

/// Splits a compact peer string. Trailing bytes that do not form a whole
/// entry are ignored.
pub fn parse_compact_peers(data: &[u8]) -> Vec<Peer> {
    data.chunks_exact(COMPACT_PEER_LEN)
        .filter_map(Peer::from_compact_v4)
        .collect()
}

pub fn parse_compact_peers6(data: &[u8]) -> Vec<Peer> {
    data.chunks_exact(COMPACT_PEER6_LEN)
        .filter_map(Peer::from_compact_v6)
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrackerEvent {
    #[default]
    None,
    Started,
    Stopped,
    Completed,
}

impl TrackerEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrackerEvent::None => "",
            TrackerEvent::Started => "started",
            TrackerEvent::Stopped => "stopped",
            TrackerEvent::Completed => "completed",
        }
    }

    pub fn as_udp_id(&self) -> u32 {
        match self {
            TrackerEvent::None => 0,
            TrackerEvent::Completed => 1,
            TrackerEvent::Started => 2,
            TrackerEvent::Stopped => 3,
        }
    }
}

/// What we report to a tracker on each announce.
#[derive(Debug, Clone)]
pub struct AnnounceRequest {
    pub info_hash: InfoHash,
    pub peer_id: PeerId,
    pub uploaded: u64,
    pub downloaded: u64,
    pub left: u64,
    pub event: TrackerEvent,
}

impl AnnounceRequest {
    pub fn new(info_hash: InfoHash, peer_id: PeerId, left: u64) -> Self {
        Self {
            info_hash,
            peer_id,
            uploaded: 0,
            downloaded: 0,
            left,
            event: TrackerEvent::None,
        }
    }

    pub fn with_event(mut self, event: TrackerEvent) -> Self {
        self.event = event;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnounceResponse {
    pub interval: Duration,
    pub min_interval: Option<Duration>,
    /// Seeders.
    pub complete: Option<u32>,
    /// Leechers.
    pub incomplete: Option<u32>,
    pub peers: Vec<Peer>,
    pub warning_message: Option<String>,
    pub tracker_id: Option<String>,
}

impl AnnounceResponse {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            min_interval: None,
            complete: None,
            incomplete: None,
            peers: Vec::new(),
            warning_message: None,
            tracker_id: None,
        }
    }

    pub fn peer_addrs(&self) -> impl Iterator<Item = SocketAddr> + '_ {
        self.peers.iter().map(|p| p.addr)
    }
}
