//! Tracker clients (BEP-3, BEP-15, BEP-23).
//!
//! A [`Tracker`] is one announce URL of one torrent. It walks
//! `idle → connecting (UDP only) → announcing → idle | error` and keeps
//! error and timeout counters for the caller's backoff policy.
//!
//! ```no_run
//! # async fn run(req: btcore::tracker::AnnounceRequest) -> Result<(), btcore::tracker::TrackerError> {
//! use btcore::config::TrackerConfig;
//! use btcore::tracker::Tracker;
//!
//! let tracker = Tracker::from_url("udp://tracker.example.org:6969/announce", TrackerConfig::default())?;
//! if let Some(response) = tracker.announce(&req).await? {
//!     println!("{} peers, next in {:?}", response.peers.len(), response.interval);
//! }
//! # Ok(())
//! # }
//! ```

mod client;
mod error;
mod http;
mod response;
mod state;
mod udp;

pub use client::Tracker;
pub use error::TrackerError;
pub use http::{build_announce_url, parse_announce_response, HttpTransport};
pub use response::{
    parse_compact_peers, parse_compact_peers6, AnnounceRequest, AnnounceResponse, Peer,
    TrackerEvent,
};
pub use state::{TrackerState, TrackerStatus};
pub use udp::{
    decode_announce_response, decode_connect_response, encode_announce_request,
    encode_connect_request, parse_udp_url, DatagramSocket, UdpAnnounceOptions, UdpTransport,
};

#[cfg(test)]
mod tests;
