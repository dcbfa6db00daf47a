//! UDP tracker protocol (BEP-15).
//!
//! The byte layouts are pure functions so they can be tested without a
//! socket; [`UdpTransport`] performs the exchange over a [`DatagramSocket`].

use std::io;
use std::sync::Arc;

use async_trait::async_trait;
use rand::Rng as _;
use tokio::net::UdpSocket;
use tokio::sync::OnceCell;
use tracing::trace;

use super::error::TrackerError;
use super::response::{parse_compact_peers, AnnounceRequest, AnnounceResponse};
use crate::constants::{
    UDP_ANNOUNCE_REQUEST_LEN, UDP_ANNOUNCE_RESPONSE_HEADER_LEN, UDP_CONNECT_REQUEST_LEN,
    UDP_CONNECT_RESPONSE_LEN, UDP_MAX_DATAGRAM, UDP_PROTOCOL_ID,
};

const ACTION_CONNECT: u32 = 0;
const ACTION_ANNOUNCE: u32 = 1;
const ACTION_ERROR: u32 = 3;

/// A connected datagram endpoint.
#[async_trait]
pub trait DatagramSocket: Send + Sync {
    async fn send(&self, buf: &[u8]) -> io::Result<usize>;
    async fn recv(&self, buf: &mut [u8]) -> io::Result<usize>;
}

#[async_trait]
impl DatagramSocket for UdpSocket {
    async fn send(&self, buf: &[u8]) -> io::Result<usize> {
        UdpSocket::send(self, buf).await
    }

    async fn recv(&self, buf: &mut [u8]) -> io::Result<usize> {
        UdpSocket::recv(self, buf).await
    }
}

/// Announce parameters that come from the tracker rather than the torrent.
#[derive(Debug, Clone, Copy)]
pub struct UdpAnnounceOptions {
    pub key: u32,
    /// `None` encodes as -1 (tracker default).
    pub numwant: Option<u32>,
    pub port: u16,
}

pub fn encode_connect_request(transaction_id: u32) -> [u8; UDP_CONNECT_REQUEST_LEN] {
    let mut buf = [0u8; UDP_CONNECT_REQUEST_LEN];
    buf[0..8].copy_from_slice(&UDP_PROTOCOL_ID.to_be_bytes());
    buf[8..12].copy_from_slice(&ACTION_CONNECT.to_be_bytes());
    buf[12..16].copy_from_slice(&transaction_id.to_be_bytes());
    buf
}

/// Returns the connection id from a connect response.
pub fn decode_connect_response(data: &[u8], transaction_id: u32) -> Result<u64, TrackerError> {
    check_header(data, ACTION_CONNECT, transaction_id, UDP_CONNECT_RESPONSE_LEN)?;
    Ok(read_u64(data, 8))
}

pub fn encode_announce_request(
    connection_id: u64,
    transaction_id: u32,
    request: &AnnounceRequest,
    options: &UdpAnnounceOptions,
) -> [u8; UDP_ANNOUNCE_REQUEST_LEN] {
    let numwant = options.numwant.map_or(-1i32, |n| n.min(i32::MAX as u32) as i32);

    let mut buf = [0u8; UDP_ANNOUNCE_REQUEST_LEN];
    buf[0..8].copy_from_slice(&connection_id.to_be_bytes());
    buf[8..12].copy_from_slice(&ACTION_ANNOUNCE.to_be_bytes());
    buf[12..16].copy_from_slice(&transaction_id.to_be_bytes());
    buf[16..36].copy_from_slice(request.info_hash.as_bytes());
    buf[36..56].copy_from_slice(request.peer_id.as_bytes());
    buf[56..64].copy_from_slice(&request.downloaded.to_be_bytes());
    buf[64..72].copy_from_slice(&request.left.to_be_bytes());
    buf[72..80].copy_from_slice(&request.uploaded.to_be_bytes());
    buf[80..84].copy_from_slice(&request.event.as_udp_id().to_be_bytes());
    // 84..88: IP address, 0 lets the tracker use the source address
    buf[88..92].copy_from_slice(&options.key.to_be_bytes());
    buf[92..96].copy_from_slice(&numwant.to_be_bytes());
    buf[96..98].copy_from_slice(&options.port.to_be_bytes());
    buf
}

/// Decodes an announce response: 20-byte header then `(len - 20) / 6`
/// compact peers.
pub fn decode_announce_response(
    data: &[u8],
    transaction_id: u32,
) -> Result<AnnounceResponse, TrackerError> {
    check_header(
        data,
        ACTION_ANNOUNCE,
        transaction_id,
        UDP_ANNOUNCE_RESPONSE_HEADER_LEN,
    )?;

    let interval = read_u32(data, 8);
    let leechers = read_u32(data, 12);
    let seeders = read_u32(data, 16);

    let mut response = AnnounceResponse::new(std::time::Duration::from_secs(interval as u64));
    response.incomplete = Some(leechers);
    response.complete = Some(seeders);
    response.peers = parse_compact_peers(&data[UDP_ANNOUNCE_RESPONSE_HEADER_LEN..]);
    Ok(response)
}

fn check_header(
    data: &[u8],
    expected_action: u32,
    transaction_id: u32,
    min_len: usize,
) -> Result<(), TrackerError> {
    if data.len() < 8 {
        return Err(TrackerError::InvalidResponse(format!(
            "{} byte datagram",
            data.len()
        )));
    }
    let action = read_u32(data, 0);
    let received = read_u32(data, 4);
    if received != transaction_id {
        return Err(TrackerError::TransactionMismatch {
            sent: transaction_id,
            received,
        });
    }
    if action == ACTION_ERROR {
        return Err(TrackerError::Failure(
            String::from_utf8_lossy(&data[8..]).into_owned(),
        ));
    }
    if action != expected_action {
        return Err(TrackerError::InvalidResponse(format!(
            "action {}, expected {}",
            action, expected_action
        )));
    }
    if data.len() < min_len {
        return Err(TrackerError::InvalidResponse(format!(
            "{} byte response, expected at least {}",
            data.len(),
            min_len
        )));
    }
    Ok(())
}

fn read_u32(data: &[u8], at: usize) -> u32 {
    u32::from_be_bytes([data[at], data[at + 1], data[at + 2], data[at + 3]])
}

fn read_u64(data: &[u8], at: usize) -> u64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&data[at..at + 8]);
    u64::from_be_bytes(bytes)
}

/// `udp://host:port[/path]` → `host:port`.
pub fn parse_udp_url(url: &str) -> Result<String, TrackerError> {
    let rest = url
        .strip_prefix("udp://")
        .ok_or_else(|| TrackerError::InvalidUrl(url.to_string()))?;
    let authority = rest.split(['/', '?']).next().unwrap_or(rest);
    match authority.rsplit_once(':') {
        Some((host, port)) if !host.is_empty() && port.parse::<u16>().is_ok() => {
            Ok(authority.to_string())
        }
        _ => Err(TrackerError::InvalidUrl(url.to_string())),
    }
}

pub struct UdpTransport {
    target: String,
    socket: OnceCell<Arc<dyn DatagramSocket>>,
}

impl UdpTransport {
    pub fn new(url: &str) -> Result<Self, TrackerError> {
        Ok(Self {
            target: parse_udp_url(url)?,
            socket: OnceCell::new(),
        })
    }

    /// Uses an already connected socket instead of binding one on first use.
    pub fn with_socket(url: &str, socket: Arc<dyn DatagramSocket>) -> Result<Self, TrackerError> {
        Ok(Self {
            target: parse_udp_url(url)?,
            socket: OnceCell::from(socket),
        })
    }

    async fn socket(&self) -> Result<&Arc<dyn DatagramSocket>, TrackerError> {
        self.socket
            .get_or_try_init(|| async {
                let socket = UdpSocket::bind("0.0.0.0:0").await?;
                socket.connect(self.target.as_str()).await?;
                Ok::<_, TrackerError>(Arc::new(socket) as Arc<dyn DatagramSocket>)
            })
            .await
    }

    async fn exchange(&self, request: &[u8]) -> Result<Vec<u8>, TrackerError> {
        let socket = self.socket().await?;
        socket.send(request).await?;
        let mut buf = vec![0u8; UDP_MAX_DATAGRAM];
        let n = socket.recv(&mut buf).await?;
        buf.truncate(n);
        Ok(buf)
    }

    pub async fn connect(&self) -> Result<u64, TrackerError> {
        let transaction_id: u32 = rand::rng().random();
        let response = self.exchange(&encode_connect_request(transaction_id)).await?;
        let connection_id = decode_connect_response(&response, transaction_id)?;
        trace!(target = %self.target, connection_id, "udp tracker connected");
        Ok(connection_id)
    }

    pub async fn announce(
        &self,
        connection_id: u64,
        request: &AnnounceRequest,
        options: &UdpAnnounceOptions,
    ) -> Result<AnnounceResponse, TrackerError> {
        let transaction_id: u32 = rand::rng().random();
        let datagram = encode_announce_request(connection_id, transaction_id, request, options);
        let response = self.exchange(&datagram).await?;
        decode_announce_response(&response, transaction_id)
    }
}
