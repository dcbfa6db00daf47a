use std::net::SocketAddr;
use std::time::Duration;

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::trace;

use super::error::PeerError;
use super::message::{FrameDecoder, Handshake, Message};
use crate::constants::{HANDSHAKE_LEN, PEER_READ_TIMEOUT, PEER_WRITE_TIMEOUT};

/// Drives the wire codec over any byte stream.
pub struct PeerTransport<S> {
    stream: S,
    read_buf: BytesMut,
    decoder: FrameDecoder,
    read_timeout: Duration,
    write_timeout: Duration,
}

/// Opens a TCP connection to a peer.
pub async fn connect_tcp(addr: SocketAddr) -> Result<PeerTransport<TcpStream>, PeerError> {
    let stream = timeout(PEER_WRITE_TIMEOUT, TcpStream::connect(addr))
        .await
        .map_err(|_| PeerError::Timeout)??;
    stream.set_nodelay(true)?;
    Ok(PeerTransport::new(stream))
}

impl<S: AsyncRead + AsyncWrite + Unpin> PeerTransport<S> {
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            read_buf: BytesMut::with_capacity(32 * 1024),
            decoder: FrameDecoder::default(),
            read_timeout: PEER_READ_TIMEOUT,
            write_timeout: PEER_WRITE_TIMEOUT,
        }
    }

    pub fn with_timeouts(mut self, read: Duration, write: Duration) -> Self {
        self.read_timeout = read;
        self.write_timeout = write;
        self
    }

    async fn fill(&mut self) -> Result<(), PeerError> {
        let n = timeout(self.read_timeout, self.stream.read_buf(&mut self.read_buf))
            .await
            .map_err(|_| PeerError::Timeout)??;
        if n == 0 {
            return Err(PeerError::ConnectionClosed);
        }
        Ok(())
    }

    async fn write(&mut self, data: &[u8]) -> Result<(), PeerError> {
        timeout(self.write_timeout, self.stream.write_all(data))
            .await
            .map_err(|_| PeerError::Timeout)??;
        Ok(())
    }

    pub async fn send_handshake(&mut self, handshake: &Handshake) -> Result<(), PeerError> {
        self.write(&handshake.encode()).await
    }

    pub async fn receive_handshake(&mut self) -> Result<Handshake, PeerError> {
        while self.read_buf.len() < HANDSHAKE_LEN {
            self.fill().await?;
        }
        let data = self.read_buf.split_to(HANDSHAKE_LEN);
        Handshake::decode(&data)
    }

    /// Exchanges handshakes and checks the remote is on the same torrent.
    pub async fn handshake(&mut self, local: &Handshake) -> Result<Handshake, PeerError> {
        self.send_handshake(local).await?;
        let remote = self.receive_handshake().await?;
        if remote.info_hash != local.info_hash {
            return Err(PeerError::InfoHashMismatch);
        }
        trace!(
            extensions = remote.supports_extension_protocol(),
            fast = remote.supports_fast_extension(),
            "handshake complete"
        );
        Ok(remote)
    }

    pub async fn send_message(&mut self, message: &Message) -> Result<(), PeerError> {
        self.write(&message.encode()).await
    }

    pub async fn receive_message(&mut self) -> Result<Message, PeerError> {
        loop {
            if let Some(message) = self.decoder.decode(&mut self.read_buf)? {
                return Ok(message);
            }
            self.fill().await?;
        }
    }

    pub fn get_ref(&self) -> &S {
        &self.stream
    }

    pub fn into_inner(self) -> S {
        self.stream
    }
}
