use thiserror::Error;

#[derive(Debug, Error)]
pub enum PeerError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid handshake: {0}")]
    InvalidHandshake(&'static str),

    #[error("info hash mismatch")]
    InfoHashMismatch,

    #[error("invalid message: {0}")]
    InvalidMessage(String),

    #[error("invalid message id: {0}")]
    InvalidMessageId(u8),

    #[error("frame of {0} bytes exceeds the limit")]
    FrameTooLarge(usize),

    #[error("bitfield is {found} bytes, expected {expected}")]
    BitfieldLength { expected: usize, found: usize },

    #[error("connection closed")]
    ConnectionClosed,

    #[error("timeout")]
    Timeout,

    #[error("extension error: {0}")]
    Extension(String),

    #[error("extension {0} not supported by peer")]
    UnsupportedExtension(String),

    #[error("bencode error: {0}")]
    Bencode(#[from] crate::bencode::BencodeError),
}

impl PeerError {
    /// True when the peer broke the wire format and must be disconnected.
    pub fn is_protocol_violation(&self) -> bool {
        matches!(
            self,
            PeerError::InvalidHandshake(_)
                | PeerError::InfoHashMismatch
                | PeerError::InvalidMessage(_)
                | PeerError::InvalidMessageId(_)
                | PeerError::FrameTooLarge(_)
                | PeerError::BitfieldLength { .. }
                | PeerError::Extension(_)
                | PeerError::Bencode(_)
        )
    }
}
