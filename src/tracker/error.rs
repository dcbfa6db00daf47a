use thiserror::Error;

#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("tracker answered with http status {0}")]
    HttpStatus(u16),

    #[error("bencode error: {0}")]
    Bencode(#[from] crate::bencode::BencodeError),

    /// The tracker refused the announce (`failure reason`, or a UDP error
    /// action).
    #[error("tracker returned error: {0}")]
    Failure(String),

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("transaction id mismatch: sent {sent:#010x}, got {received:#010x}")]
    TransactionMismatch { sent: u32, received: u32 },

    #[error("timeout")]
    Timeout,

    /// The announce future was dropped before the exchange finished.
    #[error("announce abandoned before completion")]
    Abandoned,

    #[error("invalid url: {0}")]
    InvalidUrl(String),

    #[error("unsupported protocol: {0}")]
    UnsupportedProtocol(String),
}

impl TrackerError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, TrackerError::Timeout)
    }
}
