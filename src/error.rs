//! Crate-wide error type and its coarse classification.

use std::fmt;

use thiserror::Error;

use crate::bencode::BencodeError;
use crate::disk::DiskError;
use crate::metainfo::MetainfoError;
use crate::peer::PeerError;
use crate::storage::StorageError;
use crate::tracker::TrackerError;

/// How a failure should be handled by the layer above.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Malformed wire or metadata input; drop the connection or reject the
    /// torrent.
    ProtocolViolation,
    /// Network failure talking to a peer; reconnect per caller policy.
    Transport,
    /// Announce failed; the caller decides when to retry.
    Tracker,
    /// One disk job failed; the scheduler has already moved on.
    Disk,
    /// The storage is unusable and the user must choose another.
    FatalDisk,
    /// The caller asked for something out of range.
    InvalidInput,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorCategory::ProtocolViolation => "protocol violation",
            ErrorCategory::Transport => "transport",
            ErrorCategory::Tracker => "tracker",
            ErrorCategory::Disk => "disk",
            ErrorCategory::FatalDisk => "fatal disk",
            ErrorCategory::InvalidInput => "invalid input",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Bencode(#[from] BencodeError),

    #[error(transparent)]
    Metainfo(#[from] MetainfoError),

    #[error(transparent)]
    Peer(#[from] PeerError),

    #[error(transparent)]
    Tracker(#[from] TrackerError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Disk(#[from] DiskError),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Bencode(_) => ErrorCategory::ProtocolViolation,
            Error::Metainfo(e) => match e {
                MetainfoError::PieceOutOfRange { .. }
                | MetainfoError::FileOutOfRange { .. }
                | MetainfoError::RangeOutOfBounds { .. }
                | MetainfoError::IllegalPieceTransition(_) => ErrorCategory::InvalidInput,
                _ => ErrorCategory::ProtocolViolation,
            },
            Error::Peer(e) if e.is_protocol_violation() => ErrorCategory::ProtocolViolation,
            Error::Peer(PeerError::UnsupportedExtension(_)) => ErrorCategory::InvalidInput,
            Error::Peer(_) => ErrorCategory::Transport,
            Error::Tracker(_) => ErrorCategory::Tracker,
            Error::Storage(_) => ErrorCategory::Disk,
            Error::Disk(e) if e.is_fatal() => ErrorCategory::FatalDisk,
            Error::Disk(DiskError::InvalidRequest(_)) => ErrorCategory::InvalidInput,
            Error::Disk(_) => ErrorCategory::Disk,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_categories() {
        let err: Error = PeerError::InvalidHandshake("bad pstrlen").into();
        assert_eq!(err.category(), ErrorCategory::ProtocolViolation);

        let err: Error = PeerError::ConnectionClosed.into();
        assert_eq!(err.category(), ErrorCategory::Transport);

        let err: Error = TrackerError::TransactionMismatch { sent: 1, received: 2 }.into();
        assert_eq!(err.category(), ErrorCategory::Tracker);

        let err: Error = DiskError::Stalled.into();
        assert_eq!(err.category(), ErrorCategory::Disk);

        let err: Error = DiskError::Fatal("3 disk jobs stalled".into()).into();
        assert_eq!(err.category(), ErrorCategory::FatalDisk);

        let err: Error = MetainfoError::PieceOutOfRange { index: 9, count: 2 }.into();
        assert_eq!(err.category(), ErrorCategory::InvalidInput);
    }

    #[test]
    fn test_transparent_display() {
        let err: Error = DiskError::HashMismatch(4).into();
        assert_eq!(err.to_string(), "piece 4 failed hash check");
    }
}
