use thiserror::Error;

use crate::bencode::BencodeError;

#[derive(Debug, Error)]
pub enum MetainfoError {
    #[error("bencode error: {0}")]
    Bencode(#[from] BencodeError),

    #[error("missing field: {0}")]
    MissingField(&'static str),

    #[error("invalid field: {0}")]
    InvalidField(&'static str),

    #[error("invalid info hash: {0}")]
    InvalidInfoHash(String),

    #[error("expected {expected} piece hashes, found {found}")]
    PieceCountMismatch { expected: usize, found: usize },

    #[error("unsafe file path: {0}")]
    UnsafePath(String),

    #[error("piece {index} is out of range ({count} pieces)")]
    PieceOutOfRange { index: u32, count: usize },

    #[error("file {index} is out of range ({count} files)")]
    FileOutOfRange { index: usize, count: usize },

    #[error("range {start}..{end} exceeds {limit} bytes")]
    RangeOutOfBounds { start: u64, end: u64, limit: u64 },

    #[error("illegal state transition for piece {0}")]
    IllegalPieceTransition(u32),
}
