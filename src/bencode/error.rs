use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BencodeError {
    #[error("unexpected end of input at byte {0}")]
    UnexpectedEof(usize),

    #[error("invalid integer at byte {at}: {reason}")]
    InvalidInteger { at: usize, reason: String },

    #[error("invalid string length at byte {0}")]
    InvalidStringLength(usize),

    #[error("unexpected byte 0x{byte:02x} at {at}")]
    UnexpectedByte { byte: u8, at: usize },

    #[error("dictionary key at byte {0} is not a byte string")]
    NonStringKey(usize),

    #[error("trailing data after value at byte {0}")]
    TrailingData(usize),

    #[error("nesting deeper than {0} levels")]
    NestingTooDeep(usize),
}
