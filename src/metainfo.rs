//! Torrent metadata: info hash, file layout, pieces and `.torrent` parsing.
//!
//! A [`Torrent`] is created once its metadata is known and is shared (behind
//! an `Arc`) by every disk job and tracker that refers to it. File geometry
//! never changes after construction; the verified-piece bitfield and the
//! per-file priorities are the only mutable parts.

mod error;
mod file;
mod info_hash;
mod piece;
mod torrent;

pub use error::MetainfoError;
pub use file::{FileEntry, FilePriority};
pub use info_hash::InfoHash;
pub use piece::{Piece, PieceState};
pub use torrent::Torrent;
