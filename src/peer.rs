//! Peer wire protocol codec (BEP-3, BEP-6, BEP-9, BEP-10).
//!
//! Stateless encoding and decoding of the handshake and length-prefixed
//! message frames, the piece bitfield, BEP-10 extension negotiation and
//! ut_metadata framing. [`PeerTransport`] drives the codec over any byte
//! stream; connection policy (choking, piece selection) lives elsewhere.
//!
//! Malformed handshakes and frames are protocol violations: the caller must
//! drop the connection (see [`PeerError::is_protocol_violation`]).

mod bitfield;
mod error;
mod extension;
mod message;
mod metadata;
mod peer_id;
mod transport;

pub use bitfield::Bitfield;
pub use error::PeerError;
pub use extension::{ExtensionHandshake, ExtensionMessage, ExtensionRegistry, EXTENSION_HANDSHAKE_ID};
pub use message::{FrameDecoder, Handshake, Message, MessageId};
pub use metadata::{metadata_piece_count, MetadataMessage, MetadataMessageType};
pub use peer_id::PeerId;
pub use transport::{connect_tcp, PeerTransport};
