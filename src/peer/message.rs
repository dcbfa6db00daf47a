use bytes::{Buf, BufMut, Bytes, BytesMut};

use super::error::PeerError;
use crate::constants::{HANDSHAKE_LEN, MAX_FRAME_LEN, PROTOCOL_STRING};

/// The id byte that follows a frame's length prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageId {
    /// The sender will not serve requests.
    Choke = 0,
    /// The sender will serve requests.
    Unchoke = 1,
    /// The sender wants pieces the receiver has.
    Interested = 2,
    NotInterested = 3,
    /// The sender completed a piece.
    Have = 4,
    /// The sender's piece set, sent right after the handshake.
    Bitfield = 5,
    /// Asks for one block of a piece.
    Request = 6,
    /// Carries one requested block.
    Piece = 7,
    /// Withdraws an earlier request.
    Cancel = 8,
    /// The sender's DHT port.
    Port = 9,
    // Fast extension (BEP-6)
    /// A piece the sender suggests downloading.
    Suggest = 13,
    /// Replaces a bitfield when the sender has every piece.
    HaveAll = 14,
    /// Replaces a bitfield when the sender has no pieces.
    HaveNone = 15,
    /// Refuses a request instead of silently dropping it.
    Reject = 16,
    /// A piece the receiver may request even while choked.
    AllowedFast = 17,
    // Extension protocol (BEP-10)
    /// A BEP-10 message with its own one-byte extension id.
    Extended = 20,
}

impl TryFrom<u8> for MessageId {
    type Error = PeerError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        use MessageId::*;
        Ok(match value {
            0 => Choke,
            1 => Unchoke,
            2 => Interested,
            3 => NotInterested,
            4 => Have,
            5 => Bitfield,
            6 => Request,
            7 => Piece,
            8 => Cancel,
            9 => Port,
            13 => Suggest,
            14 => HaveAll,
            15 => HaveNone,
            16 => Reject,
            17 => AllowedFast,
            20 => Extended,
            other => return Err(PeerError::InvalidMessageId(other)),
        })
    }
}

/// The fixed 68-byte handshake that opens every peer connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handshake {
    /// Capability bits; see the `supports_*` accessors.
    pub reserved: [u8; 8],
    pub info_hash: [u8; 20],
    pub peer_id: [u8; 20],
}

impl Handshake {
    const EXTENSION_PROTOCOL: (usize, u8) = (5, 0x10);
    const FAST_EXTENSION: (usize, u8) = (7, 0x04);
    const DHT: (usize, u8) = (7, 0x01);

    /// A handshake advertising the extension protocol and fast extension.
    pub fn new(info_hash: [u8; 20], peer_id: [u8; 20]) -> Self {
        let mut hs = Self {
            reserved: [0; 8],
            info_hash,
            peer_id,
        };
        hs.set_flag(Self::EXTENSION_PROTOCOL, true);
        hs.set_flag(Self::FAST_EXTENSION, true);
        hs
    }

    /// Sets or clears the DHT bit (byte 7, `0x01`).
    pub fn with_dht(mut self, enabled: bool) -> Self {
        self.set_flag(Self::DHT, enabled);
        self
    }

    fn flag(&self, (byte, mask): (usize, u8)) -> bool {
        self.reserved[byte] & mask != 0
    }

    fn set_flag(&mut self, (byte, mask): (usize, u8), on: bool) {
        if on {
            self.reserved[byte] |= mask;
        } else {
            self.reserved[byte] &= !mask;
        }
    }

    /// BEP-10, byte 5 `0x10`.
    pub fn supports_extension_protocol(&self) -> bool {
        self.flag(Self::EXTENSION_PROTOCOL)
    }

    /// BEP-6, byte 7 `0x04`.
    pub fn supports_fast_extension(&self) -> bool {
        self.flag(Self::FAST_EXTENSION)
    }

    pub fn supports_dht(&self) -> bool {
        self.flag(Self::DHT)
    }

    /// The 68-byte wire form.
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(HANDSHAKE_LEN);
        buf.put_u8(PROTOCOL_STRING.len() as u8);
        buf.put_slice(PROTOCOL_STRING);
        buf.put_slice(&self.reserved);
        buf.put_slice(&self.info_hash);
        buf.put_slice(&self.peer_id);
        buf.freeze()
    }

    /// Decodes a complete handshake frame.
    ///
    /// Anything but exactly 68 bytes opening with `19` and the literal
    /// protocol string is rejected.
    pub fn decode(data: &[u8]) -> Result<Self, PeerError> {
        if data.len() != HANDSHAKE_LEN {
            return Err(PeerError::InvalidHandshake("wrong length"));
        }
        if data[0] as usize != PROTOCOL_STRING.len() {
            return Err(PeerError::InvalidHandshake("protocol string length"));
        }
        if &data[1..20] != PROTOCOL_STRING {
            return Err(PeerError::InvalidHandshake("protocol string"));
        }

        let mut hs = Self {
            reserved: [0; 8],
            info_hash: [0; 20],
            peer_id: [0; 20],
        };
        hs.reserved.copy_from_slice(&data[20..28]);
        hs.info_hash.copy_from_slice(&data[28..48]);
        hs.peer_id.copy_from_slice(&data[48..68]);
        Ok(hs)
    }
}

/// A decoded peer wire message.
///
/// Block and request fields are `index` (piece), `begin` (byte offset in
/// the piece) and `length`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// A zero-length frame, sent to keep an idle connection open.
    KeepAlive,
    Choke,
    Unchoke,
    Interested,
    NotInterested,
    Have { piece: u32 },
    /// Raw payload; decode with [`Bitfield::decode`](super::Bitfield::decode)
    /// once the piece count is known.
    Bitfield(Bytes),
    Request { index: u32, begin: u32, length: u32 },
    Piece { index: u32, begin: u32, data: Bytes },
    Cancel { index: u32, begin: u32, length: u32 },
    Port(u16),
    Suggest { piece: u32 },
    HaveAll,
    HaveNone,
    Reject { index: u32, begin: u32, length: u32 },
    AllowedFast { piece: u32 },
    /// BEP-10 message; `id` is the per-connection extension id, 0 being the
    /// extension handshake.
    Extended { id: u8, payload: Bytes },
}

impl Message {
    /// The wire id, or `None` for a keep-alive.
    pub fn id(&self) -> Option<MessageId> {
        Some(match self {
            Message::KeepAlive => return None,
            Message::Choke => MessageId::Choke,
            Message::Unchoke => MessageId::Unchoke,
            Message::Interested => MessageId::Interested,
            Message::NotInterested => MessageId::NotInterested,
            Message::Have { .. } => MessageId::Have,
            Message::Bitfield(_) => MessageId::Bitfield,
            Message::Request { .. } => MessageId::Request,
            Message::Piece { .. } => MessageId::Piece,
            Message::Cancel { .. } => MessageId::Cancel,
            Message::Port(_) => MessageId::Port,
            Message::Suggest { .. } => MessageId::Suggest,
            Message::HaveAll => MessageId::HaveAll,
            Message::HaveNone => MessageId::HaveNone,
            Message::Reject { .. } => MessageId::Reject,
            Message::AllowedFast { .. } => MessageId::AllowedFast,
            Message::Extended { .. } => MessageId::Extended,
        })
    }

    fn payload_len(&self) -> usize {
        match self {
            Message::Have { .. } | Message::Suggest { .. } | Message::AllowedFast { .. } => 4,
            Message::Request { .. } | Message::Cancel { .. } | Message::Reject { .. } => 12,
            Message::Piece { data, .. } => 8 + data.len(),
            Message::Bitfield(bits) => bits.len(),
            Message::Port(_) => 2,
            Message::Extended { payload, .. } => 1 + payload.len(),
            _ => 0,
        }
    }

    /// Encodes the message with its 4-byte length prefix.
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(5 + self.payload_len());
        self.encode_into(&mut buf);
        buf.freeze()
    }

    /// Appends the encoded frame to `buf`.
    pub fn encode_into(&self, buf: &mut BytesMut) {
        let Some(id) = self.id() else {
            buf.put_u32(0);
            return;
        };
        buf.put_u32(1 + self.payload_len() as u32);
        buf.put_u8(id as u8);

        match self {
            Message::Have { piece } | Message::Suggest { piece } | Message::AllowedFast { piece } => {
                buf.put_u32(*piece)
            }
            Message::Request {
                index,
                begin,
                length,
            }
            | Message::Cancel {
                index,
                begin,
                length,
            }
            | Message::Reject {
                index,
                begin,
                length,
            } => {
                buf.put_u32(*index);
                buf.put_u32(*begin);
                buf.put_u32(*length);
            }
            Message::Piece { index, begin, data } => {
                buf.put_u32(*index);
                buf.put_u32(*begin);
                buf.put_slice(data);
            }
            Message::Bitfield(bits) => buf.put_slice(bits),
            Message::Port(port) => buf.put_u16(*port),
            Message::Extended { id, payload } => {
                buf.put_u8(*id);
                buf.put_slice(payload);
            }
            _ => {}
        }
    }

    /// Decodes one complete frame including its length prefix.
    pub fn decode(mut frame: Bytes) -> Result<Self, PeerError> {
        if frame.len() < 4 {
            return Err(PeerError::InvalidMessage("missing length prefix".into()));
        }
        let length = frame.get_u32() as usize;
        if frame.len() != length {
            return Err(PeerError::InvalidMessage(format!(
                "length prefix {} but {} bytes follow",
                length,
                frame.len()
            )));
        }
        Self::decode_body(frame)
    }

    /// Decodes a frame body: message id followed by payload.
    pub fn decode_body(mut body: Bytes) -> Result<Self, PeerError> {
        if body.is_empty() {
            return Ok(Message::KeepAlive);
        }
        let id = MessageId::try_from(body.get_u8())?;

        let expect = |len: usize, body: &Bytes| -> Result<(), PeerError> {
            if body.len() == len {
                Ok(())
            } else {
                Err(PeerError::InvalidMessage(format!(
                    "{:?} payload is {} bytes, expected {}",
                    id,
                    body.len(),
                    len
                )))
            }
        };

        let message = match id {
            MessageId::Choke => expect(0, &body).map(|_| Message::Choke)?,
            MessageId::Unchoke => expect(0, &body).map(|_| Message::Unchoke)?,
            MessageId::Interested => expect(0, &body).map(|_| Message::Interested)?,
            MessageId::NotInterested => expect(0, &body).map(|_| Message::NotInterested)?,
            MessageId::HaveAll => expect(0, &body).map(|_| Message::HaveAll)?,
            MessageId::HaveNone => expect(0, &body).map(|_| Message::HaveNone)?,
            MessageId::Have => {
                expect(4, &body)?;
                Message::Have {
                    piece: body.get_u32(),
                }
            }
            MessageId::Suggest => {
                expect(4, &body)?;
                Message::Suggest {
                    piece: body.get_u32(),
                }
            }
            MessageId::AllowedFast => {
                expect(4, &body)?;
                Message::AllowedFast {
                    piece: body.get_u32(),
                }
            }
            MessageId::Request | MessageId::Cancel | MessageId::Reject => {
                expect(12, &body)?;
                let (index, begin, length) = (body.get_u32(), body.get_u32(), body.get_u32());
                match id {
                    MessageId::Request => Message::Request {
                        index,
                        begin,
                        length,
                    },
                    MessageId::Cancel => Message::Cancel {
                        index,
                        begin,
                        length,
                    },
                    _ => Message::Reject {
                        index,
                        begin,
                        length,
                    },
                }
            }
            MessageId::Port => {
                expect(2, &body)?;
                Message::Port(body.get_u16())
            }
            MessageId::Bitfield => Message::Bitfield(body),
            MessageId::Piece => {
                if body.len() < 8 {
                    return Err(PeerError::InvalidMessage("piece header truncated".into()));
                }
                let index = body.get_u32();
                let begin = body.get_u32();
                Message::Piece {
                    index,
                    begin,
                    data: body,
                }
            }
            MessageId::Extended => {
                if body.is_empty() {
                    return Err(PeerError::InvalidMessage("extended id missing".into()));
                }
                let ext_id = body.get_u8();
                Message::Extended {
                    id: ext_id,
                    payload: body,
                }
            }
        };
        Ok(message)
    }
}

/// Incremental frame splitter for a byte stream.
#[derive(Debug, Clone)]
pub struct FrameDecoder {
    max_frame_len: usize,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self {
            max_frame_len: MAX_FRAME_LEN,
        }
    }
}

impl FrameDecoder {
    /// A decoder rejecting frames longer than `max_frame_len` bytes.
    pub fn with_max_frame_len(max_frame_len: usize) -> Self {
        Self { max_frame_len }
    }

    /// Takes one message off the front of `buf`, or returns `None` until a
    /// whole frame has been buffered.
    pub fn decode(&self, buf: &mut BytesMut) -> Result<Option<Message>, PeerError> {
        if buf.len() < 4 {
            return Ok(None);
        }
        let length = u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]) as usize;
        if length > self.max_frame_len {
            return Err(PeerError::FrameTooLarge(length));
        }
        if buf.len() < 4 + length {
            buf.reserve(4 + length - buf.len());
            return Ok(None);
        }
        buf.advance(4);
        let body = buf.split_to(length).freeze();
        Message::decode_body(body).map(Some)
    }
}
