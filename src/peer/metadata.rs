//! ut_metadata (BEP-9) framing: a bencoded header dictionary, followed by
//! the raw metadata block for `data` messages.

use std::collections::BTreeMap;

use bytes::{BufMut, Bytes, BytesMut};

use super::error::PeerError;
use crate::bencode::{decode_prefix, encode, Value};
use crate::constants::METADATA_PIECE_SIZE;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataMessageType {
    Request = 0,
    Data = 1,
    Reject = 2,
}

impl TryFrom<i64> for MetadataMessageType {
    type Error = PeerError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(MetadataMessageType::Request),
            1 => Ok(MetadataMessageType::Data),
            2 => Ok(MetadataMessageType::Reject),
            other => Err(PeerError::Extension(format!("unknown msg_type {}", other))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataMessage {
    pub msg_type: MetadataMessageType,
    pub piece: u32,
    /// Only present on data messages.
    pub total_size: Option<u64>,
    pub data: Option<Bytes>,
}

impl MetadataMessage {
    pub fn request(piece: u32) -> Self {
        Self {
            msg_type: MetadataMessageType::Request,
            piece,
            total_size: None,
            data: None,
        }
    }

    pub fn data(piece: u32, total_size: u64, data: Bytes) -> Self {
        Self {
            msg_type: MetadataMessageType::Data,
            piece,
            total_size: Some(total_size),
            data: Some(data),
        }
    }

    pub fn reject(piece: u32) -> Self {
        Self {
            msg_type: MetadataMessageType::Reject,
            piece,
            total_size: None,
            data: None,
        }
    }

    pub fn encode(&self) -> Bytes {
        let mut dict = BTreeMap::new();
        dict.insert(
            Bytes::from_static(b"msg_type"),
            Value::Integer(self.msg_type as i64),
        );
        dict.insert(Bytes::from_static(b"piece"), Value::Integer(self.piece as i64));
        if let Some(total_size) = self.total_size {
            dict.insert(
                Bytes::from_static(b"total_size"),
                Value::Integer(total_size as i64),
            );
        }

        let header = encode(&Value::Dict(dict));
        let data_len = self.data.as_ref().map_or(0, Bytes::len);
        let mut buf = BytesMut::with_capacity(header.len() + data_len);
        buf.put_slice(&header);
        if let Some(data) = &self.data {
            buf.put_slice(data);
        }
        buf.freeze()
    }

    pub fn decode(payload: &[u8]) -> Result<Self, PeerError> {
        let (header, consumed) = decode_prefix(payload)?;
        if header.as_dict().is_none() {
            return Err(PeerError::Extension("metadata header is not a dictionary".into()));
        }

        let msg_type = header
            .get(b"msg_type")
            .and_then(Value::as_integer)
            .ok_or_else(|| PeerError::Extension("missing msg_type".into()))
            .and_then(MetadataMessageType::try_from)?;
        let piece = header
            .get(b"piece")
            .and_then(Value::as_integer)
            .and_then(|p| u32::try_from(p).ok())
            .ok_or_else(|| PeerError::Extension("missing or invalid piece".into()))?;
        let total_size = header
            .get(b"total_size")
            .and_then(Value::as_integer)
            .and_then(|s| u64::try_from(s).ok());

        let trailing = &payload[consumed..];
        let data = match msg_type {
            MetadataMessageType::Data => {
                if total_size.is_none() {
                    return Err(PeerError::Extension("data message without total_size".into()));
                }
                if trailing.len() > METADATA_PIECE_SIZE {
                    return Err(PeerError::Extension(format!(
                        "metadata block of {} bytes",
                        trailing.len()
                    )));
                }
                Some(Bytes::copy_from_slice(trailing))
            }
            _ if !trailing.is_empty() => {
                return Err(PeerError::Extension(
                    "unexpected data after metadata header".into(),
                ))
            }
            _ => None,
        };

        Ok(Self {
            msg_type,
            piece,
            total_size,
            data,
        })
    }
}

/// Number of 16 KiB metadata blocks for an info dictionary of this size.
pub fn metadata_piece_count(metadata_size: usize) -> usize {
    metadata_size.div_ceil(METADATA_PIECE_SIZE)
}

pub fn metadata_piece_size(piece: u32, total_size: usize) -> usize {
    let offset = piece as usize * METADATA_PIECE_SIZE;
    total_size.saturating_sub(offset).min(METADATA_PIECE_SIZE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_has_no_trailing_data() {
        let encoded = MetadataMessage::request(5).encode();
        assert_eq!(&encoded[..], b"d8:msg_typei0e5:piecei5ee");
        let decoded = MetadataMessage::decode(&encoded).unwrap();
        assert_eq!(decoded, MetadataMessage::request(5));
    }

    #[test]
    fn test_data_block_follows_header() {
        let data = Bytes::from_static(b"d4:name3:abce");
        let msg = MetadataMessage::data(0, 13, data.clone());
        let decoded = MetadataMessage::decode(&msg.encode()).unwrap();
        assert_eq!(decoded.msg_type, MetadataMessageType::Data);
        assert_eq!(decoded.total_size, Some(13));
        // The block itself is bencode; it must not be parsed as part of the header.
        assert_eq!(decoded.data, Some(data));
    }

    #[test]
    fn test_reject_with_trailing_bytes_is_invalid() {
        let mut payload = MetadataMessage::reject(1).encode().to_vec();
        payload.extend_from_slice(b"junk");
        assert!(MetadataMessage::decode(&payload).is_err());
    }

    #[test]
    fn test_unknown_msg_type() {
        assert!(MetadataMessage::decode(b"d8:msg_typei7e5:piecei0ee").is_err());
    }

    #[test]
    fn test_metadata_piece_count() {
        assert_eq!(metadata_piece_count(0), 0);
        assert_eq!(metadata_piece_count(1), 1);
        assert_eq!(metadata_piece_count(16384), 1);
        assert_eq!(metadata_piece_count(16385), 2);
        assert_eq!(metadata_piece_size(1, 16385), 1);
        assert_eq!(metadata_piece_size(2, 16385), 0);
    }
}
