use bytes::Bytes;

use super::error::PeerError;

/// One bit per piece, most significant bit of the first byte first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bitfield {
    bits: Vec<u8>,
    piece_count: usize,
}

impl Bitfield {
    pub fn new(piece_count: usize) -> Self {
        Self {
            bits: vec![0; piece_count.div_ceil(8)],
            piece_count,
        }
    }

    pub fn full(piece_count: usize) -> Self {
        let mut bf = Self {
            bits: vec![0xFF; piece_count.div_ceil(8)],
            piece_count,
        };
        bf.clear_spare_bits();
        bf
    }

    /// Decodes a bitfield message payload.
    ///
    /// The payload must be exactly `ceil(piece_count / 8)` bytes. Bits past
    /// `piece_count` in the final byte are padding and are discarded.
    pub fn decode(payload: &[u8], piece_count: usize) -> Result<Self, PeerError> {
        let expected = piece_count.div_ceil(8);
        if payload.len() != expected {
            return Err(PeerError::BitfieldLength {
                expected,
                found: payload.len(),
            });
        }
        let mut bf = Self {
            bits: payload.to_vec(),
            piece_count,
        };
        bf.clear_spare_bits();
        Ok(bf)
    }

    pub fn has_piece(&self, index: usize) -> bool {
        index < self.piece_count && self.bits[index / 8] & (0x80 >> (index % 8)) != 0
    }

    pub fn set_piece(&mut self, index: usize) {
        if index < self.piece_count {
            self.bits[index / 8] |= 0x80 >> (index % 8);
        }
    }

    pub fn clear_piece(&mut self, index: usize) {
        if index < self.piece_count {
            self.bits[index / 8] &= !(0x80 >> (index % 8));
        }
    }

    /// Iterates exactly `piece_count` bits.
    pub fn iter(&self) -> impl Iterator<Item = bool> + '_ {
        (0..self.piece_count).map(|i| self.has_piece(i))
    }

    pub fn count(&self) -> usize {
        self.bits.iter().map(|b| b.count_ones() as usize).sum()
    }

    pub fn is_complete(&self) -> bool {
        self.count() == self.piece_count
    }

    pub fn is_empty(&self) -> bool {
        self.bits.iter().all(|&b| b == 0)
    }

    pub fn piece_count(&self) -> usize {
        self.piece_count
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bits
    }

    pub fn to_bytes(&self) -> Bytes {
        Bytes::copy_from_slice(&self.bits)
    }

    fn clear_spare_bits(&mut self) {
        let used = self.piece_count % 8;
        if used != 0 {
            if let Some(last) = self.bits.last_mut() {
                *last &= 0xFF << (8 - used);
            }
        }
    }
}
