use bytes::Bytes;
use std::ops::Range;

use super::error::MetainfoError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PieceState {
    Missing,
    /// Every block has arrived and the data is held in memory.
    InMemoryComplete,
    /// Written and hash-checked; the buffer has been released.
    OnDiskVerified,
}

impl PieceState {
    pub fn can_transition(self, next: PieceState) -> bool {
        use PieceState::*;
        matches!(
            (self, next),
            (Missing, InMemoryComplete)
                | (InMemoryComplete, OnDiskVerified)
                | (InMemoryComplete, Missing)
                | (OnDiskVerified, Missing)
        )
    }
}

/// A piece of the torrent and, while it is being assembled, its data.
#[derive(Debug, Clone)]
pub struct Piece {
    pub index: u32,
    pub offset: u64,
    pub length: u64,
    state: PieceState,
    data: Option<Bytes>,
}

impl Piece {
    pub fn new(index: u32, offset: u64, length: u64) -> Self {
        Self {
            index,
            offset,
            length,
            state: PieceState::Missing,
            data: None,
        }
    }

    pub(crate) fn on_disk(mut self) -> Self {
        self.state = PieceState::OnDiskVerified;
        self
    }

    pub fn byte_range(&self) -> Range<u64> {
        self.offset..self.offset + self.length
    }

    pub fn state(&self) -> PieceState {
        self.state
    }

    pub fn data(&self) -> Option<&Bytes> {
        self.data.as_ref()
    }

    /// Stores the assembled piece; the data must be exactly the piece length.
    pub fn complete(&mut self, data: Bytes) -> Result<(), MetainfoError> {
        if data.len() as u64 != self.length || !self.state.can_transition(PieceState::InMemoryComplete)
        {
            return Err(MetainfoError::IllegalPieceTransition(self.index));
        }
        self.data = Some(data);
        self.state = PieceState::InMemoryComplete;
        Ok(())
    }

    /// Marks the piece as on disk and hash-checked, releasing its buffer.
    pub fn mark_verified(&mut self) -> Result<(), MetainfoError> {
        if !self.state.can_transition(PieceState::OnDiskVerified) {
            return Err(MetainfoError::IllegalPieceTransition(self.index));
        }
        self.data = None;
        self.state = PieceState::OnDiskVerified;
        Ok(())
    }

    pub fn reset(&mut self) {
        self.data = None;
        self.state = PieceState::Missing;
    }
}
