use std::fmt;

use rand::Rng as _;

use super::error::PeerError;
use crate::constants::CLIENT_PREFIX;

/// Our identity on the wire, Azureus style: [`CLIENT_PREFIX`] then twelve
/// random bytes.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PeerId(pub [u8; 20]);

impl PeerId {
    pub fn generate() -> Self {
        let mut id = [0u8; 20];
        id[..CLIENT_PREFIX.len()].copy_from_slice(CLIENT_PREFIX);
        rand::rng().fill(&mut id[CLIENT_PREFIX.len()..]);
        Self(id)
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// `BC0001` for `-BC0001-...`; `None` for ids in other styles.
    pub fn client_id(&self) -> Option<&str> {
        match (self.0[0], self.0[7]) {
            (b'-', b'-') => std::str::from_utf8(&self.0[1..7]).ok(),
            _ => None,
        }
    }
}

impl From<[u8; 20]> for PeerId {
    fn from(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }
}

impl TryFrom<&[u8]> for PeerId {
    type Error = PeerError;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        <[u8; 20]>::try_from(bytes)
            .map(PeerId)
            .map_err(|_| PeerError::InvalidMessage(format!("peer id of {} bytes", bytes.len())))
    }
}

impl fmt::Debug for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.client_id() {
            Some(client) => write!(f, "PeerId({})", client),
            None => write!(f, "PeerId({:02x?})", &self.0[..8]),
        }
    }
}
