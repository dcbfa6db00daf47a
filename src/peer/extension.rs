use std::collections::BTreeMap;

use bytes::Bytes;
use tracing::debug;

use super::error::PeerError;
use super::message::Message;
use super::metadata::MetadataMessage;
use crate::bencode::{decode, encode, Value};
use crate::constants::{LOCAL_UT_METADATA_ID, LOCAL_UT_PEX_ID, USER_AGENT};

/// Extended message id reserved for the BEP-10 handshake itself.
pub const EXTENSION_HANDSHAKE_ID: u8 = 0;

/// BEP-9 metadata exchange.
pub const UT_METADATA: &str = "ut_metadata";
/// BEP-11 peer exchange.
pub const UT_PEX: &str = "ut_pex";

/// The bencoded dictionary carried by extended message 0.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtensionHandshake {
    /// Extension name to message id. An id of 0 announces the extension
    /// as disabled.
    pub extensions: BTreeMap<String, u8>,
    /// Client name and version (`v`).
    pub client: Option<String>,
    /// The sender's listening port (`p`).
    pub listen_port: Option<u16>,
    /// Our address as the sender sees it, in compact form.
    pub yourip: Option<Bytes>,
    /// How many outstanding requests the sender accepts.
    pub reqq: Option<i64>,
    /// Size of the info dictionary, for ut_metadata.
    pub metadata_size: Option<i64>,
}

impl ExtensionHandshake {
    /// A handshake listing only the given `(name, id)` pairs.
    pub fn with_extensions(extensions: &[(&str, u8)]) -> Self {
        Self {
            extensions: extensions
                .iter()
                .map(|(name, id)| ((*name).to_string(), *id))
                .collect(),
            ..Self::default()
        }
    }

    /// Bencodes the handshake dictionary.
    pub fn encode(&self) -> Bytes {
        let m = self
            .extensions
            .iter()
            .map(|(name, id)| (Bytes::copy_from_slice(name.as_bytes()), Value::Integer(*id as i64)))
            .collect();

        let mut dict = BTreeMap::new();
        dict.insert(Bytes::from_static(b"m"), Value::Dict(m));
        if let Some(client) = &self.client {
            dict.insert(Bytes::from_static(b"v"), Value::string(client));
        }
        if let Some(port) = self.listen_port {
            dict.insert(Bytes::from_static(b"p"), Value::Integer(port as i64));
        }
        if let Some(ip) = &self.yourip {
            dict.insert(Bytes::from_static(b"yourip"), Value::Bytes(ip.clone()));
        }
        if let Some(reqq) = self.reqq {
            dict.insert(Bytes::from_static(b"reqq"), Value::Integer(reqq));
        }
        if let Some(size) = self.metadata_size {
            dict.insert(Bytes::from_static(b"metadata_size"), Value::Integer(size));
        }

        Bytes::from(encode(&Value::Dict(dict)))
    }

    pub fn decode(data: &[u8]) -> Result<Self, PeerError> {
        let value = decode(data)?;
        if value.as_dict().is_none() {
            return Err(PeerError::Extension("handshake is not a dictionary".into()));
        }

        let mut hs = Self::default();
        if let Some(m) = value.get(b"m").and_then(Value::as_dict) {
            for (key, val) in m {
                let name = std::str::from_utf8(key)
                    .map_err(|_| PeerError::Extension("extension name is not utf-8".into()))?;
                let id = val
                    .as_integer()
                    .and_then(|id| u8::try_from(id).ok())
                    .ok_or_else(|| PeerError::Extension(format!("bad id for {}", name)))?;
                hs.extensions.insert(name.to_string(), id);
            }
        }

        hs.client = value.get(b"v").and_then(Value::as_str).map(String::from);
        hs.listen_port = value
            .get(b"p")
            .and_then(Value::as_integer)
            .and_then(|p| u16::try_from(p).ok());
        hs.yourip = value.get(b"yourip").and_then(Value::as_bytes).cloned();
        hs.reqq = value.get(b"reqq").and_then(Value::as_integer);
        hs.metadata_size = value.get(b"metadata_size").and_then(Value::as_integer);
        Ok(hs)
    }
}

/// A decoded BEP-10 message.
#[derive(Debug, Clone, PartialEq)]
pub enum ExtensionMessage {
    Handshake(ExtensionHandshake),
    Metadata(MetadataMessage),
    /// Raw ut_pex payload; peer exchange itself is handled by the caller.
    Pex(Bytes),
    Unknown { id: u8, payload: Bytes },
}

/// Per-connection extension negotiation.
///
/// Incoming extended messages carry *our* ids (the ones we advertised);
/// outgoing ones must use the ids the remote advertised.
#[derive(Debug, Clone)]
pub struct ExtensionRegistry {
    local: BTreeMap<String, u8>,
    remote: BTreeMap<String, u8>,
    remote_handshake: Option<ExtensionHandshake>,
}

impl Default for ExtensionRegistry {
    fn default() -> Self {
        Self::new(&[(UT_METADATA, LOCAL_UT_METADATA_ID), (UT_PEX, LOCAL_UT_PEX_ID)])
    }
}

impl ExtensionRegistry {
    /// A registry advertising `local` `(name, id)` pairs. Id 0 is reserved
    /// for the handshake and is ignored.
    pub fn new(local: &[(&str, u8)]) -> Self {
        Self {
            local: local
                .iter()
                .filter(|(_, id)| *id != EXTENSION_HANDSHAKE_ID)
                .map(|(name, id)| ((*name).to_string(), *id))
                .collect(),
            remote: BTreeMap::new(),
            remote_handshake: None,
        }
    }

    /// The handshake we send, advertising our local ids.
    pub fn local_handshake(&self, metadata_size: Option<i64>) -> ExtensionHandshake {
        ExtensionHandshake {
            extensions: self.local.clone(),
            client: Some(USER_AGENT.to_string()),
            metadata_size,
            ..ExtensionHandshake::default()
        }
    }

    /// Records the remote handshake. Later handshakes update earlier ones;
    /// an id of 0 disables that extension.
    pub fn apply_remote(&mut self, handshake: ExtensionHandshake) {
        for (name, id) in &handshake.extensions {
            if *id == 0 {
                self.remote.remove(name);
            } else {
                self.remote.insert(name.clone(), *id);
            }
        }
        debug!(extensions = ?self.remote, "remote extensions negotiated");
        self.remote_handshake = Some(handshake);
    }

    /// The last extension handshake received from the remote.
    pub fn remote_handshake(&self) -> Option<&ExtensionHandshake> {
        self.remote_handshake.as_ref()
    }

    /// The id the remote wants for `name`; outgoing messages use it.
    pub fn remote_id(&self, name: &str) -> Option<u8> {
        self.remote.get(name).copied()
    }

    /// The remote advertised `name` with a non-zero id.
    pub fn remote_supports(&self, name: &str) -> bool {
        self.remote.contains_key(name)
    }

    /// The id we advertised for `name`; incoming messages carry it.
    pub fn local_id(&self, name: &str) -> Option<u8> {
        self.local.get(name).copied()
    }

    /// Maps an incoming extended id back to the extension name.
    pub fn local_name(&self, id: u8) -> Option<&str> {
        self.local
            .iter()
            .find(|(_, local)| **local == id)
            .map(|(name, _)| name.as_str())
    }

    /// Our extension handshake as a wire message.
    pub fn handshake_message(&self, metadata_size: Option<i64>) -> Message {
        Message::Extended {
            id: EXTENSION_HANDSHAKE_ID,
            payload: self.local_handshake(metadata_size).encode(),
        }
    }

    /// Wraps `payload` for extension `name` using the remote's id.
    pub fn encode(&self, name: &str, payload: Bytes) -> Result<Message, PeerError> {
        let id = self
            .remote_id(name)
            .ok_or_else(|| PeerError::UnsupportedExtension(name.to_string()))?;
        Ok(Message::Extended { id, payload })
    }

    /// Wraps a ut_metadata message using the remote's id.
    pub fn encode_metadata(&self, message: &MetadataMessage) -> Result<Message, PeerError> {
        self.encode(UT_METADATA, message.encode())
    }

    /// Interprets an incoming extended message. A remote handshake is
    /// applied to the registry as a side effect.
    pub fn decode(&mut self, id: u8, payload: Bytes) -> Result<ExtensionMessage, PeerError> {
        if id == EXTENSION_HANDSHAKE_ID {
            let hs = ExtensionHandshake::decode(&payload)?;
            self.apply_remote(hs.clone());
            return Ok(ExtensionMessage::Handshake(hs));
        }

        match self.local_name(id) {
            Some(UT_METADATA) => Ok(ExtensionMessage::Metadata(MetadataMessage::decode(&payload)?)),
            Some(UT_PEX) => Ok(ExtensionMessage::Pex(payload)),
            _ => Ok(ExtensionMessage::Unknown { id, payload }),
        }
    }
}
