use std::time::Duration;

use reqwest::{Client, StatusCode};

use super::error::TrackerError;
use super::response::{
    parse_compact_peers, parse_compact_peers6, AnnounceRequest, AnnounceResponse, Peer,
};
use crate::bencode::{decode, Value};
use crate::config::TrackerConfig;

pub struct HttpTransport {
    client: Client,
    url: String,
}

impl HttpTransport {
    pub fn new(url: &str, config: &TrackerConfig) -> Result<Self, TrackerError> {
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(TrackerError::InvalidUrl(url.to_string()));
        }

        let client = Client::builder()
            .user_agent(config.user_agent.as_str())
            .build()?;

        Ok(Self {
            client,
            url: url.to_string(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub async fn announce(
        &self,
        request: &AnnounceRequest,
        port: u16,
        numwant: Option<u32>,
        tracker_id: Option<&str>,
    ) -> Result<AnnounceResponse, TrackerError> {
        let url = build_announce_url(&self.url, request, port, numwant, tracker_id);
        let response = self.client.get(&url).send().await?;
        if response.status() != StatusCode::OK {
            return Err(TrackerError::HttpStatus(response.status().as_u16()));
        }
        let body = response.bytes().await?;
        parse_announce_response(&body)
    }
}

/// Appends the announce query to `base`. Binary fields are percent-encoded
/// byte by byte.
pub fn build_announce_url(
    base: &str,
    request: &AnnounceRequest,
    port: u16,
    numwant: Option<u32>,
    tracker_id: Option<&str>,
) -> String {
    let separator = if base.contains('?') { '&' } else { '?' };
    let mut url = format!(
        "{}{}info_hash={}&peer_id={}&port={}&uploaded={}&downloaded={}&left={}&compact=1",
        base,
        separator,
        url_encode(request.info_hash.as_bytes()),
        url_encode(request.peer_id.as_bytes()),
        port,
        request.uploaded,
        request.downloaded,
        request.left
    );

    let event = request.event.as_str();
    if !event.is_empty() {
        url.push_str("&event=");
        url.push_str(event);
    }
    if let Some(numwant) = numwant {
        url.push_str(&format!("&numwant={}", numwant));
    }
    if let Some(id) = tracker_id {
        url.push_str("&trackerid=");
        url.push_str(&url_encode(id.as_bytes()));
    }
    url
}

pub fn parse_announce_response(body: &[u8]) -> Result<AnnounceResponse, TrackerError> {
    let value = decode(body)?;
    if value.as_dict().is_none() {
        return Err(TrackerError::InvalidResponse("expected dict".into()));
    }

    if let Some(failure) = value.get(b"failure reason") {
        let reason = failure
            .as_bytes()
            .map(|b| String::from_utf8_lossy(b).into_owned())
            .unwrap_or_default();
        return Err(TrackerError::Failure(reason));
    }

    let interval = value
        .get(b"interval")
        .and_then(Value::as_integer)
        .and_then(|i| u64::try_from(i).ok())
        .ok_or_else(|| TrackerError::InvalidResponse("missing interval".into()))?;

    let mut response = AnnounceResponse::new(Duration::from_secs(interval));
    response.min_interval = value
        .get(b"min interval")
        .and_then(Value::as_integer)
        .and_then(|i| u64::try_from(i).ok())
        .map(Duration::from_secs);
    response.complete = int_field(&value, b"complete");
    response.incomplete = int_field(&value, b"incomplete");
    response.warning_message = value
        .get(b"warning message")
        .and_then(Value::as_str)
        .map(String::from);
    response.tracker_id = value
        .get(b"tracker id")
        .and_then(Value::as_str)
        .map(String::from);

    match value.get(b"peers") {
        Some(Value::Bytes(compact)) => response.peers = parse_compact_peers(compact),
        Some(Value::List(list)) => response.peers = list.iter().filter_map(dict_peer).collect(),
        Some(_) => return Err(TrackerError::InvalidResponse("malformed peers".into())),
        None => {}
    }

    if let Some(peers6) = value.get(b"peers6").and_then(Value::as_bytes) {
        response.peers.extend(parse_compact_peers6(peers6));
    }

    Ok(response)
}

fn int_field(value: &Value, key: &[u8]) -> Option<u32> {
    value
        .get(key)
        .and_then(Value::as_integer)
        .and_then(|i| u32::try_from(i).ok())
}

/// A non-compact peer entry: `{ip, port[, peer id]}`.
fn dict_peer(entry: &Value) -> Option<Peer> {
    let ip = entry.get(b"ip")?.as_str()?.parse().ok()?;
    let port = entry
        .get(b"port")?
        .as_integer()
        .and_then(|p| u16::try_from(p).ok())?;
    let peer_id = entry
        .get(b"peer id")
        .and_then(Value::as_bytes)
        .and_then(|id| <[u8; 20]>::try_from(&id[..]).ok());
    Some(Peer {
        addr: std::net::SocketAddr::new(ip, port),
        peer_id,
    })
}

fn url_encode(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|&b| {
            if b.is_ascii_alphanumeric() || b == b'-' || b == b'_' || b == b'.' || b == b'~' {
                format!("{}", b as char)
            } else {
                format!("%{:02X}", b)
            }
        })
        .collect()
}
