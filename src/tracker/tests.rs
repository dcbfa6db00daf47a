use std::collections::VecDeque;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use super::*;
use crate::config::TrackerConfig;
use crate::metainfo::InfoHash;
use crate::peer::PeerId;

fn request() -> AnnounceRequest {
    AnnounceRequest::new(InfoHash([0xab; 20]), PeerId([b'p'; 20]), 1000)
        .with_event(TrackerEvent::Started)
}

type Responder = dyn Fn(&[u8]) -> Option<Vec<u8>> + Send + Sync;

/// Answers each datagram through `responder`; `None` means never reply.
struct ScriptedSocket {
    sent: Mutex<Vec<Vec<u8>>>,
    replies: Mutex<VecDeque<Vec<u8>>>,
    responder: Box<Responder>,
}

impl ScriptedSocket {
    fn new(responder: impl Fn(&[u8]) -> Option<Vec<u8>> + Send + Sync + 'static) -> Arc<Self> {
        Arc::new(Self {
            sent: Mutex::new(Vec::new()),
            replies: Mutex::new(VecDeque::new()),
            responder: Box::new(responder),
        })
    }

    fn sent(&self) -> Vec<Vec<u8>> {
        self.sent.lock().clone()
    }
}

#[async_trait]
impl DatagramSocket for ScriptedSocket {
    async fn send(&self, buf: &[u8]) -> io::Result<usize> {
        self.sent.lock().push(buf.to_vec());
        if let Some(reply) = (self.responder)(buf) {
            self.replies.lock().push_back(reply);
        }
        Ok(buf.len())
    }

    async fn recv(&self, buf: &mut [u8]) -> io::Result<usize> {
        let reply = self.replies.lock().pop_front();
        match reply {
            Some(reply) => {
                buf[..reply.len()].copy_from_slice(&reply);
                Ok(reply.len())
            }
            None => std::future::pending().await,
        }
    }
}

fn transaction_id(datagram: &[u8]) -> [u8; 4] {
    [datagram[12], datagram[13], datagram[14], datagram[15]]
}

fn connect_reply(datagram: &[u8], connection_id: u64) -> Vec<u8> {
    let mut reply = vec![0, 0, 0, 0];
    reply.extend_from_slice(&transaction_id(datagram));
    reply.extend_from_slice(&connection_id.to_be_bytes());
    reply
}

fn announce_reply(datagram: &[u8], peers: &[[u8; 6]]) -> Vec<u8> {
    let mut reply = vec![0, 0, 0, 1];
    reply.extend_from_slice(&transaction_id(datagram));
    reply.extend_from_slice(&1800u32.to_be_bytes());
    reply.extend_from_slice(&3u32.to_be_bytes());
    reply.extend_from_slice(&7u32.to_be_bytes());
    for peer in peers {
        reply.extend_from_slice(peer);
    }
    reply
}

/// A well-behaved tracker handing out connection id 0x1122334455667788.
fn well_behaved(datagram: &[u8]) -> Option<Vec<u8>> {
    match datagram[11] {
        0 => Some(connect_reply(datagram, 0x1122_3344_5566_7788)),
        1 => Some(announce_reply(datagram, &[[1, 2, 3, 4, 0x1a, 0xe1]])),
        _ => None,
    }
}

#[test]
fn test_tracker_event() {
    assert_eq!(TrackerEvent::Started.as_str(), "started");
    assert_eq!(TrackerEvent::None.as_str(), "");
    assert_eq!(TrackerEvent::None.as_udp_id(), 0);
    assert_eq!(TrackerEvent::Completed.as_udp_id(), 1);
    assert_eq!(TrackerEvent::Started.as_udp_id(), 2);
    assert_eq!(TrackerEvent::Stopped.as_udp_id(), 3);
}

#[test]
fn test_state_transitions() {
    use TrackerState::*;
    assert!(Idle.can_transition(Connecting));
    assert!(Idle.can_transition(Announcing));
    assert!(Connecting.can_transition(Announcing));
    assert!(Announcing.can_transition(Error));
    assert!(Error.can_transition(Connecting));
    assert!(!Idle.can_transition(Error));
    assert!(!Announcing.can_transition(Connecting));
    assert!(Announcing.is_busy());
    assert!(!Error.is_busy());
}

#[test]
fn test_connect_request_layout() {
    let req = encode_connect_request(0xdead_beef);
    assert_eq!(req.len(), 16);
    assert_eq!(&req[0..8], &0x41727101980u64.to_be_bytes());
    assert_eq!(&req[8..12], &[0, 0, 0, 0]);
    assert_eq!(&req[12..16], &[0xde, 0xad, 0xbe, 0xef]);
}

#[test]
fn test_announce_request_layout() {
    let options = UdpAnnounceOptions {
        key: 42,
        numwant: None,
        port: 6881,
    };
    let mut req = request();
    req.downloaded = 5;
    req.uploaded = 9;
    let datagram = encode_announce_request(0x0102_0304_0506_0708, 77, &req, &options);

    assert_eq!(datagram.len(), 98);
    assert_eq!(&datagram[0..8], &[1, 2, 3, 4, 5, 6, 7, 8]);
    assert_eq!(&datagram[8..12], &1u32.to_be_bytes());
    assert_eq!(&datagram[12..16], &77u32.to_be_bytes());
    assert_eq!(&datagram[16..36], &[0xab; 20]);
    assert_eq!(&datagram[36..56], &[b'p'; 20]);
    assert_eq!(&datagram[56..64], &5u64.to_be_bytes());
    assert_eq!(&datagram[64..72], &1000u64.to_be_bytes());
    assert_eq!(&datagram[72..80], &9u64.to_be_bytes());
    assert_eq!(&datagram[80..84], &2u32.to_be_bytes());
    assert_eq!(&datagram[84..88], &[0, 0, 0, 0]);
    assert_eq!(&datagram[88..92], &42u32.to_be_bytes());
    assert_eq!(&datagram[92..96], &(-1i32).to_be_bytes());
    assert_eq!(&datagram[96..98], &6881u16.to_be_bytes());
}

#[test]
fn test_decode_connect_response() {
    let reply = connect_reply(&encode_connect_request(5), 0xc1c2);
    assert_eq!(decode_connect_response(&reply, 5).unwrap(), 0xc1c2);
}

#[test]
fn test_decode_26_byte_announce_response() {
    let datagram = encode_announce_request(
        0xc1c2,
        9,
        &request(),
        &UdpAnnounceOptions {
            key: 0,
            numwant: None,
            port: 6881,
        },
    );
    let reply = announce_reply(&datagram, &[[1, 2, 3, 4, 0x1a, 0xe1]]);
    assert_eq!(reply.len(), 26);

    let response = decode_announce_response(&reply, 9).unwrap();
    assert_eq!(response.peers.len(), 1);
    assert_eq!(
        response.peers[0].addr,
        "1.2.3.4:6881".parse::<SocketAddr>().unwrap()
    );
    assert_eq!(response.interval, Duration::from_secs(1800));
    assert_eq!(response.incomplete, Some(3));
    assert_eq!(response.complete, Some(7));
}

#[test]
fn test_decode_transaction_mismatch() {
    let reply = connect_reply(&encode_connect_request(5), 1);
    assert!(matches!(
        decode_connect_response(&reply, 6),
        Err(TrackerError::TransactionMismatch { sent: 6, received: 5 })
    ));
}

#[test]
fn test_decode_error_action() {
    let mut reply = vec![0, 0, 0, 3, 0, 0, 0, 8];
    reply.extend_from_slice(b"torrent not registered");
    match decode_announce_response(&reply, 8) {
        Err(TrackerError::Failure(msg)) => assert_eq!(msg, "torrent not registered"),
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_decode_short_announce_response() {
    let reply = vec![0, 0, 0, 1, 0, 0, 0, 8, 0, 0];
    assert!(matches!(
        decode_announce_response(&reply, 8),
        Err(TrackerError::InvalidResponse(_))
    ));
}

#[test]
fn test_parse_udp_url() {
    assert_eq!(
        parse_udp_url("udp://tracker.example.org:6969/announce").unwrap(),
        "tracker.example.org:6969"
    );
    assert!(parse_udp_url("udp://tracker.example.org/announce").is_err());
    assert!(parse_udp_url("http://tracker.example.org:80").is_err());
}

#[test]
fn test_build_announce_url() {
    let url = build_announce_url(
        "http://t.example/announce",
        &request(),
        6881,
        Some(50),
        Some("abc 1"),
    );
    assert!(url.starts_with("http://t.example/announce?info_hash=%AB%AB"));
    assert!(url.contains("&peer_id=pppppppppppppppppppp"));
    assert!(url.contains("&port=6881&uploaded=0&downloaded=0&left=1000&compact=1"));
    assert!(url.contains("&event=started"));
    assert!(url.contains("&numwant=50"));
    assert!(url.ends_with("&trackerid=abc%201"));

    let url = build_announce_url("http://t.example/a?passkey=x", &request(), 1, None, None);
    assert!(url.starts_with("http://t.example/a?passkey=x&info_hash="));
}

#[test]
fn test_parse_compact_http_response() {
    let mut body = b"d8:completei2e10:incompletei4e8:intervali1800e12:min intervali60e5:peers12:".to_vec();
    body.extend_from_slice(&[1, 2, 3, 4, 0x1a, 0xe1, 5, 6, 7, 8, 0xc8, 0xd5]);
    body.extend_from_slice(b"10:tracker id3:xyze");

    let response = parse_announce_response(&body).unwrap();
    assert_eq!(response.interval, Duration::from_secs(1800));
    assert_eq!(response.min_interval, Some(Duration::from_secs(60)));
    assert_eq!(response.complete, Some(2));
    assert_eq!(response.incomplete, Some(4));
    assert_eq!(response.peers.len(), 2);
    assert_eq!(response.peers[1].addr, "5.6.7.8:51413".parse().unwrap());
    assert_eq!(response.tracker_id.as_deref(), Some("xyz"));
}

#[test]
fn test_parse_dict_peers_http_response() {
    let body = b"d8:intervali900e5:peersld2:ip7:1.2.3.47:peer id20:aaaaaaaaaaaaaaaaaaaa4:porti6881eed2:ip3:::14:porti80eeee";
    let response = parse_announce_response(body).unwrap();
    assert_eq!(response.peers.len(), 2);
    assert_eq!(response.peers[0].addr, "1.2.3.4:6881".parse().unwrap());
    assert_eq!(response.peers[0].peer_id, Some([b'a'; 20]));
    assert_eq!(response.peers[1].addr, "[::1]:80".parse().unwrap());
}

#[test]
fn test_parse_peers6() {
    let mut body = b"d8:intervali900e5:peers0:6:peers618:".to_vec();
    let mut v6 = [0u8; 18];
    v6[15] = 1;
    v6[16..].copy_from_slice(&6881u16.to_be_bytes());
    body.extend_from_slice(&v6);
    body.push(b'e');
    let response = parse_announce_response(&body).unwrap();
    assert_eq!(response.peers.len(), 1);
    assert_eq!(response.peers[0].addr, "[::1]:6881".parse().unwrap());
}

#[test]
fn test_parse_failure_reason() {
    let body = b"d14:failure reason12:unregisterede";
    assert!(matches!(
        parse_announce_response(body),
        Err(TrackerError::Failure(reason)) if reason == "unregistered"
    ));
}

#[test]
fn test_parse_garbage_body() {
    assert!(matches!(
        parse_announce_response(b"<html>"),
        Err(TrackerError::Bencode(_))
    ));
}

#[test]
fn test_from_url_dispatch() {
    let config = TrackerConfig::default();
    assert!(Tracker::from_url("http://t.example/announce", config.clone()).is_ok());
    assert!(Tracker::from_url("udp://t.example:6969", config.clone()).is_ok());
    assert!(matches!(
        Tracker::from_url("wss://t.example", config.clone()),
        Err(TrackerError::UnsupportedProtocol(s)) if s == "wss"
    ));
    assert!(matches!(
        Tracker::from_url("t.example", config),
        Err(TrackerError::InvalidUrl(_))
    ));
}

#[tokio::test]
async fn test_udp_announce_reuses_connection_id() {
    let socket = ScriptedSocket::new(well_behaved);
    let tracker =
        Tracker::with_udp_socket("udp://t.example:6969", socket.clone(), TrackerConfig::default())
            .unwrap();

    let response = tracker.announce(&request()).await.unwrap().unwrap();
    assert_eq!(response.peers[0].addr, "1.2.3.4:6881".parse().unwrap());
    assert_eq!(tracker.state(), TrackerState::Idle);

    tracker.announce(&request()).await.unwrap().unwrap();
    let sent = socket.sent();
    // connect, announce, announce
    assert_eq!(sent.len(), 3);
    assert_eq!(sent[0].len(), 16);
    assert_eq!(&sent[2][0..8], &0x1122_3344_5566_7788u64.to_be_bytes());

    let status = tracker.status();
    assert_eq!(status.interval, Some(Duration::from_secs(1800)));
    assert_eq!(status.last_peer_count, 1);
    assert_eq!(status.error_count, 0);
}

#[tokio::test(start_paused = true)]
async fn test_udp_connection_id_expires() {
    let socket = ScriptedSocket::new(well_behaved);
    let tracker =
        Tracker::with_udp_socket("udp://t.example:6969", socket.clone(), TrackerConfig::default())
            .unwrap();

    tracker.announce(&request()).await.unwrap();
    tokio::time::advance(Duration::from_secs(61)).await;
    tracker.announce(&request()).await.unwrap();

    let connects = socket.sent().iter().filter(|d| d.len() == 16).count();
    assert_eq!(connects, 2);
}

#[tokio::test]
async fn test_udp_transaction_mismatch_is_error() {
    let socket = ScriptedSocket::new(|datagram| {
        let mut reply = connect_reply(datagram, 1);
        reply[7] ^= 0xff;
        Some(reply)
    });
    let tracker =
        Tracker::with_udp_socket("udp://t.example:6969", socket, TrackerConfig::default()).unwrap();

    assert!(matches!(
        tracker.announce(&request()).await,
        Err(TrackerError::TransactionMismatch { .. })
    ));
    let status = tracker.status();
    assert_eq!(status.state, TrackerState::Error);
    assert_eq!(status.error_count, 1);
    assert_eq!(status.timeout_count, 0);
    assert!(status.last_error.is_some());
}

#[tokio::test(start_paused = true)]
async fn test_udp_timeout_counts() {
    let socket = ScriptedSocket::new(|_| None);
    let tracker =
        Tracker::with_udp_socket("udp://t.example:6969", socket.clone(), TrackerConfig::default())
            .unwrap();

    let result = tracker.announce(&request()).await;
    assert!(matches!(result, Err(TrackerError::Timeout)));

    // No retry of its own: exactly one datagram went out.
    assert_eq!(socket.sent().len(), 1);
    let status = tracker.status();
    assert_eq!(status.timeout_count, 1);
    assert_eq!(status.error_count, 1);
    assert_eq!(status.state, TrackerState::Error);

    // A later announce starts over from the connect step.
    let _ = tracker.announce(&request()).await;
    assert_eq!(tracker.status().timeout_count, 2);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_announce_is_noop() {
    let socket = ScriptedSocket::new(|_| None);
    let tracker = Arc::new(
        Tracker::with_udp_socket("udp://t.example:6969", socket.clone(), TrackerConfig::default())
            .unwrap(),
    );

    let first = tokio::spawn({
        let tracker = tracker.clone();
        async move { tracker.announce(&request()).await }
    });
    tokio::task::yield_now().await;
    while !tracker.state().is_busy() {
        tokio::task::yield_now().await;
    }

    assert!(tracker.announce(&request()).await.unwrap().is_none());
    assert!(first.await.unwrap().is_err());
    assert_eq!(socket.sent().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_dropped_announce_frees_tracker() {
    let socket = ScriptedSocket::new(|_| None);
    let tracker =
        Tracker::with_udp_socket("udp://t.example:6969", socket.clone(), TrackerConfig::default())
            .unwrap();

    let cut_short = tokio::time::timeout(Duration::from_secs(1), tracker.announce(&request())).await;
    assert!(cut_short.is_err());

    let status = tracker.status();
    assert_eq!(status.state, TrackerState::Error);
    assert_eq!(status.error_count, 1);
    assert_eq!(status.timeout_count, 0);
    assert_eq!(
        status.last_error.as_deref(),
        Some("announce abandoned before completion")
    );

    // The next announce goes back out on the wire, starting with a connect.
    tokio::time::advance(Duration::from_secs(3600)).await;
    let result = tracker.announce(&request()).await;
    assert!(matches!(result, Err(TrackerError::Timeout)));
    let sent = socket.sent();
    assert_eq!(sent.len(), 2);
    assert!(sent.iter().all(|d| d.len() == 16));
}

#[tokio::test]
async fn test_http_announce() {
    let server = MockServer::start().await;
    let mut body = b"d8:intervali1800e5:peers6:".to_vec();
    body.extend_from_slice(&[1, 2, 3, 4, 0x1a, 0xe1]);
    body.extend_from_slice(b"10:tracker id2:t1e");

    Mock::given(method("GET"))
        .and(path("/announce"))
        .and(query_param("compact", "1"))
        .and(query_param("event", "started"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body))
        .mount(&server)
        .await;

    let tracker = Tracker::from_url(
        &format!("{}/announce", server.uri()),
        TrackerConfig::default(),
    )
    .unwrap();
    let response = tracker.announce(&request()).await.unwrap().unwrap();
    assert_eq!(response.peers.len(), 1);
    assert_eq!(response.tracker_id.as_deref(), Some("t1"));
    assert_eq!(tracker.state(), TrackerState::Idle);
}

#[tokio::test]
async fn test_http_echoes_tracker_id() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/announce"))
        .and(query_param("trackerid", "t1"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"d8:intervali60e5:peers0:e".to_vec()))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/announce"))
        .respond_with(
            ResponseTemplate::new(200).set_body_bytes(b"d8:intervali60e5:peers0:10:tracker id2:t1e".to_vec()),
        )
        .mount(&server)
        .await;

    let tracker = Tracker::from_url(
        &format!("{}/announce", server.uri()),
        TrackerConfig::default(),
    )
    .unwrap();
    let first = tracker.announce(&request()).await.unwrap().unwrap();
    assert_eq!(first.tracker_id.as_deref(), Some("t1"));
    let second = tracker.announce(&request()).await.unwrap().unwrap();
    assert_eq!(second.tracker_id, None);
}

#[tokio::test]
async fn test_http_non_200_is_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let tracker = Tracker::from_url(
        &format!("{}/announce", server.uri()),
        TrackerConfig::default(),
    )
    .unwrap();
    assert!(matches!(
        tracker.announce(&request()).await,
        Err(TrackerError::HttpStatus(503))
    ));
    assert_eq!(tracker.status().error_count, 1);
}

#[tokio::test]
async fn test_http_failure_reason_is_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200).set_body_bytes(b"d14:failure reason7:go awaye".to_vec()),
        )
        .mount(&server)
        .await;

    let tracker = Tracker::from_url(
        &format!("{}/announce", server.uri()),
        TrackerConfig::default(),
    )
    .unwrap();
    let err = tracker.announce(&request()).await.unwrap_err();
    assert!(matches!(err, TrackerError::Failure(ref r) if r == "go away"));
    assert_eq!(tracker.status().last_error.as_deref(), Some("tracker returned error: go away"));
}
