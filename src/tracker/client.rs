use std::sync::Arc;

use parking_lot::Mutex;
use rand::Rng as _;
use tokio::time::{timeout, Instant};
use tracing::{debug, warn};

use super::error::TrackerError;
use super::http::HttpTransport;
use super::response::{AnnounceRequest, AnnounceResponse};
use super::state::{TrackerState, TrackerStatus};
use super::udp::{DatagramSocket, UdpAnnounceOptions, UdpTransport};
use crate::config::TrackerConfig;

enum Transport {
    Http(HttpTransport),
    Udp(UdpTransport),
}

#[derive(Default)]
struct Inner {
    state: TrackerState,
    error_count: u32,
    timeout_count: u32,
    last_error: Option<String>,
    last_response: Option<AnnounceResponse>,
    connection_id: Option<(u64, Instant)>,
    tracker_id: Option<String>,
}

impl Inner {
    fn transition(&mut self, to: TrackerState) {
        debug_assert!(
            self.state.can_transition(to),
            "illegal tracker transition {} -> {}",
            self.state,
            to
        );
        self.state = to;
    }
}

/// One tracker URL of one torrent.
///
/// `announce` never retries on its own; callers read [`Tracker::status`]
/// and decide when to try again.
pub struct Tracker {
    url: String,
    transport: Transport,
    config: TrackerConfig,
    key: u32,
    inner: Mutex<Inner>,
}

/// Moves the tracker out of its busy state if an announce future is dropped
/// before the exchange settles.
struct InFlight<'a> {
    tracker: &'a Tracker,
    settled: bool,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        let mut inner = self.tracker.inner.lock();
        inner.transition(TrackerState::Error);
        inner.error_count += 1;
        inner.connection_id = None;
        inner.last_error = Some(TrackerError::Abandoned.to_string());
        warn!(tracker = %self.tracker.url, "announce dropped before it finished");
    }
}

impl Tracker {
    /// Picks the transport from the URL scheme.
    pub fn from_url(url: &str, config: TrackerConfig) -> Result<Self, TrackerError> {
        let transport = match url.split_once("://").map(|(scheme, _)| scheme) {
            Some("http") | Some("https") => Transport::Http(HttpTransport::new(url, &config)?),
            Some("udp") => Transport::Udp(UdpTransport::new(url)?),
            Some(scheme) => return Err(TrackerError::UnsupportedProtocol(scheme.to_string())),
            None => return Err(TrackerError::InvalidUrl(url.to_string())),
        };
        Ok(Self::with_transport(url, transport, config))
    }

    /// A UDP tracker speaking over the given socket.
    pub fn with_udp_socket(
        url: &str,
        socket: Arc<dyn DatagramSocket>,
        config: TrackerConfig,
    ) -> Result<Self, TrackerError> {
        let transport = Transport::Udp(UdpTransport::with_socket(url, socket)?);
        Ok(Self::with_transport(url, transport, config))
    }

    fn with_transport(url: &str, transport: Transport, config: TrackerConfig) -> Self {
        Self {
            url: url.to_string(),
            transport,
            config,
            key: rand::rng().random(),
            inner: Mutex::new(Inner::default()),
        }
    }

    /// The announce URL this tracker was built from.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Current position in the announce state machine.
    pub fn state(&self) -> TrackerState {
        self.inner.lock().state
    }

    /// Snapshot of counters and the last response, for caller-driven backoff.
    pub fn status(&self) -> TrackerStatus {
        let inner = self.inner.lock();
        TrackerStatus {
            url: self.url.clone(),
            state: inner.state,
            error_count: inner.error_count,
            timeout_count: inner.timeout_count,
            last_error: inner.last_error.clone(),
            interval: inner.last_response.as_ref().map(|r| r.interval),
            min_interval: inner.last_response.as_ref().and_then(|r| r.min_interval),
            last_peer_count: inner.last_response.as_ref().map_or(0, |r| r.peers.len()),
        }
    }

    /// Announces to the tracker.
    ///
    /// Returns `Ok(None)` without touching the network when an announce is
    /// already in flight. Failures move the tracker to `Error` and are
    /// counted; the whole exchange is bounded by the announce timeout.
    /// Dropping the returned future part way counts as a failure too.
    pub async fn announce(
        &self,
        request: &AnnounceRequest,
    ) -> Result<Option<AnnounceResponse>, TrackerError> {
        let needs_connect = {
            let mut inner = self.inner.lock();
            if inner.state.is_busy() {
                debug!(tracker = %self.url, "announce already in flight");
                return Ok(None);
            }
            let needs_connect = match &self.transport {
                Transport::Udp(_) => !matches!(
                    inner.connection_id,
                    Some((_, at)) if at.elapsed() < self.config.connection_id_ttl
                ),
                Transport::Http(_) => false,
            };
            inner.transition(if needs_connect {
                TrackerState::Connecting
            } else {
                TrackerState::Announcing
            });
            needs_connect
        };
        let mut guard = InFlight {
            tracker: self,
            settled: false,
        };

        let outcome = timeout(
            self.config.announce_timeout,
            self.exchange(request, needs_connect),
        )
        .await
        .unwrap_or(Err(TrackerError::Timeout));

        guard.settled = true;
        let mut inner = self.inner.lock();
        match outcome {
            Ok(response) => {
                inner.transition(TrackerState::Idle);
                inner.last_error = None;
                if let Some(id) = &response.tracker_id {
                    inner.tracker_id = Some(id.clone());
                }
                if let Some(warning) = &response.warning_message {
                    warn!(tracker = %self.url, %warning, "tracker warning");
                }
                debug!(
                    tracker = %self.url,
                    peers = response.peers.len(),
                    interval = ?response.interval,
                    "announce succeeded"
                );
                inner.last_response = Some(response.clone());
                Ok(Some(response))
            }
            Err(e) => {
                inner.transition(TrackerState::Error);
                inner.error_count += 1;
                if e.is_timeout() {
                    inner.timeout_count += 1;
                }
                // a failed exchange may mean the tracker forgot our connection
                inner.connection_id = None;
                inner.last_error = Some(e.to_string());
                warn!(tracker = %self.url, error = %e, errors = inner.error_count, "announce failed");
                Err(e)
            }
        }
    }

    async fn exchange(
        &self,
        request: &AnnounceRequest,
        needs_connect: bool,
    ) -> Result<AnnounceResponse, TrackerError> {
        match &self.transport {
            Transport::Http(http) => {
                let tracker_id = self.inner.lock().tracker_id.clone();
                http.announce(
                    request,
                    self.config.port,
                    self.config.numwant,
                    tracker_id.as_deref(),
                )
                .await
            }
            Transport::Udp(udp) => {
                let connection_id = if needs_connect {
                    let id = udp.connect().await?;
                    let mut inner = self.inner.lock();
                    inner.connection_id = Some((id, Instant::now()));
                    inner.transition(TrackerState::Announcing);
                    id
                } else {
                    self.inner
                        .lock()
                        .connection_id
                        .map(|(id, _)| id)
                        .ok_or_else(|| TrackerError::InvalidResponse("no connection id".into()))?
                };
                let options = UdpAnnounceOptions {
                    key: self.key,
                    numwant: self.config.numwant,
                    port: self.config.port,
                };
                udp.announce(connection_id, request, &options).await
            }
        }
    }
}
