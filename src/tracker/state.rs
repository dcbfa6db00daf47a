use std::fmt;
use std::time::Duration;

/// Where a tracker is in its announce cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrackerState {
    /// Ready to announce.
    #[default]
    Idle,
    /// Obtaining a UDP connection id.
    Connecting,
    Announcing,
    /// The last announce failed; the next one may be tried at any time.
    Error,
}

impl TrackerState {
    /// The announce cycle's allowed moves.
    pub fn can_transition(self, to: TrackerState) -> bool {
        use TrackerState::*;
        matches!(
            (self, to),
            (Idle | Error, Connecting)
                | (Idle | Error, Announcing)
                | (Connecting, Announcing)
                | (Connecting | Announcing, Error)
                | (Announcing, Idle)
                | (Error, Idle)
        )
    }

    /// An announce is in flight.
    pub fn is_busy(self) -> bool {
        matches!(self, TrackerState::Connecting | TrackerState::Announcing)
    }
}

impl fmt::Display for TrackerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TrackerState::Idle => "idle",
            TrackerState::Connecting => "connecting",
            TrackerState::Announcing => "announcing",
            TrackerState::Error => "error",
        };
        f.write_str(s)
    }
}

/// Point-in-time view of a tracker for backoff decisions and display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackerStatus {
    pub url: String,
    pub state: TrackerState,
    pub error_count: u32,
    pub timeout_count: u32,
    pub last_error: Option<String>,
    /// Interval from the last successful announce.
    pub interval: Option<Duration>,
    pub min_interval: Option<Duration>,
    pub last_peer_count: usize,
}
