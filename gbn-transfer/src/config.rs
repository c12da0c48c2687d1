//! Engine tunables.
//!
//! One [`EngineConfig`] is handed to every session.  The defaults are a
//! window of 16, a five-second retransmission timer and unbounded data-phase
//! retries; the binary exposes every field as a flag.

use std::time::Duration;

/// Default Go-Back-N window, in segments.
pub const DEFAULT_WINDOW: u32 = 16;

/// Default retransmission timeout.
pub const DEFAULT_RTO: Duration = Duration::from_secs(5);

/// Default number of SYN / SYN+ACK / FIN retransmissions before giving up.
pub const DEFAULT_CONTROL_RETRIES: u32 = 6;

/// Adjustable protocol parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Maximum number of unacknowledged segments in flight.
    pub window_size: u32,
    /// Retransmission timer duration.
    pub rto: Duration,
    /// Consecutive data-phase timeouts without any acknowledged progress
    /// before the Source gives up.  `None` retries forever.
    pub max_data_retries: Option<u32>,
    /// Retransmissions of a handshake or teardown segment before failing.
    pub max_control_retries: u32,
    /// How long the Sink waits for any valid segment before declaring the
    /// peer gone.  `None` waits forever.
    pub idle_timeout: Option<Duration>,
    /// How long a Responder waits for the first SYN.  `None` listens forever.
    pub accept_timeout: Option<Duration>,
    /// Pin the initial sequence number instead of drawing it from the OS
    /// random source.  Only useful for testing wraparound.
    pub initial_seq: Option<u32>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            window_size: DEFAULT_WINDOW,
            rto: DEFAULT_RTO,
            max_data_retries: None,
            max_control_retries: DEFAULT_CONTROL_RETRIES,
            idle_timeout: Some(Duration::from_secs(60)),
            accept_timeout: None,
            initial_seq: None,
        }
    }
}

impl EngineConfig {
    pub fn with_window_size(mut self, window_size: u32) -> Self {
        assert!(window_size >= 1, "window_size must be at least 1");
        self.window_size = window_size;
        self
    }

    pub fn with_rto(mut self, rto: Duration) -> Self {
        self.rto = rto;
        self
    }

    pub fn with_max_data_retries(mut self, retries: Option<u32>) -> Self {
        self.max_data_retries = retries;
        self
    }

    pub fn with_max_control_retries(mut self, retries: u32) -> Self {
        self.max_control_retries = retries;
        self
    }

    pub fn with_idle_timeout(mut self, idle: Option<Duration>) -> Self {
        self.idle_timeout = idle;
        self
    }

    pub fn with_accept_timeout(mut self, accept: Option<Duration>) -> Self {
        self.accept_timeout = accept;
        self
    }

    pub fn with_initial_seq(mut self, isn: Option<u32>) -> Self {
        self.initial_seq = isn;
        self
    }
}
