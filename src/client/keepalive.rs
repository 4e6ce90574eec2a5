// ABOUTME: enquire_link keep-alive bookkeeping for a bound SMPP session
// ABOUTME: Decides when to probe the link and when repeated failures mean it is dead

use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Keep-alive timing for a session.
///
/// The SMSC may silently drop an idle bind, so an enquire_link is sent every
/// `interval`. A probe that is not answered within `timeout` counts as a
/// failure; `max_failures` consecutive failures declare the link dead and
/// hand it to the rebind supervisor.
///
/// ```rust
/// use smpp_gateway::client::KeepAliveConfig;
/// use std::time::Duration;
///
/// let config = KeepAliveConfig::new(Duration::from_secs(5))
///     .with_timeout(Duration::from_secs(10))
///     .with_max_failures(2);
/// assert!(config.enabled);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeepAliveConfig {
    /// Time between enquire_link PDUs (default: 5 seconds)
    pub interval: Duration,

    /// How long to wait for enquire_link_resp (default: 10 seconds)
    pub timeout: Duration,

    /// Consecutive failures before the link is declared dead (default: 3)
    pub max_failures: u32,

    /// When false the session never probes on its own
    pub enabled: bool,
}

impl Default for KeepAliveConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            timeout: Duration::from_secs(10),
            max_failures: 3,
            enabled: true,
        }
    }
}

impl KeepAliveConfig {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            ..Default::default()
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_failures(mut self, max_failures: u32) -> Self {
        self.max_failures = max_failures;
        self
    }

    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Default::default()
        }
    }
}

/// Snapshot of keep-alive health, for logging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeepAliveStatus {
    pub running: bool,
    pub consecutive_failures: u32,
    pub total_pings: u32,
    pub total_pongs: u32,
}

/// Tracks when the next enquire_link is due and how many in a row failed.
///
/// The session's keep-alive task drives it:
/// 1. `should_ping()` says whether a probe is due
/// 2. `on_ping_sent()` records the send
/// 3. `on_ping_success()` / `on_ping_failure()` record the outcome
/// 4. `is_connection_failed()` says when to give up on the link
///
/// Any other successful exchange also proves the link, so the session calls
/// `on_activity()` when a response arrives, which postpones the next probe.
#[derive(Debug)]
pub struct KeepAliveManager {
    config: KeepAliveConfig,
    last_activity: Option<Instant>,
    consecutive_failures: u32,
    total_pings: u32,
    total_pongs: u32,
}

impl KeepAliveManager {
    pub fn new(config: KeepAliveConfig) -> Self {
        Self {
            config,
            last_activity: None,
            consecutive_failures: 0,
            total_pings: 0,
            total_pongs: 0,
        }
    }

    pub fn should_ping(&self) -> bool {
        self.should_ping_at(Instant::now())
    }

    /// Whether a probe is due at `now`.
    pub fn should_ping_at(&self, now: Instant) -> bool {
        if !self.config.enabled || self.is_connection_failed() {
            return false;
        }

        match self.last_activity {
            None => true,
            Some(last) => now.saturating_duration_since(last) >= self.config.interval,
        }
    }

    pub fn on_ping_sent(&mut self) {
        self.on_ping_sent_at(Instant::now());
    }

    pub fn on_ping_sent_at(&mut self, now: Instant) {
        self.last_activity = Some(now);
        self.total_pings += 1;
        debug!("enquire_link sent (total: {})", self.total_pings);
    }

    pub fn on_ping_success(&mut self) {
        self.consecutive_failures = 0;
        self.total_pongs += 1;
        debug!("enquire_link answered (total: {})", self.total_pongs);
    }

    pub fn on_ping_failure(&mut self) {
        self.consecutive_failures += 1;
        warn!(
            "enquire_link failed ({} of {} allowed)",
            self.consecutive_failures, self.config.max_failures
        );
    }

    /// Records traffic that proves the link is alive.
    pub fn on_activity(&mut self) {
        self.on_activity_at(Instant::now());
    }

    pub fn on_activity_at(&mut self, now: Instant) {
        self.last_activity = Some(now);
        if self.consecutive_failures > 0 {
            debug!("Resetting {} consecutive failures", self.consecutive_failures);
            self.consecutive_failures = 0;
        }
    }

    pub fn is_connection_failed(&self) -> bool {
        self.consecutive_failures >= self.config.max_failures
    }

    pub fn status(&self) -> KeepAliveStatus {
        KeepAliveStatus {
            running: self.config.enabled,
            consecutive_failures: self.consecutive_failures,
            total_pings: self.total_pings,
            total_pongs: self.total_pongs,
        }
    }

    pub fn interval(&self) -> Duration {
        self.config.interval
    }

    pub fn timeout(&self) -> Duration {
        self.config.timeout
    }
}
