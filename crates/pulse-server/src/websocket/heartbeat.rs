//! Connection liveness via periodic ping/pong.
//!
//! The write loop pings on an interval; the read loop stamps each pong.
//! A connection whose last pong is older than the timeout is assumed to
//! have gone silent without a clean close and is torn down. Well-behaved
//! clients never notice.

use std::time::Duration;

/// Ping cadence and staleness threshold.
#[derive(Clone, Copy, Debug)]
pub struct HeartbeatConfig {
    /// How often the server pings each connection.
    pub interval: Duration,
    /// How long since the last pong before a connection counts as dead.
    pub timeout: Duration,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
            timeout: Duration::from_secs(90),
        }
    }
}

impl HeartbeatConfig {
    /// Whether a connection with the given pong age should be dropped.
    #[must_use]
    pub fn is_stale(&self, pong_age: Duration) -> bool {
        pong_age > self.timeout
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
