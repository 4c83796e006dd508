//! Hub configuration.

use pulse_core::retry::ReconnectPolicy;

use crate::websocket::heartbeat::HeartbeatConfig;

/// Default capacity of the process-wide update bus.
pub const DEFAULT_BUS_CAPACITY: usize = 4_096;
/// Default depth of each connection's outbound send queue.
pub const DEFAULT_SEND_QUEUE_DEPTH: usize = 256;

/// Configuration for the hub server.
///
/// Constructed by the binary from CLI arguments and environment; the
/// token secret is environment-only so it never shows up in process
/// listings.
#[derive(Clone)]
pub struct HubConfig {
    /// Host to bind.
    pub host: String,
    /// Port to bind (0 for auto-assign).
    pub port: u16,
    /// Shared secret for verifying bearer credentials.
    pub token_secret: String,
    /// WebSocket URL of the external broadcast channel, if any. When
    /// absent the hub runs bus-only and embedded producers publish
    /// directly.
    pub upstream_url: Option<String>,
    /// Reconnect policy for the upstream subscriber.
    pub upstream_reconnect: ReconnectPolicy,
    /// Capacity of the update bus.
    pub bus_capacity: usize,
    /// Depth of each connection's outbound queue. A full queue drops the
    /// newest event for that connection instead of blocking fan-out.
    pub send_queue_depth: usize,
    /// Ping interval and pong timeout for connection liveness.
    pub heartbeat: HeartbeatConfig,
}

impl HubConfig {
    /// Config with defaults for everything but the secret.
    #[must_use]
    pub fn new(token_secret: impl Into<String>) -> Self {
        Self {
            host: "0.0.0.0".to_owned(),
            port: 8765,
            token_secret: token_secret.into(),
            upstream_url: None,
            upstream_reconnect: ReconnectPolicy::unbounded(),
            bus_capacity: DEFAULT_BUS_CAPACITY,
            send_queue_depth: DEFAULT_SEND_QUEUE_DEPTH,
            heartbeat: HeartbeatConfig::default(),
        }
    }
}

impl std::fmt::Debug for HubConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HubConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("token_secret", &"<redacted>")
            .field("upstream_url", &self.upstream_url)
            .field("bus_capacity", &self.bus_capacity)
            .field("send_queue_depth", &self.send_queue_depth)
            .field("heartbeat", &self.heartbeat)
            .finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = HubConfig::new("s3cret");
        assert_eq!(config.port, 8765);
        assert_eq!(config.bus_capacity, DEFAULT_BUS_CAPACITY);
        assert_eq!(config.send_queue_depth, DEFAULT_SEND_QUEUE_DEPTH);
        assert!(config.upstream_url.is_none());
        assert_eq!(config.upstream_reconnect.max_attempts, 0);
    }

    #[test]
    fn debug_redacts_secret() {
        let config = HubConfig::new("s3cret");
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("s3cret"));
        assert!(rendered.contains("<redacted>"));
    }
}
