//! Subscriber for the external broadcast channel.
//!
//! A dedicated task owns the hub's single connection to the well-known
//! update channel and forwards every text frame onto the process-wide
//! [`UpdateBus`]. Channel connectivity is infra, not correctness: the
//! subscriber reconnects forever with doubling, capped backoff, and while
//! it is down the hub keeps authenticating and accepting subscriptions;
//! events simply do not arrive.

use futures::StreamExt;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, error, info, warn};

use pulse_core::retry::ReconnectPolicy;

use crate::websocket::bridge::UpdateBus;

/// Long-lived subscriber task for the external update channel.
pub struct UpstreamSubscriber {
    url: String,
    bus: UpdateBus,
    policy: ReconnectPolicy,
}

impl UpstreamSubscriber {
    /// Create a subscriber for the given channel endpoint.
    #[must_use]
    pub fn new(url: impl Into<String>, bus: UpdateBus, policy: ReconnectPolicy) -> Self {
        Self {
            url: url.into(),
            bus,
            policy,
        }
    }

    /// Connect, pump, reconnect, until the policy is exhausted (never,
    /// with the default unbounded policy).
    pub async fn run(self) {
        let mut failures: u32 = 0;
        loop {
            match connect_async(self.url.as_str()).await {
                Ok((stream, _response)) => {
                    info!(url = %self.url, "subscribed to update channel");
                    failures = 0;
                    match pump(stream, &self.bus).await {
                        Ok(()) => info!("update channel closed"),
                        Err(e) => warn!(error = %e, "update channel connection lost"),
                    }
                }
                Err(e) => {
                    warn!(url = %self.url, error = %e, "update channel unreachable");
                }
            }

            if self.policy.exhausted(failures) {
                error!(failures, "giving up on the update channel");
                break;
            }
            let delay = self.policy.delay_for(failures);
            failures = failures.saturating_add(1);
            debug!(delay_ms = delay.as_millis() as u64, "reconnecting to update channel");
            tokio::time::sleep(delay).await;
        }
    }
}

/// Forward text frames into the bus until the stream ends.
async fn pump(
    mut stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    bus: &UpdateBus,
) -> Result<(), tokio_tungstenite::tungstenite::Error> {
    while let Some(msg) = stream.next().await {
        match msg? {
            Message::Text(text) => bus.publish(text.as_str()),
            Message::Close(_) => return Ok(()),
            // Pings are answered by the protocol layer; nothing else
            // travels on the channel.
            _ => {}
        }
    }
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
