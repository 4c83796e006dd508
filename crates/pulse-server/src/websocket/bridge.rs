//! Update bus and per-topic fan-out.
//!
//! [`UpdateBus`] is the process-wide broadcast channel raw envelopes are
//! published on, by the upstream subscriber in production or directly by
//! an embedded producer. Exactly one [`UpdateBridge`] task consumes it,
//! decodes each envelope, and delivers the resulting `session_update`
//! frame to every connection subscribed to the envelope's topic.
//!
//! Delivery is best-effort and fire-and-forget: a full per-connection
//! queue sheds the newest frame for that connection only, and a client
//! that keeps falling behind is forcibly disconnected.

use std::sync::Arc;

use metrics::counter;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use pulse_core::envelope::UpdateEnvelope;
use pulse_core::protocol::ServerFrame;

use crate::metrics::{UPDATES_DROPPED_TOTAL, UPDATES_RECEIVED_TOTAL, WS_BROADCAST_DROPS_TOTAL};

use super::registry::Registry;

/// Maximum total lifetime frame drops before forcibly disconnecting a slow
/// client.
const MAX_TOTAL_DROPS: u64 = 100;

/// Process-wide broadcast channel of raw envelope JSON. Cloneable; store
/// in the server state and hand to producers.
#[derive(Clone)]
pub struct UpdateBus {
    sender: broadcast::Sender<Arc<String>>,
}

impl UpdateBus {
    /// Create a bus with the given buffered capacity. Subscribers that
    /// fall behind skip messages rather than blocking publishers.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish a raw envelope. Succeeds even with no bridge attached.
    pub fn publish(&self, raw: impl Into<String>) {
        let _ = self.sender.send(Arc::new(raw.into()));
    }

    /// Subscribe to the bus. The bridge calls this exactly once.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<String>> {
        self.sender.subscribe()
    }
}

/// The single fan-out loop bridging the update bus to subscribed
/// connections.
pub struct UpdateBridge {
    registry: Arc<Registry>,
    receiver: broadcast::Receiver<Arc<String>>,
}

impl UpdateBridge {
    /// Attach a bridge to the bus. One per process.
    #[must_use]
    pub fn new(registry: Arc<Registry>, bus: &UpdateBus) -> Self {
        Self {
            registry,
            receiver: bus.subscribe(),
        }
    }

    /// Consume the bus until every publisher is gone.
    ///
    /// No envelope is ever fatal: malformed input is counted and dropped,
    /// and a lagged receiver logs how much it skipped and carries on.
    pub async fn run(mut self) {
        loop {
            match self.receiver.recv().await {
                Ok(raw) => self.dispatch(&raw).await,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "update bus lagged; events lost to backlog");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    }

    /// Decode one envelope and fan it out to current subscribers.
    pub(crate) async fn dispatch(&self, raw: &str) {
        counter!(UPDATES_RECEIVED_TOTAL).increment(1);

        let envelope = match UpdateEnvelope::decode(raw) {
            Ok(envelope) => envelope,
            Err(e) => {
                counter!(UPDATES_DROPPED_TOTAL).increment(1);
                warn!(error = %e, "dropping broadcast envelope");
                return;
            }
        };

        let frame = ServerFrame::SessionUpdate {
            session_id: envelope.session_id.clone(),
            fields: envelope.fields,
        };
        let json = match serde_json::to_string(&frame) {
            Ok(json) => Arc::new(json),
            Err(e) => {
                warn!(session_id = %envelope.session_id, error = %e, "failed to serialize update");
                return;
            }
        };

        let subscribers = self.registry.subscribers_of(&envelope.session_id).await;
        let recipients = subscribers.len();
        let mut delivered = 0usize;
        for conn in subscribers {
            if conn.send(Arc::clone(&json)) {
                delivered += 1;
            } else {
                counter!(WS_BROADCAST_DROPS_TOTAL).increment(1);
                let drops = conn.drop_count();
                if drops >= MAX_TOTAL_DROPS {
                    warn!(conn_id = %conn.id, drops, "disconnecting slow client");
                    conn.force_close();
                } else {
                    warn!(conn_id = %conn.id, total_drops = drops, "send queue full, dropping update");
                }
            }
        }
        debug!(
            session_id = %envelope.session_id,
            recipients, delivered, "fanned out update"
        );
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
