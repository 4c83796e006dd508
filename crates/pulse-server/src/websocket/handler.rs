//! Control-frame parsing and dispatch.
//!
//! Client input is never trusted and never fatal: an undecodable or
//! unrecognized frame is logged and ignored, and the connection stays
//! open. Only `subscribe_session` is acknowledged; `unsubscribe_session`
//! is silent by contract.

use std::sync::Arc;

use tracing::{debug, warn};

use pulse_core::protocol::{ClientFrame, ServerFrame};

use super::registry::Registry;
use super::session::ClientConnection;

/// Handle one inbound text frame from a connection.
pub async fn handle_frame(registry: &Registry, conn: &Arc<ClientConnection>, raw: &str) {
    let frame = match serde_json::from_str::<ClientFrame>(raw) {
        Ok(frame) => frame,
        Err(e) => {
            debug!(conn_id = %conn.id, error = %e, "ignoring undecodable frame");
            return;
        }
    };

    match frame {
        ClientFrame::SubscribeSession { session_id } => {
            if !registry.subscribe(&conn.id, session_id.clone()).await {
                // Connection already torn down; nothing to acknowledge.
                return;
            }
            debug!(conn_id = %conn.id, session_id = %session_id, "subscribed");
            send_frame(conn, &ServerFrame::Subscribed { session_id });
        }
        ClientFrame::UnsubscribeSession { session_id } => {
            registry.unsubscribe(&conn.id, &session_id).await;
            debug!(conn_id = %conn.id, session_id = %session_id, "unsubscribed");
        }
    }
}

/// Serialize and queue a frame for a single connection, fire-and-forget.
pub(crate) fn send_frame(conn: &Arc<ClientConnection>, frame: &ServerFrame) {
    match serde_json::to_string(frame) {
        Ok(json) => {
            if !conn.send(Arc::new(json)) {
                warn!(conn_id = %conn.id, "failed to queue frame (queue full or closed)");
            }
        }
        Err(e) => warn!(conn_id = %conn.id, error = %e, "failed to serialize frame"),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
