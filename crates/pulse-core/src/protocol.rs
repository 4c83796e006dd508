//! JSON wire frames exchanged over a hub connection.
//!
//! Both directions use internally tagged objects (`"type": "…"`). Client
//! frames carry subscription intent; server frames carry lifecycle
//! acknowledgements and fanned-out session updates. Fields of a broadcast
//! envelope pass through [`ServerFrame::SessionUpdate`] verbatim via a
//! flattened map.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::ids::{SessionId, UserId};

/// Control frames a client sends to the hub.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    /// Subscribe this connection to a session's updates.
    SubscribeSession {
        /// Topic to subscribe to.
        session_id: SessionId,
    },

    /// Unsubscribe this connection from a session's updates.
    UnsubscribeSession {
        /// Topic to unsubscribe from.
        session_id: SessionId,
    },
}

/// Frames the hub sends to a client.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerFrame {
    /// Handshake completed and the connection is registered.
    Connected {
        /// Human-readable notice.
        message: String,
        /// Subject of the authenticated identity.
        user_id: UserId,
    },

    /// Acknowledgement of a `subscribe_session` frame.
    Subscribed {
        /// Topic the connection is now subscribed to.
        session_id: SessionId,
    },

    /// A broadcast event fanned out to a subscribed connection.
    SessionUpdate {
        /// Topic the event was published under.
        session_id: SessionId,
        /// Event payload, passed through from the envelope verbatim.
        #[serde(flatten)]
        fields: Map<String, Value>,
    },
}

impl ServerFrame {
    /// The `connected` notice sent immediately after registration.
    #[must_use]
    pub fn connected(user_id: UserId) -> Self {
        Self::Connected {
            message: "connected to research updates".to_owned(),
            user_id,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn subscribe_frame_decodes() {
        let frame: ClientFrame =
            serde_json::from_str(r#"{"type":"subscribe_session","session_id":"s1"}"#).unwrap();
        assert_eq!(
            frame,
            ClientFrame::SubscribeSession {
                session_id: "s1".into()
            }
        );
    }

    #[test]
    fn unsubscribe_frame_decodes() {
        let frame: ClientFrame =
            serde_json::from_str(r#"{"type":"unsubscribe_session","session_id":"s1"}"#).unwrap();
        assert_eq!(
            frame,
            ClientFrame::UnsubscribeSession {
                session_id: "s1".into()
            }
        );
    }

    #[test]
    fn unknown_frame_type_is_an_error() {
        let result = serde_json::from_str::<ClientFrame>(r#"{"type":"shout","session_id":"s1"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn frame_without_type_is_an_error() {
        let result = serde_json::from_str::<ClientFrame>(r#"{"session_id":"s1"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn connected_frame_shape() {
        let frame = ServerFrame::connected("u1".into());
        let value = serde_json::to_value(&frame).unwrap();
        assert_eq!(value["type"], "connected");
        assert_eq!(value["user_id"], "u1");
        assert!(value["message"].is_string());
    }

    #[test]
    fn subscribed_frame_shape() {
        let frame = ServerFrame::Subscribed {
            session_id: "s1".into(),
        };
        let value = serde_json::to_value(&frame).unwrap();
        assert_eq!(value, json!({"type": "subscribed", "session_id": "s1"}));
    }

    #[test]
    fn session_update_flattens_passthrough_fields() {
        let mut fields = Map::new();
        let _ = fields.insert("phase".to_owned(), json!("evaluation"));
        let frame = ServerFrame::SessionUpdate {
            session_id: "s1".into(),
            fields,
        };
        let value = serde_json::to_value(&frame).unwrap();
        assert_eq!(
            value,
            json!({"type": "session_update", "session_id": "s1", "phase": "evaluation"})
        );
    }

    #[test]
    fn session_update_round_trips() {
        let raw = r#"{"type":"session_update","session_id":"s1","phase":"synthesis","timestamp":"2026-08-08T00:00:00Z"}"#;
        let frame: ServerFrame = serde_json::from_str(raw).unwrap();
        match &frame {
            ServerFrame::SessionUpdate { session_id, fields } => {
                assert_eq!(session_id.as_str(), "s1");
                assert_eq!(fields["phase"], "synthesis");
            }
            other => panic!("unexpected frame: {other:?}"),
        }
        let back = serde_json::to_value(&frame).unwrap();
        assert_eq!(back["timestamp"], "2026-08-08T00:00:00Z");
    }
}
