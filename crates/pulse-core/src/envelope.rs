//! Decoding of event envelopes from the broadcast channel.
//!
//! Producers publish JSON objects on the well-known channel with at least a
//! `session_id` field; everything else is payload and passes through to
//! subscribers untouched. A `type` field, if present, is absorbed here; the
//! hub re-tags outbound frames itself, so the payload map never carries a
//! conflicting tag.

use serde_json::{Map, Value};
use thiserror::Error;

use crate::ids::SessionId;

/// A decoded broadcast event, ready for fan-out.
#[derive(Clone, Debug, PartialEq)]
pub struct UpdateEnvelope {
    /// Topic the event was published under.
    pub session_id: SessionId,
    /// Event-kind marker carried by the producer, if any.
    pub kind: Option<String>,
    /// Remaining payload fields, passed through verbatim.
    pub fields: Map<String, Value>,
}

/// Why an inbound envelope was rejected.
#[derive(Debug, Error)]
pub enum EnvelopeError {
    /// The payload was not valid JSON.
    #[error("undecodable envelope: {0}")]
    Json(#[from] serde_json::Error),

    /// The payload was valid JSON but not an object.
    #[error("envelope is not a JSON object")]
    NotAnObject,

    /// The object carried no usable `session_id` string.
    #[error("envelope missing session_id")]
    MissingTopic,
}

impl UpdateEnvelope {
    /// Decode a raw broadcast message.
    ///
    /// Envelopes failing any check are dropped by the caller; decoding never
    /// panics and never partially succeeds.
    pub fn decode(raw: &str) -> Result<Self, EnvelopeError> {
        let value: Value = serde_json::from_str(raw)?;
        let Value::Object(mut map) = value else {
            return Err(EnvelopeError::NotAnObject);
        };
        let session_id = match map.remove("session_id") {
            Some(Value::String(s)) if !s.is_empty() => SessionId::from(s),
            _ => return Err(EnvelopeError::MissingTopic),
        };
        let kind = match map.remove("type") {
            Some(Value::String(k)) => Some(k),
            _ => None,
        };
        Ok(Self {
            session_id,
            kind,
            fields: map,
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn decodes_producer_envelope() {
        let raw = r#"{"type":"session_update","session_id":"s1","phase":"evaluation","timestamp":"2026-08-08T12:00:00Z"}"#;
        let envelope = UpdateEnvelope::decode(raw).unwrap();
        assert_eq!(envelope.session_id.as_str(), "s1");
        assert_eq!(envelope.kind.as_deref(), Some("session_update"));
        assert_eq!(envelope.fields["phase"], "evaluation");
        assert!(!envelope.fields.contains_key("session_id"));
        assert!(!envelope.fields.contains_key("type"));
    }

    #[test]
    fn envelope_without_kind_still_decodes() {
        let envelope = UpdateEnvelope::decode(r#"{"session_id":"s1","phase":"discovery"}"#).unwrap();
        assert_eq!(envelope.kind, None);
        assert_eq!(envelope.fields["phase"], "discovery");
    }

    #[test]
    fn missing_topic_is_rejected() {
        let result = UpdateEnvelope::decode(r#"{"phase":"evaluation"}"#);
        assert_matches!(result, Err(EnvelopeError::MissingTopic));
    }

    #[test]
    fn non_string_topic_is_rejected() {
        let result = UpdateEnvelope::decode(r#"{"session_id":17,"phase":"evaluation"}"#);
        assert_matches!(result, Err(EnvelopeError::MissingTopic));
    }

    #[test]
    fn empty_topic_is_rejected() {
        let result = UpdateEnvelope::decode(r#"{"session_id":""}"#);
        assert_matches!(result, Err(EnvelopeError::MissingTopic));
    }

    #[test]
    fn garbage_is_rejected() {
        let result = UpdateEnvelope::decode("not json at all");
        assert_matches!(result, Err(EnvelopeError::Json(_)));
    }

    #[test]
    fn non_object_json_is_rejected() {
        let result = UpdateEnvelope::decode(r#"["session_id","s1"]"#);
        assert_matches!(result, Err(EnvelopeError::NotAnObject));
    }
}
