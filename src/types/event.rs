//! Change event types flowing through the relay pipeline
//!
//! A store notification arrives as a UTF-8 string. If it parses as a JSON
//! object it is carried structured; anything else is carried opaque and
//! tagged `UNKNOWN` so it is forwarded rather than dropped. Sequencing wraps
//! the raw event with the metadata consumers key on: `_pub_id`,
//! `_published_at` and `_source`. All additive — whatever fields the store
//! sent pass through untouched.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

/// Source tag stamped on every relayed event
pub const EVENT_SOURCE: &str = "postgres_notify";

/// Operation assigned to payloads that fail to parse as JSON objects
pub const UNKNOWN_OPERATION: &str = "UNKNOWN";

/// Notification payload, either parsed or carried as raw text
#[derive(Clone, Debug, PartialEq)]
pub enum ChangePayload {
    /// Payload parsed as a JSON object
    Structured(Map<String, Value>),
    /// Payload that was not a JSON object, kept verbatim
    Opaque(String),
}

/// A change event as received from the data store
#[derive(Clone, Debug, PartialEq)]
pub struct RawChangeEvent {
    /// Operation reported by the store ("UNKNOWN" for opaque payloads,
    /// "N/A" when a structured payload carries no operation field)
    pub operation: String,
    pub payload: ChangePayload,
}

impl RawChangeEvent {
    /// Parse a notification payload into an event.
    ///
    /// Never fails: a payload that is not a JSON object comes back as an
    /// [`ChangePayload::Opaque`] event with `operation = "UNKNOWN"`.
    pub fn parse(raw: &str) -> Self {
        match serde_json::from_str::<Value>(raw) {
            Ok(Value::Object(map)) => {
                let operation = map
                    .get("operation")
                    .and_then(Value::as_str)
                    .unwrap_or("N/A")
                    .to_string();
                Self {
                    operation,
                    payload: ChangePayload::Structured(map),
                }
            }
            _ => Self {
                operation: UNKNOWN_OPERATION.to_string(),
                payload: ChangePayload::Opaque(raw.to_string()),
            },
        }
    }

    /// Whether the payload failed structured parsing
    pub fn is_opaque(&self) -> bool {
        matches!(self.payload, ChangePayload::Opaque(_))
    }

    /// Message body for publishing. Structured payloads pass through as-is;
    /// opaque payloads become `{"operation":"UNKNOWN","raw":<text>}`.
    fn into_body(self) -> Map<String, Value> {
        match self.payload {
            ChangePayload::Structured(map) => map,
            ChangePayload::Opaque(raw) => {
                let mut map = Map::new();
                map.insert(
                    "operation".to_string(),
                    Value::String(UNKNOWN_OPERATION.to_string()),
                );
                map.insert("raw".to_string(), Value::String(raw));
                map
            }
        }
    }
}

/// A raw event enriched with its durable sequence id, ready to publish.
/// Immutable once created; serialized once and handed to the bus.
#[derive(Clone, Debug)]
pub struct SequencedEvent {
    /// Durable monotonic id assigned by the atomic counter
    pub pub_id: u64,
    /// Operation carried over from the raw event (for logging)
    pub operation: String,
    /// Publish timestamp, stamped at sequencing time
    pub published_at: DateTime<Utc>,
    body: Map<String, Value>,
}

impl SequencedEvent {
    pub fn new(raw: RawChangeEvent, pub_id: u64) -> Self {
        let operation = raw.operation.clone();
        Self {
            pub_id,
            operation,
            published_at: Utc::now(),
            body: raw.into_body(),
        }
    }

    /// Serialize for the bus: original fields plus `_pub_id`,
    /// `_published_at` and `_source`.
    pub fn to_json(&self) -> String {
        let mut out = self.body.clone();
        out.insert("_pub_id".to_string(), Value::from(self.pub_id));
        out.insert(
            "_published_at".to_string(),
            Value::String(self.published_at.to_rfc3339()),
        );
        out.insert(
            "_source".to_string(),
            Value::String(EVENT_SOURCE.to_string()),
        );
        Value::Object(out).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_structured_payload() {
        let event = RawChangeEvent::parse(r#"{"operation":"INSERT","order_id":42}"#);
        assert_eq!(event.operation, "INSERT");
        assert!(!event.is_opaque());
    }

    #[test]
    fn test_parse_malformed_payload_is_never_dropped() {
        let event = RawChangeEvent::parse("not json");
        assert_eq!(event.operation, UNKNOWN_OPERATION);
        assert_eq!(event.payload, ChangePayload::Opaque("not json".to_string()));
    }

    #[test]
    fn test_parse_non_object_json_is_opaque() {
        // A bare array or number is valid JSON but not a change event
        let event = RawChangeEvent::parse("[1,2,3]");
        assert!(event.is_opaque());
        assert_eq!(event.operation, UNKNOWN_OPERATION);
    }

    #[test]
    fn test_structured_payload_without_operation_field() {
        let event = RawChangeEvent::parse(r#"{"order_id":7}"#);
        assert_eq!(event.operation, "N/A");
        assert!(!event.is_opaque());
    }

    #[test]
    fn test_sequenced_event_adds_metadata() {
        let raw = RawChangeEvent::parse(r#"{"operation":"UPDATE","order_id":1}"#);
        let event = SequencedEvent::new(raw, 99);
        let json: Value = serde_json::from_str(&event.to_json()).unwrap();

        assert_eq!(json["_pub_id"], 99);
        assert_eq!(json["_source"], EVENT_SOURCE);
        assert!(json["_published_at"].is_string());
        // Original fields pass through untouched
        assert_eq!(json["operation"], "UPDATE");
        assert_eq!(json["order_id"], 1);
    }

    #[test]
    fn test_opaque_event_serializes_with_raw_text() {
        let raw = RawChangeEvent::parse("not json");
        let event = SequencedEvent::new(raw, 1);
        let json: Value = serde_json::from_str(&event.to_json()).unwrap();

        assert_eq!(json["operation"], UNKNOWN_OPERATION);
        assert_eq!(json["raw"], "not json");
        assert_eq!(json["_pub_id"], 1);
    }
}
