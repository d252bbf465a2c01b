//! Broadcast events and the closed event-type enum.
//!
//! Event-type dispatch is a tagged enum rather than string literals so the
//! compiler enforces exhaustiveness when new types are added.

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Every event type that can cross the wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    // ── Domain broadcast types ──────────────────────────────────────
    /// Partial-field patch of a workflow run.
    #[serde(rename = "run-updated")]
    RunUpdated,
    /// A new step appeared in a run.
    #[serde(rename = "step-created")]
    StepCreated,
    /// Partial-field patch of an existing step.
    #[serde(rename = "step-updated")]
    StepUpdated,
    /// A new execution event appeared in a run.
    #[serde(rename = "event-created")]
    EventCreated,
    /// A new artifact appeared in a run.
    #[serde(rename = "artifact-created")]
    ArtifactCreated,
    /// Cumulative content for a streaming assistant message.
    #[serde(rename = "message-stream-chunk")]
    MessageStreamChunk,
    /// The in-flight agent turn finished.
    #[serde(rename = "turn-completed")]
    TurnCompleted,
    /// Session metadata changed.
    #[serde(rename = "session-updated")]
    SessionUpdated,

    // ── Acknowledgements and control responses ──────────────────────
    /// Greeting sent once per connection after upgrade.
    #[serde(rename = "connected")]
    Connected,
    /// A subscribe succeeded for one channel.
    #[serde(rename = "subscription_success")]
    SubscriptionSuccess,
    /// A subscribe failed for one channel.
    #[serde(rename = "subscription_error")]
    SubscriptionError,
    /// Response to a client `ping`.
    #[serde(rename = "pong")]
    Pong,
}

impl EventType {
    /// The wire tag for this event type.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::RunUpdated => "run-updated",
            Self::StepCreated => "step-created",
            Self::StepUpdated => "step-updated",
            Self::EventCreated => "event-created",
            Self::ArtifactCreated => "artifact-created",
            Self::MessageStreamChunk => "message-stream-chunk",
            Self::TurnCompleted => "turn-completed",
            Self::SessionUpdated => "session-updated",
            Self::Connected => "connected",
            Self::SubscriptionSuccess => "subscription_success",
            Self::SubscriptionError => "subscription_error",
            Self::Pong => "pong",
        }
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One broadcast unit. Immutable once constructed.
///
/// Per-channel ordering is the program order of broadcast calls; there is
/// no ordering guarantee across channels.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChannelEvent {
    /// Target channel in `{resource}:{id}` form.
    pub channel: String,
    /// Event type tag.
    #[serde(rename = "type")]
    pub event_type: EventType,
    /// Event payload. Always carries the resource id so receivers can
    /// route the patch to the correct cached entity.
    pub data: Value,
    /// ISO-8601 timestamp with millisecond precision.
    pub timestamp: String,
}

impl ChannelEvent {
    /// Create an event stamped with the current UTC time.
    pub fn new(channel: impl Into<String>, event_type: EventType, data: Value) -> Self {
        Self {
            channel: channel.into(),
            event_type,
            data,
            timestamp: now_rfc3339(),
        }
    }
}

/// Current UTC time as RFC 3339 with millisecond precision — the one
/// timestamp format used on the wire.
pub fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn event_type_roundtrip() {
        for et in [
            EventType::RunUpdated,
            EventType::StepCreated,
            EventType::StepUpdated,
            EventType::EventCreated,
            EventType::ArtifactCreated,
            EventType::MessageStreamChunk,
            EventType::TurnCompleted,
            EventType::SessionUpdated,
            EventType::Connected,
            EventType::SubscriptionSuccess,
            EventType::SubscriptionError,
            EventType::Pong,
        ] {
            let json = serde_json::to_string(&et).unwrap();
            assert_eq!(json, format!("\"{}\"", et.as_str()));
            let back: EventType = serde_json::from_str(&json).unwrap();
            assert_eq!(back, et);
        }
    }

    #[test]
    fn unknown_event_type_fails_to_parse() {
        let result: Result<EventType, _> = serde_json::from_str("\"no-such-event\"");
        assert!(result.is_err());
    }

    #[test]
    fn event_serializes_type_field() {
        let ev = ChannelEvent::new("run:r1", EventType::RunUpdated, json!({"id": "r1"}));
        let v: Value = serde_json::to_value(&ev).unwrap();
        assert_eq!(v["type"], "run-updated");
        assert_eq!(v["channel"], "run:r1");
        assert_eq!(v["data"]["id"], "r1");
        assert!(v["timestamp"].is_string());
    }

    #[test]
    fn timestamp_has_millisecond_precision() {
        let ev = ChannelEvent::new("session:s1", EventType::TurnCompleted, json!({}));
        // RFC 3339 with millis: 2026-01-01T00:00:00.000Z
        assert!(ev.timestamp.ends_with('Z'));
        let dot = ev.timestamp.rfind('.').expect("has fractional seconds");
        assert_eq!(ev.timestamp.len() - dot, 5, "exactly three fractional digits");
    }

    #[test]
    fn wire_format_event() {
        let raw = r#"{"channel":"session:s1","type":"message-stream-chunk","data":{"sessionId":"s1"},"timestamp":"2026-02-13T15:30:00.000Z"}"#;
        let ev: ChannelEvent = serde_json::from_str(raw).unwrap();
        assert_eq!(ev.event_type, EventType::MessageStreamChunk);
        assert_eq!(ev.channel, "session:s1");
        assert_eq!(ev.data["sessionId"], "s1");
    }

    #[test]
    fn events_compare_equal_by_value() {
        let a = ChannelEvent {
            channel: "run:r".into(),
            event_type: EventType::StepCreated,
            data: json!({"id": "st1"}),
            timestamp: "2026-01-01T00:00:00.000Z".into(),
        };
        let b = a.clone();
        assert_eq!(a, b);
    }
}
