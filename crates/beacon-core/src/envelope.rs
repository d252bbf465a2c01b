//! The wire envelope and the control-message grammar.
//!
//! Every frame in both directions is `{ channel, type, data }`. Inbound
//! control frames parse into the closed [`ControlRequest`] enum; outbound
//! acknowledgements are built through the constructors on
//! [`Acknowledgement`].

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::errors::SyncError;
use crate::events::{ChannelEvent, EventType, now_rfc3339};

/// Raw inbound frame before control-message interpretation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Envelope {
    /// Target channel. Empty for control messages in the list form; the
    /// legacy single-channel subscribe carries its channel here.
    #[serde(default)]
    pub channel: String,
    /// Message type tag.
    #[serde(rename = "type")]
    pub kind: String,
    /// Payload object.
    #[serde(default)]
    pub data: Value,
}

/// A parsed control message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ControlRequest {
    /// Subscribe to each listed channel; each gets its own acknowledgement.
    Subscribe {
        /// Channels in `{resource}:{id}` form.
        channels: Vec<String>,
    },
    /// Unsubscribe from each listed channel; always acknowledged success.
    Unsubscribe {
        /// Channels in `{resource}:{id}` form.
        channels: Vec<String>,
    },
    /// Liveness probe; answered with `pong`.
    Ping,
    /// A type this handler does not know. Logged and ignored so new
    /// message types can be added elsewhere without breaking old gateways.
    Unknown(String),
}

impl ControlRequest {
    /// Interpret an envelope as a control message.
    ///
    /// The legacy single-channel subscribe form (channel carried in the
    /// envelope rather than in a `channels` list) is normalized into the
    /// list form here, before validation — input adaptation, not a second
    /// code path.
    pub fn from_envelope(envelope: &Envelope) -> Result<Self, SyncError> {
        match envelope.kind.as_str() {
            "ping" => Ok(Self::Ping),
            "subscribe" => Ok(Self::Subscribe {
                channels: channel_list(envelope)?,
            }),
            "unsubscribe" => Ok(Self::Unsubscribe {
                channels: channel_list(envelope)?,
            }),
            other => Ok(Self::Unknown(other.to_owned())),
        }
    }
}

/// Extract the channel list from a subscribe/unsubscribe payload,
/// normalizing the legacy envelope-channel form.
fn channel_list(envelope: &Envelope) -> Result<Vec<String>, SyncError> {
    match envelope.data.get("channels") {
        Some(Value::Array(items)) => {
            let mut channels = Vec::with_capacity(items.len());
            for item in items {
                let Some(s) = item.as_str() else {
                    return Err(SyncError::MalformedRequest {
                        reason: "channels entries must be strings".into(),
                    });
                };
                channels.push(s.to_owned());
            }
            Ok(channels)
        }
        Some(_) => Err(SyncError::MalformedRequest {
            reason: "channels must be a list".into(),
        }),
        None if !envelope.channel.is_empty() => Ok(vec![envelope.channel.clone()]),
        None => Err(SyncError::MalformedRequest {
            reason: "missing channels list".into(),
        }),
    }
}

/// Constructors for the acknowledgement frames the gateway sends back.
pub struct Acknowledgement;

impl Acknowledgement {
    /// One successful subscription.
    pub fn subscription_success(channel: &str) -> ChannelEvent {
        ChannelEvent::new(
            channel,
            EventType::SubscriptionSuccess,
            json!({ "channel": channel }),
        )
    }

    /// One failed subscription. `channel` is empty for malformed payloads
    /// that never reached per-channel processing.
    pub fn subscription_error(channel: &str, reason: &str) -> ChannelEvent {
        ChannelEvent::new(
            channel,
            EventType::SubscriptionError,
            json!({ "channel": channel, "error": reason }),
        )
    }

    /// Response to a `ping`, carrying the server timestamp.
    pub fn pong() -> ChannelEvent {
        ChannelEvent::new("", EventType::Pong, json!({ "timestamp": now_rfc3339() }))
    }
}
