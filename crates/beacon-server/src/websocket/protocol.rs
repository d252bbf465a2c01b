//! Control-message handling: subscribe / unsubscribe / ping.
//!
//! One inbound text frame produces zero or more acknowledgement frames and
//! possibly registry mutations. Nothing in here can fail the connection's
//! processing loop: every failure path degrades to an error acknowledgement
//! (or, for unknown message types, a debug log).

use beacon_core::envelope::{Acknowledgement, ControlRequest, Envelope};
use beacon_core::events::ChannelEvent;
use beacon_core::ids::ConnectionId;
use metrics::counter;
use tracing::{debug, instrument, warn};

use crate::access::{AccessDecision, AccessValidator, CallerIdentity};

use super::registry::ChannelRegistry;

/// Handle one inbound control frame; returns the acknowledgements to send
/// back on the same connection, in order.
#[instrument(skip_all, fields(conn_id = %conn_id))]
pub async fn handle_control_frame(
    text: &str,
    conn_id: &ConnectionId,
    identity: &CallerIdentity,
    registry: &ChannelRegistry,
    validator: &AccessValidator,
) -> Vec<ChannelEvent> {
    let envelope: Envelope = match serde_json::from_str(text) {
        Ok(envelope) => envelope,
        Err(e) => {
            warn!(payload_bytes = text.len(), "unparseable frame");
            return vec![Acknowledgement::subscription_error(
                "",
                &format!("invalid JSON: {e}"),
            )];
        }
    };

    let request = match ControlRequest::from_envelope(&envelope) {
        Ok(request) => request,
        Err(err) => {
            // Malformed payload: one error ack, no partial processing.
            counter!("ws_malformed_frames_total").increment(1);
            return vec![Acknowledgement::subscription_error("", &err.to_string())];
        }
    };

    match request {
        ControlRequest::Ping => vec![Acknowledgement::pong()],
        ControlRequest::Subscribe { channels } => {
            // One synchronous store lookup per channel; a batch validates
            // concurrently. Partial success is expected — every channel
            // gets its own independent acknowledgement.
            let decisions = futures::future::join_all(
                channels
                    .iter()
                    .map(|channel| validator.validate_raw(channel, identity)),
            )
            .await;

            channels
                .iter()
                .zip(decisions)
                .map(|(channel, decision)| match decision {
                    AccessDecision::Allowed => {
                        registry.subscribe(channel, conn_id);
                        counter!("ws_subscriptions_total").increment(1);
                        Acknowledgement::subscription_success(channel)
                    }
                    AccessDecision::Denied { reason } => {
                        Acknowledgement::subscription_error(channel, &reason)
                    }
                })
                .collect()
        }
        ControlRequest::Unsubscribe { channels } => channels
            .iter()
            .map(|channel| {
                // Unsubscribe cannot fail; always acknowledge success.
                registry.unsubscribe(channel, conn_id);
                Acknowledgement::subscription_success(channel)
            })
            .collect(),
        ControlRequest::Unknown(kind) => {
            debug!(kind, "ignoring unknown message type");
            Vec::new()
        }
    }
}
