//! WebSocket session lifecycle — handles a single connected client from
//! upgrade through disconnect.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use beacon_core::events::{ChannelEvent, EventType};
use beacon_core::ids::ConnectionId;
use futures::{SinkExt, StreamExt};
use metrics::{counter, gauge, histogram};
use serde_json::json;
use tokio::sync::mpsc;
use tracing::{debug, info, instrument, warn};

use crate::access::{AccessValidator, CallerIdentity};
use crate::config::ServerConfig;

use super::connection::ClientConnection;
use super::protocol::handle_control_frame;
use super::registry::ChannelRegistry;

/// Run a WebSocket session for a connected client.
///
/// 1. Registers the connection and sends a `connected` greeting
/// 2. Dispatches incoming text frames through the control-message handler
/// 3. Forwards outbound events/acknowledgements via the send channel
/// 4. Sends periodic Ping frames and disconnects unresponsive clients
/// 5. Cleans up every subscription on disconnect
#[instrument(skip_all, fields(conn_id))]
pub async fn run_ws_session(
    ws: WebSocket,
    identity: CallerIdentity,
    registry: Arc<ChannelRegistry>,
    validator: Arc<AccessValidator>,
    config: ServerConfig,
) {
    let conn_id = ConnectionId::new();
    let _ = tracing::Span::current().record("conn_id", conn_id.as_str());

    let (mut ws_tx, mut ws_rx) = ws.split();
    let (send_tx, mut send_rx) = mpsc::channel::<Arc<String>>(config.outbound_buffer);
    let connection = Arc::new(ClientConnection::new(conn_id.clone(), identity, send_tx));

    let connection_start = std::time::Instant::now();
    info!("client connected");
    counter!("ws_connections_total").increment(1);
    gauge!("ws_connections_active").increment(1.0);

    registry.add_connection(connection.clone());

    // Greeting so the client learns its connection id.
    let greeting = ChannelEvent::new(
        "",
        EventType::Connected,
        json!({ "connectionId": conn_id.as_str() }),
    );
    if let Ok(text) = serde_json::to_string(&greeting) {
        let _ = ws_tx.send(Message::Text(text.into())).await;
    }

    // Outbound forwarder with periodic Ping frames.
    let ping_interval = Duration::from_secs(config.heartbeat_interval_secs);
    let pong_timeout = Duration::from_secs(config.heartbeat_timeout_secs);
    let outbound_conn = connection.clone();
    let outbound = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(ping_interval);
        // Skip the immediate first tick
        let _ = ticker.tick().await;

        loop {
            tokio::select! {
                msg = send_rx.recv() => {
                    match msg {
                        Some(text) => {
                            if ws_tx.send(Message::Text(text.as_str().into())).await.is_err() {
                                break;
                            }
                        }
                        None => break,
                    }
                }
                _ = ticker.tick() => {
                    if !outbound_conn.check_alive()
                        && outbound_conn.last_pong_elapsed() > pong_timeout
                    {
                        warn!("client unresponsive for {pong_timeout:?}, disconnecting");
                        break;
                    }
                    if ws_tx.send(Message::Ping(vec![].into())).await.is_err() {
                        break;
                    }
                }
            }
        }
        outbound_conn.mark_closed();
    });

    // Process incoming frames.
    while let Some(Ok(msg)) = ws_rx.next().await {
        let text = match msg {
            Message::Text(ref t) => Some(t.to_string()),
            Message::Binary(ref data) => match std::str::from_utf8(data) {
                Ok(s) => Some(s.to_owned()),
                Err(_) => {
                    debug!(len = data.len(), "ignoring non-UTF8 binary frame");
                    None
                }
            },
            Message::Close(_) => {
                info!("client sent close frame");
                break;
            }
            Message::Ping(_) | Message::Pong(_) => {
                connection.mark_alive();
                None
            }
        };

        let Some(text) = text else { continue };
        connection.mark_alive();

        let acks = handle_control_frame(
            &text,
            &connection.id,
            &connection.identity,
            &registry,
            &validator,
        )
        .await;

        for ack in acks {
            if !connection.send_json(&ack) {
                debug!("failed to enqueue acknowledgement (channel full or closed)");
            }
        }
    }

    // Clean up: drop the connection and every subscription it held.
    info!("client disconnected");
    counter!("ws_disconnections_total").increment(1);
    gauge!("ws_connections_active").decrement(1.0);
    histogram!("ws_connection_duration_seconds").record(connection_start.elapsed().as_secs_f64());
    connection.mark_closed();
    outbound.abort();
    registry.remove_connection(&connection.id);
}
