//! Channel registry — pub/sub topics mapped to live subscriber sets.
//!
//! The registry is the single shared-mutable hot spot of the gateway. It
//! is explicitly constructed at startup and dependency-injected; there is
//! no module-level singleton. Channel entries live only while subscribed:
//! created on first subscribe, removed when the set empties.
//!
//! Concurrency: channel state is sharded (`DashMap`), so operations on the
//! same channel are mutually exclusive while different channels do not
//! block each other. Subscriber ids are copied out before fan-out, so no
//! registry lock is ever held across a socket send; sends themselves are
//! bounded, non-blocking enqueues.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use beacon_core::events::ChannelEvent;
use beacon_core::ids::ConnectionId;
use dashmap::DashMap;
use metrics::counter;
use tracing::{debug, info, warn};

use super::connection::ClientConnection;

/// Maps channels to subscribers and back.
pub struct ChannelRegistry {
    /// Live connections by id.
    connections: DashMap<ConnectionId, Arc<ClientConnection>>,
    /// Channel → subscriber set.
    channels: DashMap<String, HashSet<ConnectionId>>,
    /// Reverse index: connection → channels it is subscribed to. Used only
    /// for bulk cleanup on disconnect.
    memberships: DashMap<ConnectionId, HashSet<String>>,
    /// Atomic counter so count queries never touch the maps.
    connection_count: AtomicUsize,
}

impl ChannelRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
            channels: DashMap::new(),
            memberships: DashMap::new(),
            connection_count: AtomicUsize::new(0),
        }
    }

    /// Register a connection. Overwriting an id replaces the old handle
    /// without touching its subscriptions.
    pub fn add_connection(&self, connection: Arc<ClientConnection>) {
        if self
            .connections
            .insert(connection.id.clone(), connection)
            .is_none()
        {
            let _ = self.connection_count.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Remove a connection and every subscription it holds.
    pub fn remove_connection(&self, conn_id: &ConnectionId) {
        self.unsubscribe_all(conn_id);
        if self.connections.remove(conn_id).is_some() {
            let _ = self.connection_count.fetch_sub(1, Ordering::Relaxed);
        }
    }

    /// Add `conn_id` to a channel's subscriber set. Idempotent; invalid
    /// channel names are rejected upstream by the protocol handler.
    pub fn subscribe(&self, channel: &str, conn_id: &ConnectionId) {
        let _ = self
            .channels
            .entry(channel.to_owned())
            .or_default()
            .insert(conn_id.clone());
        let _ = self
            .memberships
            .entry(conn_id.clone())
            .or_default()
            .insert(channel.to_owned());
        debug!(channel, conn_id = %conn_id, "subscribed");
    }

    /// Remove `conn_id` from a channel. A no-op when not subscribed; the
    /// channel entry disappears once its set empties so the registry never
    /// grows without bound.
    pub fn unsubscribe(&self, channel: &str, conn_id: &ConnectionId) {
        self.remove_member(channel, conn_id);
        let now_empty = self
            .memberships
            .get_mut(conn_id)
            .map(|mut channels| {
                let _ = channels.remove(channel);
                channels.is_empty()
            })
            .unwrap_or(false);
        if now_empty {
            let _ = self.memberships.remove_if(conn_id, |_, set| set.is_empty());
        }
    }

    /// Remove `conn_id` from every channel in its reverse index, in one
    /// pass. Used on disconnect.
    pub fn unsubscribe_all(&self, conn_id: &ConnectionId) {
        if let Some((_, channels)) = self.memberships.remove(conn_id) {
            for channel in &channels {
                self.remove_member(channel, conn_id);
            }
            debug!(conn_id = %conn_id, channels = channels.len(), "unsubscribed from all");
        }
    }

    fn remove_member(&self, channel: &str, conn_id: &ConnectionId) {
        let now_empty = self
            .channels
            .get_mut(channel)
            .map(|mut set| {
                let _ = set.remove(conn_id);
                set.is_empty()
            })
            .unwrap_or(false);
        // Guard dropped above; remove the entry only if still empty.
        if now_empty {
            let _ = self.channels.remove_if(channel, |_, set| set.is_empty());
        }
    }

    /// Serialize `event` once and fan it out to the channel's subscribers.
    ///
    /// A broadcast to a channel with zero subscribers is a silent no-op.
    /// Sends are bounded, non-blocking enqueues; a failed send (full
    /// buffer or closed transport) queues that connection for eviction,
    /// applied after the iteration completes — the set being iterated is
    /// never mutated, and a slow consumer never stalls producers.
    pub fn broadcast(&self, event: &ChannelEvent) {
        let subscribers: Vec<ConnectionId> = match self.channels.get(&event.channel) {
            Some(set) => set.iter().cloned().collect(),
            None => return,
        };

        let json = match serde_json::to_string(event) {
            Ok(json) => Arc::new(json),
            Err(e) => {
                warn!(event_type = %event.event_type, error = %e, "failed to serialize event");
                return;
            }
        };

        counter!("ws_broadcasts_total").increment(1);
        let mut to_evict = Vec::new();
        for conn_id in subscribers {
            let Some(connection) = self.connections.get(&conn_id).map(|c| Arc::clone(&c)) else {
                // Phantom entry: subscriber without a live connection.
                to_evict.push(conn_id);
                continue;
            };
            if !connection.is_open() {
                to_evict.push(conn_id);
                continue;
            }
            if !connection.send(Arc::clone(&json)) {
                counter!("ws_broadcast_drops_total").increment(1);
                warn!(
                    conn_id = %conn_id,
                    channel = %event.channel,
                    drops = connection.drop_count(),
                    "send failed, evicting connection"
                );
                to_evict.push(conn_id);
            }
        }

        for conn_id in to_evict {
            info!(conn_id = %conn_id, "removing dead or slow connection");
            self.remove_connection(&conn_id);
        }
    }

    /// Subscribers currently on a channel. Zero for unknown channels; no
    /// allocation on this path.
    pub fn subscriber_count(&self, channel: &str) -> usize {
        self.channels.get(channel).map_or(0, |set| set.len())
    }

    /// Names of every channel with at least one subscriber.
    pub fn active_channels(&self) -> Vec<String> {
        self.channels.iter().map(|e| e.key().clone()).collect()
    }

    /// Channels a connection is subscribed to (reverse index view).
    pub fn channels_for(&self, conn_id: &ConnectionId) -> Vec<String> {
        self.memberships
            .get(conn_id)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of registered connections.
    pub fn connection_count(&self) -> usize {
        self.connection_count.load(Ordering::Relaxed)
    }
}

impl Default for ChannelRegistry {
    fn default() -> Self {
        Self::new()
    }
}
