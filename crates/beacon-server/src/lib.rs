//! # beacon-server
//!
//! Axum HTTP + `WebSocket` gateway for the Beacon dashboard.
//!
//! - Channel registry: `{resource}:{id}` topics → live subscriber sets
//! - Permission-gated subscriptions (ownership checked against the
//!   authoritative store, fail closed)
//! - Event broadcasting: serialize once, bounded non-blocking fan-out,
//!   asynchronous eviction of dead/slow consumers
//! - Connection lifecycle with heartbeat and metrics
//! - Graceful shutdown via `tokio::signal` + `CancellationToken`

#![deny(unsafe_code)]

pub mod access;
pub mod config;
pub mod health;
pub mod metrics;
pub mod publish;
pub mod server;
pub mod shutdown;
pub mod websocket;
