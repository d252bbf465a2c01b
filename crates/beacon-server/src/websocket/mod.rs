//! WebSocket connection management, subscription handling, and broadcasting.
//!
//! ## Submodules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | `connection` | Per-connection handle: bounded outbound buffer, liveness |
//! | `registry` | Channel → subscriber-set map, reverse index, fan-out |
//! | `protocol` | subscribe/unsubscribe/ping control-message state machine |
//! | `session` | WebSocket upgrade, per-connection read/write loops |
//!
//! ## Data Flow
//!
//! `session` → `protocol` (validate, registry update, acks) → client.
//! Producers → [`crate::publish::EventPublisher`] → `registry` → clients.

pub mod connection;
pub mod protocol;
pub mod registry;
pub mod session;
