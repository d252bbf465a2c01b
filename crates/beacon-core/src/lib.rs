//! # beacon-core
//!
//! Foundation types for the Beacon real-time synchronization subsystem.
//!
//! This crate provides the shared vocabulary the server gateway and the
//! client reconciliation engine both depend on:
//!
//! - **Branded IDs**: `SessionId`, `ProjectId`, `RunId`, `ConnectionId` as
//!   newtypes for type safety
//! - **Channels**: the `{resource}:{id}` pub/sub topic names
//! - **Wire envelope**: the `{channel, type, data}` frame shared by both
//!   directions, plus the control-message grammar
//! - **Events**: `ChannelEvent` and the closed `EventType` enum
//! - **Chat messages**: `ChatMessage` with content blocks, streaming and
//!   optimistic flags
//! - **Workflow runs**: `RunDetail` with steps/events/artifacts and the
//!   partial-patch structs
//! - **Errors**: the `SyncError` taxonomy via `thiserror`

#![deny(unsafe_code)]

pub mod channel;
pub mod envelope;
pub mod errors;
pub mod events;
pub mod ids;
pub mod message;
pub mod run;

pub use channel::{Channel, ChannelKind};
pub use errors::SyncError;
pub use events::{ChannelEvent, EventType};
pub use ids::{ConnectionId, ProjectId, RunId, SessionId};
