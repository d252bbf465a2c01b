//! # beacon-sync
//!
//! Client-side reconciliation engine for the Beacon dashboard.
//!
//! A displayed chat transcript is written concurrently from three sources:
//! a locally optimistic echo of the user's own submitted text, the
//! authoritative transcript fetched from the store, and a live stream of
//! partial assistant output. A workflow-run detail view is similarly fed
//! by an authoritative snapshot plus a stream of partial patches. This
//! crate merges those views into one consistent state:
//!
//! - [`merge`] — three-way message merge (optimistic / streaming /
//!   authoritative) with stable ordering and no duplication
//! - [`stream`] — cumulative streaming-chunk application and turn
//!   finalization
//! - [`enrich`] — post-load transform nesting tool results into their
//!   invoking blocks and extracting embedded images
//! - [`run`] — incremental workflow-run patch application
//! - [`store`] — the per-entity local caches the engine mutates
//!
//! Everything here runs on a single logical thread per cached entity; the
//! transport is trusted to deliver updates for a given message id in order.

#![deny(unsafe_code)]

pub mod enrich;
pub mod merge;
pub mod run;
pub mod store;
pub mod stream;

pub use enrich::enrich_messages;
pub use merge::{MergedMessages, merge_messages};
pub use run::{RunUpdate, apply_run_update};
pub use store::{RunCache, SessionCache};
pub use stream::{apply_stream_chunk, finalize_streaming};
