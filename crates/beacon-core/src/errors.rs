//! Error taxonomy for the synchronization subsystem.
//!
//! No error here may crash a connection's processing loop; every failure
//! degrades to "this one operation did not happen" with a best-effort
//! acknowledgement back to the client. Delivery failures are recovered
//! inside the registry (connection eviction) and never surface at all.

// ── Denial reason constants ─────────────────────────────────────────

/// Caller does not own the session backing the channel.
pub const NOT_SESSION_OWNER: &str = "not the session owner";
/// The resource backing the channel does not exist.
pub const RESOURCE_NOT_FOUND: &str = "resource not found";
/// The authoritative store could not be reached; denied, never allowed.
pub const STORE_UNAVAILABLE: &str = "ownership store unavailable";

/// Errors surfaced by the synchronization layer.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// Channel validation failed; surfaced for the specific channel only
    /// and never aborts the rest of a subscribe batch.
    #[error("access to '{channel}' denied: {reason}")]
    AccessDenied {
        /// The channel that was denied.
        channel: String,
        /// Human-readable denial reason.
        reason: String,
    },

    /// Control payload shape was invalid; surfaced once, no partial
    /// processing.
    #[error("malformed request: {reason}")]
    MalformedRequest {
        /// What was wrong with the payload.
        reason: String,
    },

    /// The authoritative store failed during a lookup. Callers must treat
    /// this as a denial (fail closed).
    #[error("store lookup failed: {reason}")]
    Store {
        /// Underlying failure description.
        reason: String,
    },
}

impl SyncError {
    /// Short machine-readable tag for logs and metrics labels.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::AccessDenied { .. } => "access_denied",
            Self::MalformedRequest { .. } => "malformed_request",
            Self::Store { .. } => "store_error",
        }
    }
}
