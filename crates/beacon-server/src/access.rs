//! Channel access validation.
//!
//! Subscriptions are permission-gated: a channel name resolves to a
//! resource, and the caller must pass that resource's ownership rule
//! before the registry ever sees the subscribe. Any failure to look the
//! resource up is a denial, never an allow — fail closed.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use beacon_core::channel::{Channel, ChannelKind};
use beacon_core::errors::{self, SyncError};
use beacon_core::ids::ProjectId;
use metrics::counter;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Authenticated identity of a caller. Authentication itself happens
/// upstream; this layer only consumes the result.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CallerIdentity(String);

impl CallerIdentity {
    /// The identity as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for CallerIdentity {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<String> for CallerIdentity {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for CallerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Outcome of validating one channel for one caller.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AccessDecision {
    /// Subscription may proceed.
    Allowed,
    /// Subscription refused.
    Denied {
        /// Why, surfaced to the client in the `subscription_error` ack.
        reason: String,
    },
}

impl AccessDecision {
    /// Whether this decision allows the subscription.
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed)
    }

    fn denied(reason: impl Into<String>) -> Self {
        Self::Denied {
            reason: reason.into(),
        }
    }
}

/// The authoritative store, as seen by the validator. One synchronous
/// lookup per call; implementations live next to the persistence layer.
#[async_trait]
pub trait OwnershipStore: Send + Sync {
    /// The owner of a session, or `None` if the session does not exist.
    async fn session_owner(&self, session_id: &str) -> Result<Option<String>, SyncError>;

    /// Whether a project exists.
    async fn project_exists(&self, project_id: &str) -> Result<bool, SyncError>;

    /// The project owning a run, or `None` if the run does not exist.
    async fn run_project(&self, run_id: &str) -> Result<Option<ProjectId>, SyncError>;
}

/// Validates channel subscriptions against the authoritative store.
pub struct AccessValidator {
    store: Arc<dyn OwnershipStore>,
}

impl AccessValidator {
    /// Create a validator backed by the given store.
    pub fn new(store: Arc<dyn OwnershipStore>) -> Self {
        Self { store }
    }

    /// Validate a raw channel string: parse, then apply the resource rule.
    pub async fn validate_raw(&self, raw: &str, caller: &CallerIdentity) -> AccessDecision {
        match Channel::parse(raw) {
            Ok(channel) => self.validate(&channel, caller).await,
            Err(err) => {
                debug!(channel = raw, error = %err, "rejecting unparseable channel");
                AccessDecision::denied(err.to_string())
            }
        }
    }

    /// Validate a parsed channel for a caller.
    ///
    /// - `session` — allowed iff the session's owner equals the caller.
    /// - `terminal` — delegates to session ownership (terminals are keyed
    ///   by session id).
    /// - `project` — allowed iff the project exists. Ownership here is
    ///   intentionally permissive for single-tenant deployments and must
    ///   be tightened to real ownership for multi-tenant.
    /// - `run` — the run's owning project must exist (same single-tenant
    ///   posture as `project`).
    pub async fn validate(&self, channel: &Channel, caller: &CallerIdentity) -> AccessDecision {
        let decision = match channel.kind {
            ChannelKind::Session | ChannelKind::Terminal => {
                self.check_session_owner(&channel.id, caller).await
            }
            ChannelKind::Project => self.check_project_exists(&channel.id).await,
            ChannelKind::Run => self.check_run_project(&channel.id).await,
        };
        if let AccessDecision::Denied { ref reason } = decision {
            counter!("subscriptions_denied_total", "resource" => channel.kind.as_str())
                .increment(1);
            debug!(channel = %channel, caller = %caller, reason, "subscription denied");
        }
        decision
    }

    async fn check_session_owner(&self, session_id: &str, caller: &CallerIdentity) -> AccessDecision {
        match self.store.session_owner(session_id).await {
            Ok(Some(owner)) if owner == caller.as_str() => AccessDecision::Allowed,
            Ok(Some(_)) => AccessDecision::denied(errors::NOT_SESSION_OWNER),
            Ok(None) => AccessDecision::denied(errors::RESOURCE_NOT_FOUND),
            Err(err) => store_failure(err),
        }
    }

    async fn check_project_exists(&self, project_id: &str) -> AccessDecision {
        match self.store.project_exists(project_id).await {
            Ok(true) => AccessDecision::Allowed,
            Ok(false) => AccessDecision::denied(errors::RESOURCE_NOT_FOUND),
            Err(err) => store_failure(err),
        }
    }

    async fn check_run_project(&self, run_id: &str) -> AccessDecision {
        match self.store.run_project(run_id).await {
            Ok(Some(project_id)) => self.check_project_exists(&project_id).await,
            Ok(None) => AccessDecision::denied(errors::RESOURCE_NOT_FOUND),
            Err(err) => store_failure(err),
        }
    }
}

/// A store lookup failed: deny, never allow.
fn store_failure(err: SyncError) -> AccessDecision {
    warn!(error = %err, "ownership lookup failed, denying");
    AccessDecision::denied(errors::STORE_UNAVAILABLE)
}

/// In-memory ownership store for tests and the dev binary.
#[derive(Default)]
pub struct InMemoryOwnershipStore {
    sessions: RwLock<HashMap<String, String>>,
    projects: RwLock<HashSet<String>>,
    runs: RwLock<HashMap<String, String>>,
    unavailable: AtomicBool,
}

impl InMemoryOwnershipStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a session and its owner.
    pub fn add_session(&self, session_id: &str, owner: &str) {
        let _ = self
            .sessions
            .write()
            .insert(session_id.to_owned(), owner.to_owned());
    }

    /// Record a project.
    pub fn add_project(&self, project_id: &str) {
        let _ = self.projects.write().insert(project_id.to_owned());
    }

    /// Record a run under a project.
    pub fn add_run(&self, run_id: &str, project_id: &str) {
        let _ = self
            .runs
            .write()
            .insert(run_id.to_owned(), project_id.to_owned());
    }

    /// Make every lookup fail, simulating an unreachable store.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::Relaxed);
    }

    fn check_available(&self) -> Result<(), SyncError> {
        if self.unavailable.load(Ordering::Relaxed) {
            Err(SyncError::Store {
                reason: "store unavailable".into(),
            })
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl OwnershipStore for InMemoryOwnershipStore {
    async fn session_owner(&self, session_id: &str) -> Result<Option<String>, SyncError> {
        self.check_available()?;
        Ok(self.sessions.read().get(session_id).cloned())
    }

    async fn project_exists(&self, project_id: &str) -> Result<bool, SyncError> {
        self.check_available()?;
        Ok(self.projects.read().contains(project_id))
    }

    async fn run_project(&self, run_id: &str) -> Result<Option<ProjectId>, SyncError> {
        self.check_available()?;
        Ok(self.runs.read().get(run_id).cloned().map(ProjectId::from))
    }
}
