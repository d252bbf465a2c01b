//! Typed event producers.
//!
//! Domain code never touches the registry directly: producers construct
//! the typed event, normalize the timestamp and payload shape, and hand it
//! to the registry for fan-out. Every payload carries the resource id so
//! receivers can route the patch to the correct cached entity.

use std::sync::Arc;

use beacon_core::channel::Channel;
use beacon_core::events::{ChannelEvent, EventType};
use beacon_core::ids::{RunId, SessionId};
use beacon_core::message::ContentBlock;
use beacon_core::run::{RunArtifact, RunEvent, RunPatch, RunStep, StepPatch};
use serde_json::json;
use tracing::debug;

use crate::websocket::registry::ChannelRegistry;

/// Broadcasts typed domain events through the channel registry.
#[derive(Clone)]
pub struct EventPublisher {
    registry: Arc<ChannelRegistry>,
}

impl EventPublisher {
    /// Create a publisher over the given registry.
    pub fn new(registry: Arc<ChannelRegistry>) -> Self {
        Self { registry }
    }

    fn emit(&self, event: &ChannelEvent) {
        debug!(channel = %event.channel, event_type = %event.event_type, "publishing");
        self.registry.broadcast(event);
    }

    // ── Session producers ───────────────────────────────────────────

    /// Cumulative content for a streaming assistant message.
    pub fn message_stream_chunk(
        &self,
        session_id: &SessionId,
        message_id: &str,
        content: &[ContentBlock],
    ) {
        self.emit(&ChannelEvent::new(
            Channel::session(session_id).to_string(),
            EventType::MessageStreamChunk,
            json!({
                "sessionId": session_id.as_str(),
                "messageId": message_id,
                "content": content,
            }),
        ));
    }

    /// The in-flight turn finished; clients flip streaming flags and
    /// re-run enrichment.
    pub fn turn_completed(&self, session_id: &SessionId) {
        self.emit(&ChannelEvent::new(
            Channel::session(session_id).to_string(),
            EventType::TurnCompleted,
            json!({ "sessionId": session_id.as_str() }),
        ));
    }

    /// Session metadata changed (title, status, activity).
    pub fn session_updated(&self, session_id: &SessionId, patch: serde_json::Value) {
        self.emit(&ChannelEvent::new(
            Channel::session(session_id).to_string(),
            EventType::SessionUpdated,
            json!({ "sessionId": session_id.as_str(), "patch": patch }),
        ));
    }

    // ── Workflow-run producers ──────────────────────────────────────

    /// Partial-field patch of a run.
    pub fn run_updated(&self, run_id: &RunId, patch: &RunPatch) {
        self.emit(&ChannelEvent::new(
            Channel::run(run_id).to_string(),
            EventType::RunUpdated,
            json!({ "runId": run_id.as_str(), "patch": patch }),
        ));
    }

    /// A step was appended to a run.
    pub fn step_created(&self, run_id: &RunId, step: &RunStep) {
        self.emit(&ChannelEvent::new(
            Channel::run(run_id).to_string(),
            EventType::StepCreated,
            json!({ "runId": run_id.as_str(), "step": step }),
        ));
    }

    /// Partial-field patch of one step.
    pub fn step_updated(&self, run_id: &RunId, patch: &StepPatch) {
        self.emit(&ChannelEvent::new(
            Channel::run(run_id).to_string(),
            EventType::StepUpdated,
            json!({ "runId": run_id.as_str(), "patch": patch }),
        ));
    }

    /// An execution event was appended to a run.
    pub fn event_created(&self, run_id: &RunId, event: &RunEvent) {
        self.emit(&ChannelEvent::new(
            Channel::run(run_id).to_string(),
            EventType::EventCreated,
            json!({ "runId": run_id.as_str(), "event": event }),
        ));
    }

    /// An artifact was appended to a run.
    pub fn artifact_created(&self, run_id: &RunId, artifact: &RunArtifact) {
        self.emit(&ChannelEvent::new(
            Channel::run(run_id).to_string(),
            EventType::ArtifactCreated,
            json!({ "runId": run_id.as_str(), "artifact": artifact }),
        ));
    }
}
