//! Incremental workflow-run state application.
//!
//! Run detail views are patched in place from typed events; list views are
//! refreshed via invalidation instead and never patched incrementally.

use beacon_core::events::{ChannelEvent, EventType};
use beacon_core::run::{RunArtifact, RunDetail, RunEvent, RunPatch, RunStep, StepPatch};
use tracing::{debug, warn};

/// A typed incremental update to one run.
#[derive(Clone, Debug, PartialEq)]
pub enum RunUpdate {
    /// Partial-field patch of the run itself.
    RunUpdated {
        /// Target run.
        run_id: String,
        /// Fields to merge.
        patch: RunPatch,
    },
    /// A new step.
    StepCreated {
        /// Target run.
        run_id: String,
        /// The step.
        step: RunStep,
    },
    /// Partial-field patch of one step.
    StepUpdated {
        /// Target run.
        run_id: String,
        /// Fields to merge, keyed by step id.
        patch: StepPatch,
    },
    /// A new execution event.
    EventCreated {
        /// Target run.
        run_id: String,
        /// The event.
        event: RunEvent,
    },
    /// A new artifact.
    ArtifactCreated {
        /// Target run.
        run_id: String,
        /// The artifact.
        artifact: RunArtifact,
    },
}

impl RunUpdate {
    /// The run this update targets.
    pub fn run_id(&self) -> &str {
        match self {
            Self::RunUpdated { run_id, .. }
            | Self::StepCreated { run_id, .. }
            | Self::StepUpdated { run_id, .. }
            | Self::EventCreated { run_id, .. }
            | Self::ArtifactCreated { run_id, .. } => run_id,
        }
    }

    /// Decode a broadcast event into a typed run update.
    ///
    /// Returns `None` for event types that are not run updates, and for
    /// payloads that do not decode — a malformed broadcast degrades to
    /// "this one patch did not happen", never a crash.
    pub fn from_channel_event(event: &ChannelEvent) -> Option<Self> {
        let run_id = event.data.get("runId")?.as_str()?.to_owned();
        let decoded = match event.event_type {
            EventType::RunUpdated => {
                serde_json::from_value(event.data.get("patch")?.clone())
                    .map(|patch| Self::RunUpdated { run_id, patch })
            }
            EventType::StepCreated => {
                serde_json::from_value(event.data.get("step")?.clone())
                    .map(|step| Self::StepCreated { run_id, step })
            }
            EventType::StepUpdated => {
                serde_json::from_value(event.data.get("patch")?.clone())
                    .map(|patch| Self::StepUpdated { run_id, patch })
            }
            EventType::EventCreated => {
                serde_json::from_value(event.data.get("event")?.clone())
                    .map(|event| Self::EventCreated { run_id, event })
            }
            EventType::ArtifactCreated => {
                serde_json::from_value(event.data.get("artifact")?.clone())
                    .map(|artifact| Self::ArtifactCreated { run_id, artifact })
            }
            _ => return None,
        };
        match decoded {
            Ok(update) => Some(update),
            Err(e) => {
                warn!(event_type = %event.event_type, error = %e, "undecodable run update payload");
                None
            }
        }
    }
}

/// Apply one typed update to a cached run detail as a minimal patch.
///
/// - run-updated: shallow-merge only the fields present in the patch.
/// - step-created: append unless a step with that id already exists
///   (exactly-once under at-least-once delivery).
/// - step-updated: patch the matching step, leave the others untouched.
/// - event-created / artifact-created: append to the flat collection; an
///   artifact referencing a parent event or step is also appended into
///   that parent's nested collection so both views stay consistent.
pub fn apply_run_update(run: &mut RunDetail, update: &RunUpdate) {
    match update {
        RunUpdate::RunUpdated { patch, .. } => patch.apply_to(run),
        RunUpdate::StepCreated { step, .. } => {
            if run.steps.iter().any(|s| s.id == step.id) {
                debug!(step_id = %step.id, "step already present, ignoring duplicate create");
            } else {
                run.steps.push(step.clone());
            }
        }
        RunUpdate::StepUpdated { patch, .. } => {
            if let Some(step) = run.steps.iter_mut().find(|s| s.id == patch.id) {
                patch.apply_to(step);
            } else {
                debug!(step_id = %patch.id, "step-updated for unknown step, ignoring");
            }
        }
        RunUpdate::EventCreated { event, .. } => run.events.push(event.clone()),
        RunUpdate::ArtifactCreated { artifact, .. } => {
            if let Some(ref event_id) = artifact.event_id {
                if let Some(parent) = run.events.iter_mut().find(|e| &e.id == event_id) {
                    parent.artifacts.push(artifact.clone());
                }
            }
            if let Some(ref step_id) = artifact.step_id {
                if let Some(parent) = run.steps.iter_mut().find(|s| &s.id == step_id) {
                    parent.artifacts.push(artifact.clone());
                }
            }
            run.artifacts.push(artifact.clone());
        }
    }
}
