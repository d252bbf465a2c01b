//! Workflow-run state: runs, steps, events, artifacts, and the
//! partial-field patches that travel on the wire.
//!
//! Steps, events, and artifacts are append-only collections identified by
//! id. Updates are patches keyed by id, never full replacement, so a patch
//! can never clobber concurrently-appended siblings. Patch structs use
//! `Option` fields throughout: the wire omits unchanged fields to keep
//! payloads small, and an absent field leaves the target untouched.

use serde::{Deserialize, Serialize};

/// Lifecycle state of a run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    /// Created, not yet started.
    Pending,
    /// Executing.
    Running,
    /// Finished successfully.
    Completed,
    /// Finished with an error.
    Failed,
    /// Stopped by the user.
    Cancelled,
}

/// Lifecycle state of a step within a run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    /// Waiting on earlier steps.
    Pending,
    /// Executing.
    Running,
    /// Finished successfully.
    Completed,
    /// Finished with an error.
    Failed,
    /// Never ran because the run stopped.
    Skipped,
}

/// Full detail view of one workflow run, as cached client-side.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunDetail {
    /// Run id.
    pub id: String,
    /// Owning project.
    pub project_id: String,
    /// Current lifecycle state.
    pub status: RunStatus,
    /// Phase label while running.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_phase: Option<String>,
    /// Failure description when `status == Failed`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Creation timestamp (RFC 3339).
    pub created_at: String,
    /// Last-modified timestamp (RFC 3339).
    pub updated_at: String,
    /// Steps, in creation order.
    #[serde(default)]
    pub steps: Vec<RunStep>,
    /// Execution events, in creation order.
    #[serde(default)]
    pub events: Vec<RunEvent>,
    /// Artifacts, in creation order (flat view; artifacts also nest under
    /// their parent step or event).
    #[serde(default)]
    pub artifacts: Vec<RunArtifact>,
}

/// One step of a run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunStep {
    /// Step id.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Current lifecycle state.
    pub status: StepStatus,
    /// Phase this step belongs to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase: Option<String>,
    /// When execution began (RFC 3339).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<String>,
    /// When execution finished (RFC 3339).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<String>,
    /// Failure description when `status == Failed`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Artifacts attached to this step.
    #[serde(default)]
    pub artifacts: Vec<RunArtifact>,
}

/// One execution event of a run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunEvent {
    /// Event id.
    pub id: String,
    /// Step this event belongs to, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step_id: Option<String>,
    /// Severity/category label (`info`, `warning`, `error`, ...).
    pub level: String,
    /// Event text.
    pub message: String,
    /// When it happened (RFC 3339).
    pub timestamp: String,
    /// Artifacts attached to this event.
    #[serde(default)]
    pub artifacts: Vec<RunArtifact>,
}

/// An artifact produced during a run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunArtifact {
    /// Artifact id.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Content kind (`file`, `diff`, `log`, ...).
    pub kind: String,
    /// Where the content lives.
    pub uri: String,
    /// Parent event, if this artifact was attached to one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
    /// Parent step, if this artifact was attached to one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step_id: Option<String>,
    /// Creation timestamp (RFC 3339).
    pub created_at: String,
}

/// Partial-field patch of a run. Absent fields leave the target untouched.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunPatch {
    /// New lifecycle state.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<RunStatus>,
    /// New phase label.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_phase: Option<String>,
    /// New failure description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// New last-modified timestamp.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

impl RunPatch {
    /// Shallow-merge present fields into `run`; absent fields are left
    /// untouched.
    pub fn apply_to(&self, run: &mut RunDetail) {
        if let Some(status) = self.status {
            run.status = status;
        }
        if let Some(ref phase) = self.current_phase {
            run.current_phase = Some(phase.clone());
        }
        if let Some(ref msg) = self.error_message {
            run.error_message = Some(msg.clone());
        }
        if let Some(ref at) = self.updated_at {
            run.updated_at = at.clone();
        }
    }
}

/// Partial-field patch of a step, keyed by `id`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepPatch {
    /// Which step to patch.
    pub id: String,
    /// New lifecycle state.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<StepStatus>,
    /// New start timestamp.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<String>,
    /// New completion timestamp.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<String>,
    /// New failure description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl StepPatch {
    /// Shallow-merge present fields into `step`.
    pub fn apply_to(&self, step: &mut RunStep) {
        if let Some(status) = self.status {
            step.status = status;
        }
        if let Some(ref at) = self.started_at {
            step.started_at = Some(at.clone());
        }
        if let Some(ref at) = self.completed_at {
            step.completed_at = Some(at.clone());
        }
        if let Some(ref msg) = self.error_message {
            step.error_message = Some(msg.clone());
        }
    }
}
