//! `Run` and `RunStep` — the execution-time entities owned by the engine.

use serde::{Deserialize, Serialize};

use crate::context::RunContext;
use crate::enums::{RunStatus, RunStepStatus};
use crate::ids::{RunId, RunStepId, WorkflowId};

/// A single execution instance of a workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Run {
    pub id: RunId,
    pub workflow_id: WorkflowId,
    /// Snapshot of `workflow.version` at the moment the run was started.
    pub workflow_version: i32,
    pub status: RunStatus,
    /// `None` only while terminal (completed); non-empty while running or
    /// waiting on the step it is paused at.
    pub current_step: Option<String>,
    pub context: RunContext,
    pub idempotency_key: Option<String>,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl Run {
    /// Construct a fresh run in the `running` state at `start_step`, per
    /// `StartRun`'s creation step.
    #[must_use]
    pub fn start(
        workflow_id: WorkflowId,
        workflow_version: i32,
        start_step: String,
        context: RunContext,
    ) -> Self {
        let now = chrono::Utc::now();
        Self {
            id: RunId::new(),
            workflow_id,
            workflow_version,
            status: RunStatus::Running,
            current_step: Some(start_step),
            context,
            idempotency_key: None,
            started_at: now,
            updated_at: now,
        }
    }
}

/// An append-only execution-history record for one step of one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunStep {
    pub id: RunStepId,
    pub run_id: RunId,
    pub step_id: String,
    pub step_type: crate::enums::StepType,
    pub status: RunStepStatus,
    pub output: Option<serde_json::Value>,
    pub error: Option<String>,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub ended_at: chrono::DateTime<chrono::Utc>,
}
