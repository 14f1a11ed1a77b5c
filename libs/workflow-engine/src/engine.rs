//! The orchestrator: the run state machine that drives a workflow from
//! start to completion, one step at a time.
//!
//! `Arc`-held storage, provider, and notification collaborators, one public
//! `impl` block per lifecycle phase, and a private advance loop that walks
//! the graph over a `WorkflowStore`/`RunStore` pair.

use std::sync::Arc;

use chrono::Utc;
use glyph_db::{RunStore, WorkflowStore};
use glyph_domain::{
    ContextLayer, Run, RunId, RunStatus, RunStep, RunStepId, RunStepStatus, StepConfig, StepType,
    WorkflowDefinition, WorkflowId,
};

pub use crate::error::EngineError;
use crate::executor::{self, execute_step, ExecutionOutcome};
use crate::notification::NotificationSink;
use crate::provider::AiProvider;

/// Drives the run state machine: `start_run`, `resume_run`, `cancel_run`,
/// and the read-only `get_*` accessors, all backed by a pair of storage
/// traits so Postgres and the in-memory test double are interchangeable.
pub struct WorkflowOrchestrator {
    workflows: Arc<dyn WorkflowStore>,
    runs: Arc<dyn RunStore>,
    provider: Arc<dyn AiProvider>,
    notifier: Arc<dyn NotificationSink>,
}

impl WorkflowOrchestrator {
    #[must_use]
    pub fn new(
        workflows: Arc<dyn WorkflowStore>,
        runs: Arc<dyn RunStore>,
        provider: Arc<dyn AiProvider>,
        notifier: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            workflows,
            runs,
            provider,
            notifier,
        }
    }

    /// Start a new run of a workflow, optionally deduplicated by an
    /// idempotency key.
    pub async fn start_run(
        &self,
        workflow_id: WorkflowId,
        inputs: ContextLayer,
        idempotency_key: Option<String>,
    ) -> Result<Run, EngineError> {
        if let Some(key) = &idempotency_key {
            if let Some(existing) = self.runs.find_run_by_idempotency_key(key).await? {
                tracing::info!(run_id = %existing.id, %key, "idempotent start returning existing run");
                return Ok(existing);
            }
        }

        let workflow = self
            .workflows
            .get_workflow(&workflow_id)
            .await?
            .ok_or(EngineError::WorkflowNotFound(workflow_id))?;

        let mut run = Run::start(
            workflow_id,
            workflow.version,
            workflow.start_step.clone(),
            glyph_domain::RunContext::from_inputs(inputs),
        );
        run.idempotency_key = idempotency_key;

        self.runs.create_run(&run).await?;
        tracing::info!(run_id = %run.id, %workflow_id, "run started");

        self.advance(&workflow, &mut run).await?;
        Ok(run)
    }

    /// Resume a waiting run with external input for its current step.
    pub async fn resume_run(
        &self,
        run_id: RunId,
        inputs: serde_json::Value,
    ) -> Result<Run, EngineError> {
        let mut run = self
            .runs
            .get_run(&run_id)
            .await?
            .ok_or(EngineError::RunNotFound(run_id))?;

        if run.status != RunStatus::Waiting {
            return Err(EngineError::Conflict(run_id));
        }

        let workflow = self
            .workflows
            .get_workflow(&run.workflow_id)
            .await?
            .ok_or(EngineError::WorkflowNotFound(run.workflow_id))?;

        let step_id = run
            .current_step
            .clone()
            .ok_or_else(|| EngineError::InvalidDefinition("waiting run has no current step".into()))?;
        let step = workflow
            .find_step(&step_id)
            .ok_or_else(|| EngineError::InvalidDefinition(format!("dangling step '{step_id}'")))?;

        match &step.config {
            StepConfig::Form(cfg) => {
                let validated = executor::validate_fields(&cfg.fields, &inputs)
                    .map_err(|e| EngineError::InvalidInput(e.to_string()))?;
                executor::merge_into_runtime(&mut run.context, &validated);
                run.current_step = step.next.clone();
            }
            StepConfig::Approval(_) => {
                apply_approval_decision(&mut run, &step_id, &inputs)?;
                // A rejection records the decision but does not halt the
                // workflow; it simply advances, same as an approval.
                // Downstream conditional steps may branch on
                // `<step_id>_approval.status` but nothing enforces it.
                run.current_step = step.next.clone();
            }
            StepConfig::AiGenerate(_) => {
                // Manual-fix resume: merge the operator's patch into
                // runtime and re-execute the same step (current_step is
                // left unchanged) rather than advancing past it.
                let serde_json::Value::Object(map) = inputs else {
                    return Err(EngineError::InvalidInput(
                        "ai_generate resume payload must be an object".into(),
                    ));
                };
                for (key, value) in map {
                    run.context.runtime.insert(key, value.into());
                }
            }
            StepConfig::Conditional(_) => {
                // Conditional steps never pause, so a waiting run can never
                // be parked here; reaching this arm means the persisted
                // state is inconsistent.
                return Err(EngineError::InvalidDefinition(format!(
                    "step '{step_id}' is conditional and cannot be resumed"
                )));
            }
        }

        run.status = RunStatus::Running;
        run.updated_at = Utc::now();
        self.runs.update_run(&run).await?;

        self.advance(&workflow, &mut run).await?;
        Ok(run)
    }

    /// Cancel a run. Observed only at the advance loop's next commit point:
    /// an in-flight executor call is never interrupted, so cancellation here
    /// only ever applies between steps, matching a run that is currently
    /// `running` (about to start its next iteration) or `waiting` (paused,
    /// no iteration in flight at all).
    pub async fn cancel_run(&self, run_id: RunId) -> Result<Run, EngineError> {
        let mut run = self
            .runs
            .get_run(&run_id)
            .await?
            .ok_or(EngineError::RunNotFound(run_id))?;

        if !RunStatus::can_transition(run.status, RunStatus::Canceled) {
            return Err(EngineError::Conflict(run_id));
        }

        run.status = RunStatus::Canceled;
        run.updated_at = Utc::now();
        self.runs.update_run(&run).await?;
        tracing::info!(run_id = %run.id, "run canceled");
        Ok(run)
    }

    pub async fn get_run(&self, run_id: RunId) -> Result<Run, EngineError> {
        self.runs
            .get_run(&run_id)
            .await?
            .ok_or(EngineError::RunNotFound(run_id))
    }

    /// All history records for a run, ordered by `started_at`.
    pub async fn get_history(&self, run_id: RunId) -> Result<Vec<RunStep>, EngineError> {
        // Surface NotFound for an unknown run rather than an empty history.
        self.get_run(run_id).await?;
        Ok(self.runs.list_run_steps(&run_id).await?)
    }

    /// The current run context, merged across all three layers by the caller
    /// if needed.
    pub async fn get_context(&self, run_id: RunId) -> Result<glyph_domain::RunContext, EngineError> {
        Ok(self.get_run(run_id).await?.context)
    }

    /// The advance loop: execute one step per iteration until the run
    /// pauses, completes, or fails. `run` is mutated in place and its final
    /// state is also what's durably persisted.
    async fn advance(
        &self,
        workflow: &WorkflowDefinition,
        run: &mut Run,
    ) -> Result<(), EngineError> {
        while let Some(step_id) = run.current_step.clone() {
            let Some(step) = workflow.find_step(&step_id) else {
                run.status = RunStatus::Failed;
                run.updated_at = Utc::now();
                let failure = RunStep {
                    id: RunStepId::new(),
                    run_id: run.id,
                    step_id: step_id.clone(),
                    step_type: StepType::Conditional, // placeholder; the real step def is gone
                    status: RunStepStatus::Failed,
                    output: None,
                    error: Some(format!("dangling next-step reference '{step_id}'")),
                    started_at: run.updated_at,
                    ended_at: run.updated_at,
                };
                self.runs.commit_step(run, &failure).await?;
                return Err(EngineError::InvalidDefinition(format!(
                    "dangling next-step reference '{step_id}'"
                )));
            };

            let started_at = Utc::now();
            match execute_step(&step_id, &step.config, &run.context, self.provider.as_ref()).await {
                Ok(outcome) => {
                    self.record_runtime_output(run, &step_id, step.step_type, &outcome);

                    let ended_at = Utc::now();
                    let history = RunStep {
                        id: RunStepId::new(),
                        run_id: run.id,
                        step_id: step_id.clone(),
                        step_type: step.step_type,
                        status: RunStepStatus::Completed,
                        output: outcome.output.clone(),
                        error: outcome.error.clone(),
                        started_at,
                        ended_at,
                    };

                    if outcome.pause {
                        run.status = RunStatus::Waiting;
                        run.updated_at = ended_at;
                        self.runs.commit_step(run, &history).await?;
                        tracing::info!(run_id = %run.id, step_id, waiting_for = ?outcome.waiting_for, "run paused");

                        if let StepConfig::Approval(cfg) = &step.config {
                            self.notify_approvers(&outcome, cfg).await;
                        }
                        return Ok(());
                    }

                    run.current_step = step.next.clone();
                    run.updated_at = ended_at;
                    self.runs.commit_step(run, &history).await?;
                    tracing::info!(run_id = %run.id, step_id, next = ?run.current_step, "step completed");
                }
                Err(e) => {
                    let ended_at = Utc::now();
                    let failure = RunStep {
                        id: RunStepId::new(),
                        run_id: run.id,
                        step_id: step_id.clone(),
                        step_type: step.step_type,
                        status: RunStepStatus::Failed,
                        output: None,
                        error: Some(e.to_string()),
                        started_at,
                        ended_at,
                    };
                    run.status = RunStatus::Failed;
                    run.updated_at = ended_at;
                    self.runs.commit_step(run, &failure).await?;
                    tracing::error!(run_id = %run.id, step_id, error = %e, "step failed, run failed");
                    return Err(EngineError::Executor(e));
                }
            }
        }

        run.status = RunStatus::Completed;
        run.updated_at = Utc::now();
        self.runs.update_run(run).await?;
        tracing::info!(run_id = %run.id, "run completed");
        Ok(())
    }

    /// Write the conventional `<step_id>_schema` / `<step_id>_approval` /
    /// `<step_id>_output` runtime keys (GLOSSARY: "Step output key").
    /// Conditional steps write nothing to runtime; their result lives only
    /// in the `RunStep` history record.
    fn record_runtime_output(
        &self,
        run: &mut Run,
        step_id: &str,
        step_type: StepType,
        outcome: &ExecutionOutcome,
    ) {
        let Some(output) = &outcome.output else { return };
        let key = match step_type {
            StepType::Form => Some(format!("{step_id}_schema")),
            StepType::Approval => Some(format!("{step_id}_approval")),
            StepType::AiGenerate if !outcome.pause => Some(format!("{step_id}_output")),
            _ => None,
        };
        if let Some(key) = key {
            run.context.runtime.insert(key, output.clone().into());
        }
    }

    async fn notify_approvers(&self, outcome: &ExecutionOutcome, cfg: &glyph_domain::ApprovalConfig) {
        let token = outcome
            .output
            .as_ref()
            .and_then(|o| o.get("token"))
            .and_then(serde_json::Value::as_str)
            .unwrap_or_default();
        let url = format!("/approvals/{token}");
        for approver in &cfg.approvers {
            self.notifier.notify(approver, &url).await;
        }
    }
}

/// Apply an approval resume payload: require `inputs.approval.approved:
/// bool`, optional `comments: string`, and update
/// `context.runtime[<step_id>_approval]` in place.
fn apply_approval_decision(
    run: &mut Run,
    step_id: &str,
    inputs: &serde_json::Value,
) -> Result<(), EngineError> {
    let approval = inputs
        .get("approval")
        .and_then(serde_json::Value::as_object)
        .ok_or_else(|| EngineError::InvalidInput("missing 'approval' object".into()))?;

    let approved = approval
        .get("approved")
        .and_then(serde_json::Value::as_bool)
        .ok_or_else(|| EngineError::InvalidInput("'approval.approved' must be a bool".into()))?;

    let comments = approval
        .get("comments")
        .and_then(serde_json::Value::as_str)
        .map(str::to_string);

    let key = format!("{step_id}_approval");
    let glyph_domain::ContextValue::Map(record) = run
        .context
        .runtime
        .get_mut(&key)
        .ok_or_else(|| EngineError::InvalidInput(format!("missing '{key}' in runtime context")))?
    else {
        return Err(EngineError::InvalidInput(format!("'{key}' is not an object")));
    };

    let status = if approved { "approved" } else { "rejected" };
    record.insert(
        "status".to_string(),
        glyph_domain::ContextValue::String(status.to_string()),
    );
    if let Some(comments) = comments {
        record.insert(
            "comments".to_string(),
            glyph_domain::ContextValue::String(comments),
        );
    }

    Ok(())
}
