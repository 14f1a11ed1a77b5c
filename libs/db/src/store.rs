//! Persistence traits for `workflows`, `steps` (folded into the
//! `WorkflowDefinition` the `WorkflowStore` returns), `runs`, and
//! `run_steps`.
//!
//! The engine depends only on these traits, never on a concrete store, so
//! the in-memory implementation can stand in for Postgres in tests and the
//! demo CLI.

use async_trait::async_trait;
use glyph_domain::{Run, RunId, RunStep, WorkflowDefinition, WorkflowId};

use crate::error::StorageError;

/// Read/write access to workflow definitions.
#[async_trait]
pub trait WorkflowStore: Send + Sync {
    /// Load the current (only retained) version of a workflow definition.
    async fn get_workflow(
        &self,
        id: &WorkflowId,
    ) -> Result<Option<WorkflowDefinition>, StorageError>;

    /// Register a workflow definition, either as the first version or as a
    /// new version replacing the prior one (see `DESIGN.md`, Open Question 3).
    async fn put_workflow(&self, workflow: &WorkflowDefinition) -> Result<(), StorageError>;
}

/// Read/write access to runs and their append-only step history.
#[async_trait]
pub trait RunStore: Send + Sync {
    async fn create_run(&self, run: &Run) -> Result<(), StorageError>;

    async fn get_run(&self, id: &RunId) -> Result<Option<Run>, StorageError>;

    /// Global lookup by idempotency key (the column is unique across all
    /// runs, not scoped to a workflow).
    async fn find_run_by_idempotency_key(
        &self,
        key: &str,
    ) -> Result<Option<Run>, StorageError>;

    /// Persist the full current state of a run (status, current_step,
    /// context, updated_at). The Run row is the implicit lock; callers are
    /// expected to have read-compute-written it within a single transaction
    /// scope.
    async fn update_run(&self, run: &Run) -> Result<(), StorageError>;

    /// Append one immutable history record. Never mutates an existing row.
    async fn append_run_step(&self, step: &RunStep) -> Result<(), StorageError>;

    /// Atomically persist one advance-loop iteration's outcome: the run's
    /// new status/current_step/context together with the `RunStep` history
    /// record it produced. One database transaction per call, including the
    /// failure path, which re-attaches the failed-step write to a fresh
    /// transaction after a rollback — from the store's point of view that is
    /// just another call to this same method with a `status: failed` run and
    /// step.
    ///
    /// The default implementation is non-atomic (sequential `update_run` +
    /// `append_run_step`) and exists only so existing single-operation
    /// implementations keep compiling; `InMemoryRunStore` and `PgRunStore`
    /// both override it with a real atomic commit.
    async fn commit_step(&self, run: &Run, step: &RunStep) -> Result<(), StorageError> {
        self.update_run(run).await?;
        self.append_run_step(step).await?;
        Ok(())
    }

    /// All history records for a run, ordered by `started_at`.
    async fn list_run_steps(&self, run_id: &RunId) -> Result<Vec<RunStep>, StorageError>;
}
