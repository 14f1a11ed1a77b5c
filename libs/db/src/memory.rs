//! In-memory store implementations used by tests and the demo CLI.
//!
//! A `Mutex`-guarded map standing in for the real backing store, with
//! identical trait semantics.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use glyph_domain::{Run, RunId, RunStep, WorkflowDefinition, WorkflowId};

use crate::error::StorageError;
use crate::store::{RunStore, WorkflowStore};

/// In-memory workflow definition store. Only the latest version per
/// `WorkflowId` is retained; prior versions are discarded on `put_workflow`.
#[derive(Default)]
pub struct InMemoryWorkflowStore {
    workflows: Mutex<HashMap<WorkflowId, WorkflowDefinition>>,
}

impl InMemoryWorkflowStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl WorkflowStore for InMemoryWorkflowStore {
    async fn get_workflow(
        &self,
        id: &WorkflowId,
    ) -> Result<Option<WorkflowDefinition>, StorageError> {
        Ok(self.workflows.lock().unwrap().get(id).cloned())
    }

    async fn put_workflow(&self, workflow: &WorkflowDefinition) -> Result<(), StorageError> {
        self.workflows
            .lock()
            .unwrap()
            .insert(workflow.id, workflow.clone());
        Ok(())
    }
}

/// In-memory run + run-step store.
#[derive(Default)]
pub struct InMemoryRunStore {
    runs: Mutex<HashMap<RunId, Run>>,
    steps: Mutex<HashMap<RunId, Vec<RunStep>>>,
}

impl InMemoryRunStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RunStore for InMemoryRunStore {
    async fn create_run(&self, run: &Run) -> Result<(), StorageError> {
        self.runs.lock().unwrap().insert(run.id, run.clone());
        Ok(())
    }

    async fn get_run(&self, id: &RunId) -> Result<Option<Run>, StorageError> {
        Ok(self.runs.lock().unwrap().get(id).cloned())
    }

    async fn find_run_by_idempotency_key(
        &self,
        key: &str,
    ) -> Result<Option<Run>, StorageError> {
        Ok(self
            .runs
            .lock()
            .unwrap()
            .values()
            .find(|r| r.idempotency_key.as_deref() == Some(key))
            .cloned())
    }

    async fn update_run(&self, run: &Run) -> Result<(), StorageError> {
        self.runs.lock().unwrap().insert(run.id, run.clone());
        Ok(())
    }

    async fn append_run_step(&self, step: &RunStep) -> Result<(), StorageError> {
        self.steps
            .lock()
            .unwrap()
            .entry(step.run_id)
            .or_default()
            .push(step.clone());
        Ok(())
    }

    async fn list_run_steps(&self, run_id: &RunId) -> Result<Vec<RunStep>, StorageError> {
        let mut steps = self
            .steps
            .lock()
            .unwrap()
            .get(run_id)
            .cloned()
            .unwrap_or_default();
        steps.sort_by_key(|s| s.started_at);
        Ok(steps)
    }

    async fn commit_step(&self, run: &Run, step: &RunStep) -> Result<(), StorageError> {
        // Single-process and guarded by two independent mutexes rather than
        // a real transaction, but the advance loop only ever holds one run
        // in flight at a time, so this is observably atomic to callers.
        self.runs.lock().unwrap().insert(run.id, run.clone());
        self.steps
            .lock()
            .unwrap()
            .entry(step.run_id)
            .or_default()
            .push(step.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glyph_domain::{ContextLayer, RunContext};

    #[tokio::test]
    async fn run_round_trips_through_store() {
        let store = InMemoryRunStore::new();
        let run = Run::start(
            WorkflowId::new(),
            1,
            "start".to_string(),
            RunContext::from_inputs(ContextLayer::new()),
        );
        store.create_run(&run).await.unwrap();

        let loaded = store.get_run(&run.id).await.unwrap().unwrap();
        assert_eq!(loaded.id, run.id);
    }

    #[tokio::test]
    async fn idempotency_key_lookup_finds_existing_run() {
        let store = InMemoryRunStore::new();
        let mut run = Run::start(
            WorkflowId::new(),
            1,
            "start".to_string(),
            RunContext::from_inputs(ContextLayer::new()),
        );
        run.idempotency_key = Some("k".to_string());
        store.create_run(&run).await.unwrap();

        let found = store.find_run_by_idempotency_key("k").await.unwrap();
        assert_eq!(found.unwrap().id, run.id);

        let missing = store.find_run_by_idempotency_key("other").await.unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn run_steps_are_returned_in_started_at_order() {
        let store = InMemoryRunStore::new();
        let run_id = RunId::new();
        let base = chrono::Utc::now();

        for (i, step_id) in ["b", "a"].into_iter().enumerate() {
            let step = RunStep {
                id: glyph_domain::RunStepId::new(),
                run_id,
                step_id: step_id.to_string(),
                step_type: glyph_domain::StepType::Conditional,
                status: glyph_domain::RunStepStatus::Completed,
                output: None,
                error: None,
                started_at: base + chrono::Duration::seconds(i as i64),
                ended_at: base + chrono::Duration::seconds(i as i64),
            };
            store.append_run_step(&step).await.unwrap();
        }

        let steps = store.list_run_steps(&run_id).await.unwrap();
        assert_eq!(steps.len(), 2);
        assert!(steps[0].started_at <= steps[1].started_at);
    }
}
