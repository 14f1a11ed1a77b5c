//! Error types for the engine and its executors.

use thiserror::Error;

use glyph_domain::{RunId, WorkflowId};

/// Errors a `StepExecutor` can raise while running a single step.
///
/// `Recoverable` is reserved for conditions an executor's own retry loop
/// already understands (currently only `ai_generate`'s bounded retries);
/// everything else that reaches the orchestrator is treated as fatal to
/// the run, per the three error classes in the Error Handling design.
#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("invalid step configuration: {0}")]
    InvalidConfig(String),

    #[error("expression rejected by sandbox: {0}")]
    Security(String),

    #[error("name error: {0}")]
    NameError(String),

    #[error("expression evaluation failed: {0}")]
    Evaluation(String),

    #[error("operation timed out")]
    Timeout,

    #[error("provider call failed: {0}")]
    Provider(String),

    #[error("output failed schema validation: {0}")]
    SchemaInvalid(String),
}

/// Top-level engine error surfaced by `WorkflowOrchestrator` operations.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("workflow not found: {0}")]
    WorkflowNotFound(WorkflowId),

    #[error("run not found: {0}")]
    RunNotFound(RunId),

    #[error("run {0} is not in a state that accepts this operation")]
    Conflict(RunId),

    #[error("invalid workflow definition: {0}")]
    InvalidDefinition(String),

    #[error("invalid resume input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Executor(#[from] ExecutorError),

    #[error(transparent)]
    Storage(#[from] glyph_db::StorageError),
}
