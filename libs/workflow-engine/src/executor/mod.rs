//! Step executors: one per `StepType`, dispatched by the orchestrator.

mod ai_generate;
mod approval;
mod conditional;
mod form;

pub use ai_generate::{execute_ai_generate, MAX_RETRIES};
pub use approval::execute_approval;
pub use conditional::execute_conditional;
pub use form::{execute_form, merge_into_runtime, validate_fields};

use glyph_domain::{RunContext, StepConfig, WaitingFor};

use crate::error::ExecutorError;
use crate::provider::AiProvider;

/// Outcome of running one step once: a single result type with an explicit
/// `pause: bool` rather than a family of ad hoc return shapes, so the
/// orchestrator can handle every executor uniformly.
#[derive(Debug, Clone)]
pub struct ExecutionOutcome {
    pub pause: bool,
    pub output: Option<serde_json::Value>,
    pub waiting_for: Option<WaitingFor>,
    pub error: Option<String>,
    pub retry_count: u32,
}

impl ExecutionOutcome {
    #[must_use]
    pub const fn complete(output: serde_json::Value) -> Self {
        Self {
            pause: false,
            output: Some(output),
            waiting_for: None,
            error: None,
            retry_count: 0,
        }
    }

    #[must_use]
    pub const fn waiting(waiting_for: WaitingFor) -> Self {
        Self {
            pause: true,
            output: None,
            waiting_for: Some(waiting_for),
            error: None,
            retry_count: 0,
        }
    }
}

/// Dispatch a step to its executor. `step_id` is needed for the conventional
/// `{step_id}_output`/`{step_id}_approval` runtime keys the orchestrator
/// writes on its behalf.
pub async fn execute_step(
    step_id: &str,
    config: &StepConfig,
    context: &RunContext,
    provider: &dyn AiProvider,
) -> Result<ExecutionOutcome, ExecutorError> {
    match config {
        StepConfig::Form(cfg) => execute_form(cfg),
        StepConfig::Conditional(cfg) => execute_conditional(cfg, context),
        StepConfig::Approval(cfg) => execute_approval(cfg),
        StepConfig::AiGenerate(cfg) => execute_ai_generate(step_id, cfg, context, provider).await,
    }
}
