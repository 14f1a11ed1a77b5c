//! AI-generate step executor.
//!
//! Resolve variables, call the provider, validate the result against a
//! JSON Schema, retry a bounded number of times, and fall back to a
//! manual-fix pause when the budget is exhausted.

use glyph_domain::{AiGenerateConfig, RunContext};
use serde_json::json;

use super::ExecutionOutcome;
use crate::error::ExecutorError;
use crate::provider::AiProvider;

/// Number of retries after the first attempt (3 attempts total).
pub const MAX_RETRIES: u32 = 2;

/// Run an `ai_generate` step.
///
/// `step_id` is used only to read/write the conventional
/// `<step_id>_output` runtime key.
pub async fn execute_ai_generate(
    step_id: &str,
    config: &AiGenerateConfig,
    context: &RunContext,
    provider: &dyn AiProvider,
) -> Result<ExecutionOutcome, ExecutorError> {
    let variables = resolve_variables(config, context)?;

    let mut last_error: Option<String> = None;
    for attempt in 0..=MAX_RETRIES {
        match provider.generate(&config.template_id, &variables, &config.json_schema).await {
            Ok(output) => match validate_against_schema(&config.json_schema, &output) {
                Ok(()) => {
                    tracing::info!(step_id, attempt, "ai_generate produced valid output");
                    return Ok(ExecutionOutcome {
                        pause: false,
                        output: Some(output),
                        waiting_for: None,
                        error: None,
                        retry_count: attempt,
                    });
                }
                Err(e) => {
                    tracing::warn!(step_id, attempt, error = %e, "ai_generate output failed schema validation");
                    last_error = Some(e.to_string());
                }
            },
            Err(e) => {
                tracing::warn!(step_id, attempt, error = %e, "ai_generate provider call failed");
                last_error = Some(e.to_string());
            }
        }
    }

    let error = last_error.unwrap_or_else(|| "unknown provider failure".to_string());
    let mut outcome = ExecutionOutcome::waiting(glyph_domain::WaitingFor::ManualFix);
    outcome.error = Some(error.clone());
    outcome.retry_count = MAX_RETRIES;
    outcome.output = Some(json!({ "error": error, "retry_count": MAX_RETRIES }));
    Ok(outcome)
}

/// Resolve each configured variable name against `static`, then `profile`,
/// then `runtime`. A missing name is `Invalid`, not a pause.
fn resolve_variables(
    config: &AiGenerateConfig,
    context: &RunContext,
) -> Result<serde_json::Value, ExecutorError> {
    let mut resolved = serde_json::Map::new();
    for name in &config.variables {
        let value = context.resolve_variable(name).ok_or_else(|| {
            ExecutorError::InvalidConfig(format!("variable '{name}' not found in context"))
        })?;
        resolved.insert(name.clone(), value.clone().into());
    }
    Ok(serde_json::Value::Object(resolved))
}

fn validate_against_schema(
    schema: &serde_json::Value,
    output: &serde_json::Value,
) -> Result<(), ExecutorError> {
    let validator = jsonschema::validator_for(schema)
        .map_err(|e| ExecutorError::InvalidConfig(format!("invalid json schema: {e}")))?;

    let errors: Vec<String> = validator.iter_errors(output).map(|e| e.to_string()).collect();
    if errors.is_empty() {
        Ok(())
    } else {
        Err(ExecutorError::SchemaInvalid(errors.join("; ")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{MockAiProvider, MockMode};
    use glyph_domain::ContextValue;

    fn ctx_with_name(name: &str) -> RunContext {
        let mut ctx = RunContext::default();
        ctx.runtime
            .insert("name".into(), ContextValue::String(name.into()));
        ctx
    }

    fn schema() -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "greeting": {"type": "string"},
                "success": {"type": "boolean"},
            },
            "required": ["greeting", "success"],
        })
    }

    #[tokio::test]
    async fn success_writes_output_key_and_does_not_pause() {
        let config = AiGenerateConfig {
            template_id: "greet".into(),
            variables: vec!["name".into()],
            json_schema: schema(),
        };
        let provider = MockAiProvider::new(MockMode::Success, 1);
        let outcome = execute_ai_generate("ai", &config, &ctx_with_name("Diana"), &provider)
            .await
            .unwrap();
        assert!(!outcome.pause);
        assert!(outcome.output.unwrap().get("greeting").is_some());
    }

    #[tokio::test]
    async fn missing_variable_is_invalid_not_a_pause() {
        let config = AiGenerateConfig {
            template_id: "greet".into(),
            variables: vec!["missing".into()],
            json_schema: schema(),
        };
        let provider = MockAiProvider::new(MockMode::Success, 1);
        let result = execute_ai_generate("ai", &config, &RunContext::default(), &provider).await;
        assert!(matches!(result, Err(ExecutorError::InvalidConfig(_))));
    }

    #[tokio::test]
    async fn exhausted_retries_pause_for_manual_fix() {
        let config = AiGenerateConfig {
            template_id: "greet".into(),
            variables: vec![],
            json_schema: json!({"type": "object", "required": ["x"]}),
        };
        let provider = MockAiProvider::new(MockMode::SchemaViolation, 1);
        let outcome = execute_ai_generate("ai", &config, &RunContext::default(), &provider)
            .await
            .unwrap();
        assert!(outcome.pause);
        assert_eq!(outcome.waiting_for, Some(glyph_domain::WaitingFor::ManualFix));
        assert!(outcome.retry_count >= MAX_RETRIES);
    }

    #[tokio::test]
    async fn transient_failure_recovers_within_retry_budget() {
        let config = AiGenerateConfig {
            template_id: "greet".into(),
            variables: vec![],
            json_schema: json!({"type": "object"}),
        };
        let provider = MockAiProvider::new(MockMode::TransientError, 1);
        let outcome = execute_ai_generate("ai", &config, &RunContext::default(), &provider)
            .await
            .unwrap();
        assert!(!outcome.pause);
    }

    #[tokio::test]
    async fn persistent_timeout_pauses_for_manual_fix_like_any_other_exhausted_retry() {
        let config = AiGenerateConfig {
            template_id: "greet".into(),
            variables: vec![],
            json_schema: json!({"type": "object"}),
        };
        let provider = MockAiProvider::new(MockMode::Timeout, 1);
        let outcome = execute_ai_generate("ai", &config, &RunContext::default(), &provider)
            .await
            .unwrap();
        assert!(outcome.pause);
        assert_eq!(outcome.waiting_for, Some(glyph_domain::WaitingFor::ManualFix));
        assert!(outcome.retry_count >= MAX_RETRIES);
    }
}
