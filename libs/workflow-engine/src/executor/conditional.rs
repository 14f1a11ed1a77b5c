//! Conditional step executor.
//!
//! Evaluates a boolean expression against the run's context in the
//! sandboxed evaluator in `crate::sandbox`. Never pauses; the graph has a
//! single `next` per step rather than a true/false branch pair.

use glyph_domain::{ConditionalConfig, RunContext};
use serde_json::json;

use super::ExecutionOutcome;
use crate::error::ExecutorError;
use crate::sandbox::evaluate_condition;

/// Run a conditional step: merge the three context layers, evaluate
/// `config.when` in the sandbox, and return the boolean result. Never
/// pauses.
pub fn execute_conditional(
    config: &ConditionalConfig,
    context: &RunContext,
) -> Result<ExecutionOutcome, ExecutorError> {
    let namespace = context.merge_namespace();
    let result = evaluate_condition(&config.when, &namespace)?;

    Ok(ExecutionOutcome::complete(json!({
        "result": result,
        "expression": config.when,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use glyph_domain::ContextValue;

    fn ctx_with(key: &str, value: ContextValue) -> RunContext {
        let mut ctx = RunContext::default();
        ctx.runtime.insert(key.to_string(), value);
        ctx
    }

    #[test]
    fn evaluates_true_expression() {
        let ctx = ctx_with("agreement", ContextValue::Number(serde_json::Number::from_f64(0.8).unwrap()));
        let cfg = ConditionalConfig {
            when: "agreement >= 0.5".into(),
        };
        let outcome = execute_conditional(&cfg, &ctx).unwrap();
        assert!(!outcome.pause);
        assert_eq!(outcome.output.unwrap()["result"], true);
    }

    #[test]
    fn name_error_surfaces_for_undefined_identifier() {
        let cfg = ConditionalConfig {
            when: "undefined > 10".into(),
        };
        let result = execute_conditional(&cfg, &RunContext::default());
        match result {
            Err(ExecutorError::NameError(msg)) => assert!(msg.contains("not defined")),
            other => panic!("expected NameError, got {other:?}"),
        }
    }

    #[test]
    fn security_error_surfaces_for_dunder_attribute() {
        let cfg = ConditionalConfig {
            when: "user.__class__".into(),
        };
        let result = execute_conditional(&cfg, &RunContext::default());
        assert!(matches!(result, Err(ExecutorError::Security(_))));
    }

    #[test]
    fn merges_layers_with_runtime_precedence() {
        let mut ctx = RunContext::default();
        ctx.r#static.insert("x".into(), ContextValue::Number(1.into()));
        ctx.profile.insert("x".into(), ContextValue::Number(2.into()));
        ctx.runtime.insert("x".into(), ContextValue::Number(3.into()));
        let cfg = ConditionalConfig { when: "x == 3".into() };
        let outcome = execute_conditional(&cfg, &ctx).unwrap();
        assert_eq!(outcome.output.unwrap()["result"], true);
    }
}
