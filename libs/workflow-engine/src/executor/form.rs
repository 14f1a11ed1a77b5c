//! Form step executor.
//!
//! A step that never completes on its own, always pausing for external
//! submission. It pauses unconditionally, every time it is reached, and its
//! schema is handed to the caller via `context.runtime`.

use glyph_domain::{FieldDescriptor, FieldType, FormConfig, RunContext, WaitingFor};
use serde_json::Value as Json;

use super::ExecutionOutcome;
use crate::error::ExecutorError;

/// Run a form step: always pauses, publishing the field schema.
///
/// `context` is read here only to produce the `<step_id>_schema` key; the
/// orchestrator is responsible for actually writing it into the run's
/// runtime layer (see `engine::advance`), since this function receives a
/// shared reference rather than the mutable context the orchestrator owns.
pub fn execute_form(config: &FormConfig) -> Result<ExecutionOutcome, ExecutorError> {
    let schema = serde_json::to_value(&config.fields)
        .map_err(|e| ExecutorError::InvalidConfig(e.to_string()))?;
    let mut outcome = ExecutionOutcome::waiting(WaitingFor::Form);
    outcome.output = Some(schema);
    Ok(outcome)
}

/// Validate resume inputs for a form step against its field descriptors.
///
/// Required fields missing from `inputs` are `Invalid`; present fields of
/// the wrong declared type or not representable as a string are `Invalid`;
/// unknown keys are silently dropped; optional fields absent from `inputs`
/// are silently dropped, not defaulted.
pub fn validate_fields(
    fields: &[FieldDescriptor],
    inputs: &Json,
) -> Result<Json, ExecutorError> {
    let inputs = inputs.as_object().ok_or_else(|| {
        ExecutorError::InvalidConfig("form resume payload must be an object".into())
    })?;

    let mut validated = serde_json::Map::new();
    for field in fields {
        match inputs.get(&field.key) {
            Some(value) => {
                if field.field_type != FieldType::Text && field.field_type != FieldType::Textarea
                {
                    return Err(ExecutorError::InvalidConfig(format!(
                        "field '{}' has unsupported type",
                        field.key
                    )));
                }
                let Json::String(_) = value else {
                    return Err(ExecutorError::InvalidConfig(format!(
                        "field '{}' must be a string",
                        field.key
                    )));
                };
                validated.insert(field.key.clone(), value.clone());
            }
            None if field.required => {
                return Err(ExecutorError::InvalidConfig(format!(
                    "missing required field '{}'",
                    field.key
                )));
            }
            None => {}
        }
    }

    Ok(Json::Object(validated))
}

/// Merge validated form values into `context.runtime` under their raw keys
/// (unlike `ai_generate`/`approval`, a form step writes each field directly
/// rather than namespacing under `<step_id>_*`).
pub fn merge_into_runtime(context: &mut RunContext, validated: &Json) {
    if let Json::Object(map) = validated {
        for (key, value) in map {
            context
                .runtime
                .insert(key.clone(), value.clone().into());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glyph_domain::StepConfig;

    fn fields() -> Vec<FieldDescriptor> {
        vec![
            FieldDescriptor {
                key: "name".into(),
                field_type: FieldType::Text,
                required: true,
            },
            FieldDescriptor {
                key: "notes".into(),
                field_type: FieldType::Textarea,
                required: false,
            },
        ]
    }

    #[test]
    fn execute_always_pauses_with_schema() {
        let cfg = FormConfig { fields: fields() };
        let outcome = execute_form(&cfg).unwrap();
        assert!(outcome.pause);
        assert_eq!(outcome.waiting_for, Some(WaitingFor::Form));
        assert!(outcome.output.is_some());
        let _ = StepConfig::Form(cfg); // exercised elsewhere via dispatch
    }

    #[test]
    fn validate_rejects_missing_required_field() {
        let result = validate_fields(&fields(), &serde_json::json!({}));
        assert!(matches!(result, Err(ExecutorError::InvalidConfig(_))));
    }

    #[test]
    fn validate_drops_unknown_keys_and_missing_optional() {
        let result = validate_fields(
            &fields(),
            &serde_json::json!({"name": "Diana", "extra": "dropped"}),
        )
        .unwrap();
        assert_eq!(result, serde_json::json!({"name": "Diana"}));
    }

    #[test]
    fn validate_rejects_non_string_value() {
        let result = validate_fields(&fields(), &serde_json::json!({"name": 5}));
        assert!(matches!(result, Err(ExecutorError::InvalidConfig(_))));
    }

    #[test]
    fn validate_is_idempotent() {
        let inputs = serde_json::json!({"name": "Diana"});
        let once = validate_fields(&fields(), &inputs).unwrap();
        let twice = validate_fields(&fields(), &once).unwrap();
        assert_eq!(once, twice);
    }
}
