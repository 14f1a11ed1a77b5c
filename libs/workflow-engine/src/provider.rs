//! AI provider abstraction for the `ai_generate` executor.
//!
//! A single `generate` call taking a template id, resolved variables, and a
//! target JSON Schema, returning a JSON value the executor then validates.
//! A real HTTP-backed provider is intentionally left as a thin seam here —
//! wiring to a concrete model API is not implemented, but the trait is the
//! extension point a production deployment would implement against.

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::Mutex;

use crate::error::ExecutorError;

/// Generates structured output for an `ai_generate` step.
#[async_trait]
pub trait AiProvider: Send + Sync {
    async fn generate(
        &self,
        template_id: &str,
        variables: &serde_json::Value,
        json_schema: &serde_json::Value,
    ) -> Result<serde_json::Value, ExecutorError>;
}

/// Failure modes a `MockAiProvider` can be configured to exercise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockMode {
    /// Always returns a value satisfying `json_schema`.
    Success,
    /// Always returns a value that violates `json_schema`, to exercise the
    /// retry-then-pause path.
    SchemaViolation,
    /// Always fails with a provider error.
    Timeout,
    /// Fails on the first call, succeeds afterward, to exercise a single
    /// retry recovering.
    TransientError,
}

/// Deterministic AI provider double for tests and the demo CLI. Seeded
/// so repeated runs with the same seed produce the same generated values.
pub struct MockAiProvider {
    mode: MockMode,
    rng: Mutex<StdRng>,
    call_count: Mutex<u32>,
}

impl MockAiProvider {
    #[must_use]
    pub fn new(mode: MockMode, seed: u64) -> Self {
        Self {
            mode,
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
            call_count: Mutex::new(0),
        }
    }

    fn generate_from_schema(rng: &mut StdRng, schema: &serde_json::Value) -> serde_json::Value {
        let Some(schema_type) = schema.get("type").and_then(serde_json::Value::as_str) else {
            return serde_json::Value::Null;
        };

        if schema_type != "object" {
            return Self::generate_value(rng, schema);
        }

        let properties = schema
            .get("properties")
            .and_then(serde_json::Value::as_object)
            .cloned()
            .unwrap_or_default();
        let required: Vec<&str> = schema
            .get("required")
            .and_then(serde_json::Value::as_array)
            .map(|r| r.iter().filter_map(serde_json::Value::as_str).collect())
            .unwrap_or_default();

        let mut result = serde_json::Map::new();
        for (name, prop_schema) in &properties {
            if required.contains(&name.as_str()) || rng.gen::<f64>() > 0.3 {
                result.insert(name.clone(), Self::generate_value(rng, prop_schema));
            }
        }
        serde_json::Value::Object(result)
    }

    fn generate_value(rng: &mut StdRng, schema: &serde_json::Value) -> serde_json::Value {
        match schema.get("type").and_then(serde_json::Value::as_str) {
            Some("string") => serde_json::Value::String(format!("mock_value_{}", rng.gen_range(1..=100))),
            Some("integer") => serde_json::Value::Number(rng.gen_range(1..=100_i64).into()),
            Some("number") => serde_json::json!((rng.gen::<f64>() * 100.0 * 100.0).round() / 100.0),
            Some("boolean") => serde_json::Value::Bool(rng.gen_bool(0.5)),
            Some("array") => {
                let items_schema = schema.get("items").cloned().unwrap_or(serde_json::Value::Null);
                let length = rng.gen_range(1..=3);
                serde_json::Value::Array(
                    (0..length).map(|_| Self::generate_value(rng, &items_schema)).collect(),
                )
            }
            Some("object") => Self::generate_from_schema(rng, schema),
            _ => serde_json::Value::Null,
        }
    }
}

#[async_trait]
impl AiProvider for MockAiProvider {
    async fn generate(
        &self,
        _template_id: &str,
        _variables: &serde_json::Value,
        json_schema: &serde_json::Value,
    ) -> Result<serde_json::Value, ExecutorError> {
        let mut count = self.call_count.lock().await;
        *count += 1;
        let call_count = *count;
        drop(count);

        match self.mode {
            MockMode::Timeout => Err(ExecutorError::Timeout),
            MockMode::TransientError if call_count == 1 => {
                Err(ExecutorError::Provider("transient error (will succeed on retry)".into()))
            }
            MockMode::SchemaViolation => Ok(serde_json::json!({"invalid": "response"})),
            MockMode::Success | MockMode::TransientError => {
                let mut rng = self.rng.lock().await;
                Ok(Self::generate_from_schema(&mut rng, json_schema))
            }
        }
    }
}
