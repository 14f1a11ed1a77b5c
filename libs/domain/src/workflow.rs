//! Workflow and step definition types.
//!
//! A `WorkflowDefinition` is the parsed, validated shape of the `workflows`
//! + `steps` tables combined; `definition` in the `workflows` row is this
//! struct serialized whole, while `steps` are additionally exploded into
//! their own rows for indexed lookup (see `glyph_db`).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::enums::StepType;
use crate::ids::WorkflowId;

/// A versioned, immutable-by-version workflow definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    pub id: WorkflowId,
    pub version: i32,
    pub name: String,
    pub start_step: String,
    pub steps: Vec<StepDefinition>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl WorkflowDefinition {
    /// Build a lookup table from `step_id` to step definition.
    #[must_use]
    pub fn step_map(&self) -> BTreeMap<&str, &StepDefinition> {
        self.steps.iter().map(|s| (s.step_id.as_str(), s)).collect()
    }

    /// Find a step by its `step_id`.
    #[must_use]
    pub fn find_step(&self, step_id: &str) -> Option<&StepDefinition> {
        self.steps.iter().find(|s| s.step_id == step_id)
    }
}

/// A single node of the workflow graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepDefinition {
    pub step_id: String,
    pub step_type: StepType,
    pub name: String,
    /// `None` marks a terminal step: completing it with no pause ends the run.
    pub next: Option<String>,
    pub config: StepConfig,
}

/// Type-specific step configuration, a closed tagged variant per the Design
/// Notes ("Model as a closed tagged variant of step configs plus a switch in
/// the orchestrator, not as open inheritance").
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StepConfig {
    Form(FormConfig),
    AiGenerate(AiGenerateConfig),
    Conditional(ConditionalConfig),
    Approval(ApprovalConfig),
}

impl StepConfig {
    #[must_use]
    pub const fn step_type(&self) -> StepType {
        match self {
            Self::Form(_) => StepType::Form,
            Self::AiGenerate(_) => StepType::AiGenerate,
            Self::Conditional(_) => StepType::Conditional,
            Self::Approval(_) => StepType::Approval,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormConfig {
    pub fields: Vec<FieldDescriptor>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldDescriptor {
    pub key: String,
    pub field_type: FieldType,
    #[serde(default = "default_true")]
    pub required: bool,
}

const fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    Text,
    Textarea,
}

impl FieldType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Textarea => "textarea",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiGenerateConfig {
    pub template_id: String,
    pub variables: Vec<String>,
    pub json_schema: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConditionalConfig {
    pub when: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalConfig {
    pub approvers: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_map_indexes_by_step_id() {
        let wf = WorkflowDefinition {
            id: WorkflowId::new(),
            version: 1,
            name: "demo".into(),
            start_step: "a".into(),
            steps: vec![StepDefinition {
                step_id: "a".into(),
                step_type: StepType::Conditional,
                name: "A".into(),
                next: None,
                config: StepConfig::Conditional(ConditionalConfig { when: "true".into() }),
            }],
            created_at: chrono::Utc::now(),
        };
        assert!(wf.find_step("a").is_some());
        assert!(wf.find_step("missing").is_none());
    }

    #[test]
    fn step_config_serializes_with_type_tag() {
        let cfg = StepConfig::Approval(ApprovalConfig {
            approvers: vec!["a@example.com".into()],
        });
        let json = serde_json::to_value(&cfg).unwrap();
        assert_eq!(json["type"], "approval");
        let back: StepConfig = serde_json::from_value(json).unwrap();
        assert_eq!(back.step_type(), StepType::Approval);
    }
}
