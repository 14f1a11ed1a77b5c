//! YAML workflow parser.
//!
//! Deserializes into `StepConfig`/`StepDefinition` (`serde_yml::from_str`
//! then validate), then validates the resulting graph with petgraph
//! (cycle/reachability checks) and strsim (typo suggestions on dangling
//! `next` references). Each step carries a single `next` rather than a
//! separate transitions list.

use std::collections::{HashMap, HashSet};

use glyph_domain::{StepConfig, StepDefinition, WorkflowDefinition, WorkflowId};
use petgraph::algo;
use petgraph::graph::DiGraph;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yml::Error),

    #[error("invalid workflow: {0}")]
    Validation(String),
}

#[derive(Debug, Deserialize)]
struct WorkflowYaml {
    name: String,
    start_step: String,
    steps: Vec<StepYaml>,
}

#[derive(Debug, Deserialize)]
struct StepYaml {
    step_id: String,
    name: String,
    next: Option<String>,
    #[serde(flatten)]
    config: StepConfig,
}

/// Parse a YAML workflow document into a fresh, version-1
/// `WorkflowDefinition`. Structurally validates the `next` graph (no
/// dangling references, no cycles, every step reachable from `start_step`)
/// before returning.
pub fn parse_workflow(yaml: &str) -> Result<WorkflowDefinition, ParseError> {
    let parsed: WorkflowYaml = serde_yml::from_str(yaml)?;

    let steps: Vec<StepDefinition> = parsed
        .steps
        .into_iter()
        .map(|s| StepDefinition {
            step_type: s.config.step_type(),
            step_id: s.step_id,
            name: s.name,
            next: s.next,
            config: s.config,
        })
        .collect();

    let workflow = WorkflowDefinition {
        id: WorkflowId::new(),
        version: 1,
        name: parsed.name,
        start_step: parsed.start_step,
        steps,
        created_at: chrono::Utc::now(),
    };

    validate_graph(&workflow).map_err(ParseError::Validation)?;
    Ok(workflow)
}

fn validate_graph(workflow: &WorkflowDefinition) -> Result<(), String> {
    if workflow.steps.is_empty() {
        return Err("workflow must have at least one step".into());
    }

    let step_ids: HashSet<&str> = workflow.steps.iter().map(|s| s.step_id.as_str()).collect();
    if !step_ids.contains(workflow.start_step.as_str()) {
        return Err(format!(
            "start_step '{}' does not name a defined step",
            workflow.start_step
        ));
    }

    let mut graph = DiGraph::new();
    let mut indices = HashMap::new();
    for step in &workflow.steps {
        indices.insert(step.step_id.as_str(), graph.add_node(step.step_id.as_str()));
    }

    for step in &workflow.steps {
        let Some(next) = &step.next else { continue };
        let Some(&to_idx) = indices.get(next.as_str()) else {
            let hint = find_similar_step(next, &step_ids)
                .map(|s| format!(" (did you mean '{s}'?)"))
                .unwrap_or_default();
            return Err(format!(
                "step '{}' has next='{next}' which is not a defined step{hint}",
                step.step_id
            ));
        };
        graph.add_edge(indices[step.step_id.as_str()], to_idx, ());
    }

    if algo::is_cyclic_directed(&graph) {
        return Err("workflow graph contains a cycle".into());
    }

    let start_idx = indices[workflow.start_step.as_str()];
    let mut reachable = HashSet::new();
    let mut dfs = petgraph::visit::Dfs::new(&graph, start_idx);
    while let Some(idx) = dfs.next(&graph) {
        reachable.insert(graph[idx]);
    }
    for step_id in &step_ids {
        if !reachable.contains(step_id) {
            return Err(format!(
                "step '{step_id}' is not reachable from start_step '{}'",
                workflow.start_step
            ));
        }
    }

    Ok(())
}

/// Suggest the closest defined step id for a dangling reference, within a
/// small edit-distance cutoff.
fn find_similar_step<'a>(target: &str, step_ids: &HashSet<&'a str>) -> Option<&'a str> {
    step_ids
        .iter()
        .copied()
        .map(|id| (id, strsim::levenshtein(target, id)))
        .filter(|&(_, distance)| distance <= 3)
        .min_by_key(|&(_, distance)| distance)
        .map(|(id, _)| id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_form_then_ai_then_conditional() {
        let yaml = r#"
name: greeting
start_step: form
steps:
  - step_id: form
    name: Collect name
    next: ai
    type: form
    fields:
      - key: name
        field_type: text
        required: true
  - step_id: ai
    name: Generate greeting
    next: cond
    type: ai_generate
    template_id: greet
    variables: [name]
    json_schema:
      type: object
      required: [greeting]
  - step_id: cond
    name: Check result
    type: conditional
    when: "1 == 1"
"#;
        let workflow = parse_workflow(yaml).unwrap();
        assert_eq!(workflow.name, "greeting");
        assert_eq!(workflow.steps.len(), 3);
        assert_eq!(workflow.find_step("ai").unwrap().step_type.to_string(), "ai_generate");
    }

    #[test]
    fn rejects_dangling_next_with_typo_suggestion() {
        let yaml = r#"
name: bad
start_step: only
steps:
  - step_id: only
    name: Only step
    next: cnd
    type: conditional
    when: "1 == 1"
"#;
        let result = parse_workflow(yaml);
        match result {
            Err(ParseError::Validation(msg)) => {
                assert!(msg.contains("not a defined step"));
            }
            other => panic!("expected Validation error, got {other:?}"),
        }
    }

    #[test]
    fn rejects_cycle() {
        let yaml = r#"
name: loop
start_step: a
steps:
  - step_id: a
    name: A
    next: b
    type: conditional
    when: "1 == 1"
  - step_id: b
    name: B
    next: a
    type: conditional
    when: "1 == 1"
"#;
        let result = parse_workflow(yaml);
        assert!(matches!(result, Err(ParseError::Validation(msg)) if msg.contains("cycle")));
    }

    #[test]
    fn rejects_unreachable_step() {
        let yaml = r#"
name: orphan
start_step: a
steps:
  - step_id: a
    name: A
    type: conditional
    when: "1 == 1"
  - step_id: b
    name: B
    type: conditional
    when: "1 == 1"
"#;
        let result = parse_workflow(yaml);
        assert!(matches!(result, Err(ParseError::Validation(msg)) if msg.contains("not reachable")));
    }

    #[test]
    fn rejects_invalid_yaml() {
        let result = parse_workflow("not: [valid: {");
        assert!(matches!(result, Err(ParseError::Yaml(_))));
    }
}
