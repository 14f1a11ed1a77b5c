//! Glyph workflow CLI
//!
//! Loads a YAML workflow definition, starts a run against the in-memory
//! store, drives it to completion with canned resume inputs, and prints the
//! resulting run, history, and context as JSON. A demo harness for the
//! orchestrator, not a production operator tool.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use glyph_db::{InMemoryRunStore, InMemoryWorkflowStore, WorkflowStore};
use glyph_domain::{ContextLayer, RunStatus, StepConfig};
use glyph_workflow_engine::{
    parse_workflow, LoggingNotificationSink, MockAiProvider, MockMode, WorkflowOrchestrator,
};

#[derive(Parser)]
#[command(name = "glyph")]
#[command(about = "Glyph workflow engine demo CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a YAML workflow definition and report whether it is valid.
    Validate {
        /// Path to a YAML workflow definition.
        workflow: PathBuf,
    },
    /// Start a run for a YAML workflow and drive it to completion with
    /// canned resume inputs, printing each transition.
    Run {
        /// Path to a YAML workflow definition.
        workflow: PathBuf,
        /// Optional idempotency key for the initial `StartRun` call.
        #[arg(long)]
        idempotency_key: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    glyph_common::init_tracing();

    let cli = Cli::parse();
    match cli.command {
        Commands::Validate { workflow } => validate(&workflow)?,
        Commands::Run {
            workflow,
            idempotency_key,
        } => run(&workflow, idempotency_key).await?,
    }
    Ok(())
}

fn validate(path: &PathBuf) -> anyhow::Result<()> {
    let yaml = std::fs::read_to_string(path)?;
    match parse_workflow(&yaml) {
        Ok(workflow) => {
            println!("ok: '{}' ({} steps)", workflow.name, workflow.steps.len());
            Ok(())
        }
        Err(e) => {
            eprintln!("invalid: {e}");
            std::process::exit(1);
        }
    }
}

async fn run(path: &PathBuf, idempotency_key: Option<String>) -> anyhow::Result<()> {
    let yaml = std::fs::read_to_string(path)?;
    let workflow = parse_workflow(&yaml)?;

    let workflows = Arc::new(InMemoryWorkflowStore::new());
    workflows.put_workflow(&workflow).await?;

    let orchestrator = WorkflowOrchestrator::new(
        workflows,
        Arc::new(InMemoryRunStore::new()),
        Arc::new(MockAiProvider::new(MockMode::Success, 0)),
        Arc::new(LoggingNotificationSink),
    );

    let mut run = orchestrator
        .start_run(workflow.id, ContextLayer::new(), idempotency_key)
        .await?;
    println!("started run {} (status: {})", run.id, run.status);

    // Drive the run forward with a canned response per waiting step type,
    // matching the CLI's job: exercise the engine end to end, not collect
    // real operator input.
    while run.status == RunStatus::Waiting {
        let step_id = run
            .current_step
            .clone()
            .expect("waiting run always has a current step");
        let step = workflow
            .find_step(&step_id)
            .expect("waiting run points at a real step");

        let resume_input = match &step.config {
            StepConfig::Form(cfg) => {
                let mut fields = serde_json::Map::new();
                for field in &cfg.fields {
                    fields.insert(field.key.clone(), serde_json::json!("demo value"));
                }
                serde_json::Value::Object(fields)
            }
            StepConfig::Approval(_) => {
                serde_json::json!({"approval": {"approved": true, "comments": "approved by demo CLI"}})
            }
            StepConfig::AiGenerate(_) => serde_json::json!({}),
            StepConfig::Conditional(_) => {
                unreachable!("conditional steps never pause")
            }
        };

        println!("resuming step '{step_id}' with {resume_input}");
        run = orchestrator.resume_run(run.id, resume_input).await?;
        println!("run status: {}", run.status);
    }

    let history = orchestrator.get_history(run.id).await?;
    println!("\nfinal status: {}", run.status);
    println!("history:");
    for step in &history {
        println!("  {} [{}] -> {}", step.step_id, step.step_type, step.status);
    }
    println!(
        "\ncontext:\n{}",
        serde_json::to_string_pretty(&run.context)?
    );

    Ok(())
}
