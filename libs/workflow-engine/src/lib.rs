//! Workflow engine for Glyph
//!
//! The advance-loop orchestrator (`engine`), the four step executors
//! (`executor`), the sandboxed conditional evaluator (`sandbox`), the AI
//! provider and notification seams (`provider`, `notification`), and a
//! YAML workflow parser (`parser`) used by tests and the demo CLI.

pub mod engine;
pub mod error;
pub mod executor;
pub mod notification;
pub mod parser;
pub mod provider;
pub mod sandbox;

pub use engine::{EngineError, WorkflowOrchestrator};
pub use error::ExecutorError;
pub use executor::{execute_step, ExecutionOutcome};
pub use notification::{LoggingNotificationSink, NotificationSink};
pub use parser::{parse_workflow, ParseError};
pub use provider::{AiProvider, MockAiProvider, MockMode};
