//! Core enum types for the workflow engine.
//!
//! These enums are the source of truth and must match the Postgres `text`
//! columns they are stored in exactly (no SQL enum types are used so a new
//! variant never requires a migration).

use serde::{Deserialize, Serialize};

/// Type of a workflow step, discriminating which executor handles it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepType {
    Form,
    AiGenerate,
    Conditional,
    Approval,
}

impl StepType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Form => "form",
            Self::AiGenerate => "ai_generate",
            Self::Conditional => "conditional",
            Self::Approval => "approval",
        }
    }
}

impl std::fmt::Display for StepType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for StepType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "form" => Ok(Self::Form),
            "ai_generate" => Ok(Self::AiGenerate),
            "conditional" => Ok(Self::Conditional),
            "approval" => Ok(Self::Approval),
            other => Err(format!("unsupported step type: {other}")),
        }
    }
}

/// Lifecycle status of a `Run`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Waiting,
    Completed,
    Failed,
    Canceled,
}

impl RunStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Waiting => "waiting",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Canceled => "canceled",
        }
    }

    /// Whether the run is in a state where no further advance loop iterations
    /// will ever occur again.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Canceled)
    }

    /// Guards every `Run.status` transition: the status is an enum, and any
    /// transition outside this table is rejected.
    #[must_use]
    pub const fn can_transition(from: Self, to: Self) -> bool {
        match (from, to) {
            (Self::Running, Self::Waiting | Self::Completed | Self::Failed | Self::Canceled) => {
                true
            }
            (Self::Waiting, Self::Running | Self::Failed | Self::Canceled) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RunStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "running" => Ok(Self::Running),
            "waiting" => Ok(Self::Waiting),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "canceled" => Ok(Self::Canceled),
            other => Err(format!("unsupported run status: {other}")),
        }
    }
}

/// Status of a single `RunStep` history record. Append-only: once written, a
/// `RunStep` is never transitioned to another status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStepStatus {
    Completed,
    Failed,
}

impl RunStepStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for RunStepStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RunStepStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(format!("unsupported run step status: {other}")),
        }
    }
}

/// The external event a paused run is waiting on, written alongside the
/// pausing executor's output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaitingFor {
    Form,
    Approval,
    ManualFix,
}

impl std::fmt::Display for WaitingFor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Form => "form",
            Self::Approval => "approval",
            Self::ManualFix => "manual_fix",
        };
        f.write_str(s)
    }
}
