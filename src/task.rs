//! Task and agent outcome data models.

use serde::{Deserialize, Serialize};

use crate::workflow::Stage;

/// A unit of work read from the task store.
///
/// Tasks are rebuilt from a store read on every poll cycle and are never
/// cached across cycles; all mutation happens through store writes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// Opaque store identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Current workflow stage.
    pub stage: Stage,
    /// Free-text description of the work.
    #[serde(default)]
    pub description: String,
    /// File-system path the agent works in.
    #[serde(default)]
    pub project_path: String,
    /// Repository URL, when known.
    #[serde(default)]
    pub repository: Option<String>,
    /// Branch name, when known.
    #[serde(default)]
    pub branch: Option<String>,
    /// Plan text produced by a prior planning run.
    #[serde(default)]
    pub plan_output: Option<String>,
    /// Error text from a prior failed run.
    #[serde(default)]
    pub error: Option<String>,
    /// Agent session identifier, enabling conversation resume.
    #[serde(default)]
    pub session_id: Option<String>,
}

impl Task {
    /// Create a task with only the required fields set.
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>, stage: Stage) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            stage,
            description: String::new(),
            project_path: String::new(),
            repository: None,
            branch: None,
            plan_output: None,
            error: None,
            session_id: None,
        }
    }
}

/// Normalized result of one code agent invocation.
///
/// Exactly one of `output` (on success) or `error` (on failure) carries
/// meaning; the constructors enforce that split.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentOutcome {
    /// Whether the invocation succeeded.
    pub success: bool,
    /// Agent output text; empty on failure.
    pub output: String,
    /// Session identifier reported by the agent, success only.
    pub session_id: Option<String>,
    /// Error text, failure only.
    pub error: Option<String>,
}

impl AgentOutcome {
    /// Create a successful outcome.
    #[must_use]
    pub fn ok(output: impl Into<String>, session_id: Option<String>) -> Self {
        Self {
            success: true,
            output: output.into(),
            session_id,
            error: None,
        }
    }

    /// Create a failed outcome.
    #[must_use]
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            output: String::new(),
            session_id: None,
            error: Some(error.into()),
        }
    }

    /// The error text, or a placeholder if the outcome carries none.
    #[must_use]
    pub fn error_text(&self) -> &str {
        self.error.as_deref().unwrap_or("unknown agent failure")
    }
}
