//! Code agent adapter.
//!
//! Turns a task into one invocation of the external code-generation CLI.
//! The adapter is deliberately dumb about failure: every process-level
//! problem is folded into an [`AgentOutcome`] and retry policy lives in
//! the processor, one layer up.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;
use tracing::{debug, error};

use crate::error::{Result, ShepherdError};
use crate::task::{AgentOutcome, Task};

/// Interface to the external code agent.
///
/// Both operations are infallible by signature: any failure is carried
/// inside the returned outcome so callers get a uniform shape to retry on.
#[async_trait]
pub trait CodeAgent: Send + Sync {
    /// Run the agent for a planning-stage task.
    async fn run_planning(&self, task: &Task) -> AgentOutcome;

    /// Run the agent for an implementation-stage task.
    async fn run_implementation(&self, task: &Task) -> AgentOutcome;
}

/// Structured payload the agent is expected (but not required) to emit.
#[derive(Debug, Deserialize)]
struct AgentPayload {
    #[serde(default)]
    result: Option<String>,
    #[serde(default)]
    session_id: Option<String>,
}

/// Adapter that invokes the agent CLI as a subprocess.
pub struct CliCodeAgent {
    command: String,
    timeout: Duration,
    allowed_tools: String,
}

impl CliCodeAgent {
    /// Create an adapter for the given agent command.
    #[must_use]
    pub fn new(command: impl Into<String>, timeout: Duration, allowed_tools: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            timeout,
            allowed_tools: allowed_tools.into(),
        }
    }

    /// Build the prompt for a planning-stage run.
    fn build_planning_prompt(task: &Task) -> String {
        format!(
            "You are planning the implementation for a development task.\n\n\
             ## Task: {}\n\n\
             ## Description:\n{}\n\n\
             ## Instructions:\n\
             1. Analyze the requirements described above\n\
             2. Create a detailed implementation plan\n\
             3. Identify the files that need to be created or modified\n\
             4. Outline the step-by-step approach\n\
             5. Note any potential risks or dependencies\n\n\
             Output a clear, structured implementation plan in markdown format.",
            task.name, task.description
        )
    }

    /// Build the prompt for an implementation-stage run.
    fn build_implementation_prompt(task: &Task) -> String {
        let plan_section = task
            .plan_output
            .as_deref()
            .map(|plan| format!("## Plan:\n{plan}\n\n"))
            .unwrap_or_default();

        format!(
            "You are implementing a development task.\n\n\
             ## Task: {}\n\n\
             ## Description:\n{}\n\n\
             {}\
             ## Instructions:\n\
             1. Implement the task according to the description and plan above\n\
             2. Write clean, well-structured code\n\
             3. Follow existing code conventions in the project\n\
             4. Add appropriate error handling\n\
             5. Ensure the implementation is complete and functional\n\n\
             Implement the changes now.",
            task.name, task.description, plan_section
        )
    }

    /// Validate and resolve the project path before launching anything.
    ///
    /// The working directory is the safety boundary that keeps the agent
    /// inside an intended project root, so a missing or malformed path
    /// fails fast without a process launch.
    fn resolve_project_path(project_path: &str) -> Result<PathBuf> {
        if project_path.is_empty() {
            return Err(ShepherdError::working_directory(
                project_path,
                "no project path configured",
            ));
        }
        if project_path.contains('\0') {
            return Err(ShepherdError::working_directory(
                project_path.replace('\0', "\\0"),
                "path contains null bytes",
            ));
        }
        let resolved = Path::new(project_path)
            .canonicalize()
            .map_err(|e| ShepherdError::working_directory(project_path, e.to_string()))?;
        if !resolved.is_dir() {
            return Err(ShepherdError::working_directory(
                project_path,
                "not a directory",
            ));
        }
        Ok(resolved)
    }

    /// Execute one agent invocation and normalize the result.
    async fn invoke(&self, prompt: &str, task: &Task) -> AgentOutcome {
        let cwd = match Self::resolve_project_path(&task.project_path) {
            Ok(cwd) => cwd,
            Err(e) => {
                error!(task = %task.name, error = %e, "refusing to launch agent");
                return AgentOutcome::failed(e.to_string());
            }
        };

        debug!(
            task = %task.name,
            cwd = %cwd.display(),
            has_session = task.session_id.is_some(),
            prompt_chars = prompt.len(),
            "running code agent"
        );

        let mut cmd = Command::new(&self.command);
        cmd.arg("-p")
            .arg(prompt)
            .args(["--output-format", "json"])
            .arg("--allowedTools")
            .arg(&self.allowed_tools);
        if let Some(session_id) = task.session_id.as_deref() {
            cmd.args(["--resume", session_id]);
        }
        cmd.current_dir(&cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = match tokio::time::timeout(self.timeout, cmd.output()).await {
            Err(_) => {
                error!(task = %task.name, timeout_secs = self.timeout.as_secs(), "agent timed out");
                return AgentOutcome::failed(format!(
                    "agent timed out after {}s",
                    self.timeout.as_secs()
                ));
            }
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                error!(command = %self.command, "agent command not found");
                return AgentOutcome::failed(format!("agent command not found: {}", self.command));
            }
            Ok(Err(e)) => {
                error!(command = %self.command, error = %e, "failed to launch agent");
                return AgentOutcome::failed(format!(
                    "failed to launch agent '{}': {e}",
                    self.command
                ));
            }
            Ok(Ok(output)) => output,
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            let message = if stderr.is_empty() {
                format!(
                    "agent exited with code {}",
                    output.status.code().unwrap_or(-1)
                )
            } else {
                stderr
            };
            error!(task = %task.name, error = %message, "agent failed");
            return AgentOutcome::failed(message);
        }

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        Self::parse_output(stdout)
    }

    /// Interpret successful-exit stdout.
    ///
    /// A malformed structured payload is not a processing failure: the raw
    /// text is taken as the output instead.
    fn parse_output(stdout: String) -> AgentOutcome {
        match serde_json::from_str::<AgentPayload>(&stdout) {
            Ok(payload) => {
                let output = payload.result.unwrap_or_else(|| stdout.clone());
                AgentOutcome::ok(output, payload.session_id)
            }
            Err(_) => {
                debug!("agent output was not structured, keeping raw text");
                AgentOutcome::ok(stdout, None)
            }
        }
    }
}

#[async_trait]
impl CodeAgent for CliCodeAgent {
    async fn run_planning(&self, task: &Task) -> AgentOutcome {
        let prompt = Self::build_planning_prompt(task);
        self.invoke(&prompt, task).await
    }

    async fn run_implementation(&self, task: &Task) -> AgentOutcome {
        let prompt = Self::build_implementation_prompt(task);
        self.invoke(&prompt, task).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::Stage;

    fn task_with_plan() -> Task {
        let mut task = Task::new("page-1", "Add parser", Stage::ReadyToImplement);
        task.description = "Parse the config file".to_string();
        task.plan_output = Some("1. Add module\n2. Wire it up".to_string());
        task
    }

    #[test]
    fn test_planning_prompt_embeds_task_fields() {
        let mut task = Task::new("page-1", "Add parser", Stage::ToPlan);
        task.description = "Parse the config file".to_string();
        let prompt = CliCodeAgent::build_planning_prompt(&task);
        assert!(prompt.contains("## Task: Add parser"));
        assert!(prompt.contains("Parse the config file"));
        assert!(prompt.contains("implementation plan"));
    }

    #[test]
    fn test_implementation_prompt_includes_plan_when_present() {
        let prompt = CliCodeAgent::build_implementation_prompt(&task_with_plan());
        assert!(prompt.contains("## Plan:\n1. Add module"));
    }

    #[test]
    fn test_implementation_prompt_omits_plan_section_when_absent() {
        let mut task = task_with_plan();
        task.plan_output = None;
        let prompt = CliCodeAgent::build_implementation_prompt(&task);
        assert!(!prompt.contains("## Plan:"));
    }

    #[test]
    fn test_resolve_rejects_empty_path() {
        let err = CliCodeAgent::resolve_project_path("").unwrap_err();
        assert!(matches!(err, ShepherdError::WorkingDirectory { .. }));
    }

    #[test]
    fn test_resolve_rejects_null_bytes() {
        let err = CliCodeAgent::resolve_project_path("/tmp/\0evil").unwrap_err();
        assert!(err.to_string().contains("null bytes"));
    }

    #[test]
    fn test_resolve_rejects_missing_directory() {
        assert!(CliCodeAgent::resolve_project_path("/definitely/not/here").is_err());
    }

    #[test]
    fn test_resolve_rejects_file_path() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let path = file.path().to_string_lossy().to_string();
        assert!(CliCodeAgent::resolve_project_path(&path).is_err());
    }

    #[test]
    fn test_resolve_accepts_real_directory() {
        let dir = tempfile::tempdir().unwrap();
        let resolved =
            CliCodeAgent::resolve_project_path(&dir.path().to_string_lossy()).unwrap();
        assert!(resolved.is_dir());
    }

    #[test]
    fn test_parse_output_structured() {
        let outcome = CliCodeAgent::parse_output(
            r#"{"result": "plan text", "session_id": "sess-42"}"#.to_string(),
        );
        assert!(outcome.success);
        assert_eq!(outcome.output, "plan text");
        assert_eq!(outcome.session_id.as_deref(), Some("sess-42"));
    }

    #[test]
    fn test_parse_output_structured_without_result_keeps_raw() {
        let raw = r#"{"session_id": "sess-42"}"#.to_string();
        let outcome = CliCodeAgent::parse_output(raw.clone());
        assert!(outcome.success);
        assert_eq!(outcome.output, raw);
        assert_eq!(outcome.session_id.as_deref(), Some("sess-42"));
    }

    #[test]
    fn test_parse_output_unstructured_is_still_success() {
        let outcome = CliCodeAgent::parse_output("plain text from the agent".to_string());
        assert!(outcome.success);
        assert_eq!(outcome.output, "plain text from the agent");
        assert!(outcome.session_id.is_none());
    }

    #[tokio::test]
    async fn test_invoke_fails_fast_on_bad_working_directory() {
        let agent = CliCodeAgent::new(
            "definitely-not-a-real-agent-command",
            Duration::from_secs(5),
            "Read,Write",
        );
        let mut task = Task::new("page-1", "Add parser", Stage::ToPlan);
        task.project_path = "/definitely/not/here".to_string();
        let outcome = agent.run_planning(&task).await;
        assert!(!outcome.success);
        assert!(outcome.error_text().contains("working directory"));
    }

    #[tokio::test]
    async fn test_invoke_reports_missing_command() {
        let dir = tempfile::tempdir().unwrap();
        let agent = CliCodeAgent::new(
            "definitely-not-a-real-agent-command",
            Duration::from_secs(5),
            "Read,Write",
        );
        let mut task = Task::new("page-1", "Add parser", Stage::ToPlan);
        task.project_path = dir.path().to_string_lossy().to_string();
        let outcome = agent.run_planning(&task).await;
        assert!(!outcome.success);
        assert!(outcome.error_text().contains("definitely-not-a-real-agent-command"));
    }
}
