//! Mock implementations of the store and agent seams.
//!
//! These mocks provide controllable test doubles for external dependencies,
//! enabling deterministic unit tests.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use anyhow::{bail, Result};
use async_trait::async_trait;

use crate::agent::CodeAgent;
use crate::store::TaskStore;
use crate::task::{AgentOutcome, Task};
use crate::workflow::Stage;

/// One recorded write against the mock store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCall {
    /// `set_stage(id, stage)`
    SetStage { id: String, stage: Stage },
    /// `append_annotation(id, text)`
    Annotation { id: String, text: String },
    /// `set_text_property(id, property, text)`
    TextProperty {
        id: String,
        property: String,
        text: String,
    },
}

/// In-memory task store with scripted query results and recorded writes.
///
/// # Example
///
/// ```rust,ignore
/// let store = MockTaskStore::new()
///     .with_task(Stage::ToPlan, Task::new("p1", "Plan me", Stage::ToPlan));
///
/// // ... run the code under test ...
///
/// assert_eq!(store.queries(), vec![Stage::ToPlan, Stage::ReadyToImplement]);
/// assert!(store.calls().is_empty());
/// ```
#[derive(Default)]
pub struct MockTaskStore {
    tasks: Mutex<HashMap<Stage, Vec<Task>>>,
    calls: Mutex<Vec<StoreCall>>,
    queries: Mutex<Vec<Stage>>,
    set_stage_count: AtomicU32,
    query_error: bool,
    annotation_error: bool,
    text_property_error: bool,
    set_stage_error_after: Option<u32>,
}

impl MockTaskStore {
    /// Create an empty mock store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Script a task to be returned by queries for its stage.
    #[must_use]
    pub fn with_task(self, stage: Stage, task: Task) -> Self {
        self.tasks
            .lock()
            .expect("mock mutex poisoned")
            .entry(stage)
            .or_default()
            .push(task);
        self
    }

    /// Make all queries fail.
    #[must_use]
    pub fn with_query_error(mut self) -> Self {
        self.query_error = true;
        self
    }

    /// Make all annotation writes fail.
    #[must_use]
    pub fn with_annotation_error(mut self) -> Self {
        self.annotation_error = true;
        self
    }

    /// Make all text property writes fail.
    #[must_use]
    pub fn with_text_property_error(mut self) -> Self {
        self.text_property_error = true;
        self
    }

    /// Make `set_stage` fail once `n` calls have already succeeded.
    ///
    /// `0` fails the first call (the in-progress write), `1` fails the
    /// second (the done write).
    #[must_use]
    pub fn with_set_stage_error_after(mut self, n: u32) -> Self {
        self.set_stage_error_after = Some(n);
        self
    }

    /// All recorded write calls, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<StoreCall> {
        self.calls.lock().expect("mock mutex poisoned").clone()
    }

    /// All recorded queries, in order.
    #[must_use]
    pub fn queries(&self) -> Vec<Stage> {
        self.queries.lock().expect("mock mutex poisoned").clone()
    }
}

#[async_trait]
impl TaskStore for MockTaskStore {
    async fn query_by_stage(&self, stage: Stage) -> Result<Vec<Task>> {
        self.queries
            .lock()
            .expect("mock mutex poisoned")
            .push(stage);
        if self.query_error {
            bail!("scripted query failure");
        }
        Ok(self
            .tasks
            .lock()
            .expect("mock mutex poisoned")
            .get(&stage)
            .cloned()
            .unwrap_or_default())
    }

    async fn set_stage(&self, id: &str, stage: Stage) -> Result<()> {
        let seen = self.set_stage_count.fetch_add(1, Ordering::SeqCst);
        if self.set_stage_error_after.is_some_and(|n| seen >= n) {
            bail!("scripted set_stage failure");
        }
        self.calls
            .lock()
            .expect("mock mutex poisoned")
            .push(StoreCall::SetStage {
                id: id.to_string(),
                stage,
            });
        Ok(())
    }

    async fn append_annotation(&self, id: &str, text: &str) -> Result<()> {
        if self.annotation_error {
            bail!("scripted annotation failure");
        }
        self.calls
            .lock()
            .expect("mock mutex poisoned")
            .push(StoreCall::Annotation {
                id: id.to_string(),
                text: text.to_string(),
            });
        Ok(())
    }

    async fn set_text_property(&self, id: &str, property: &str, text: &str) -> Result<()> {
        if self.text_property_error {
            bail!("scripted text property failure");
        }
        self.calls
            .lock()
            .expect("mock mutex poisoned")
            .push(StoreCall::TextProperty {
                id: id.to_string(),
                property: property.to_string(),
                text: text.to_string(),
            });
        Ok(())
    }
}

/// Which agent operation was invoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentCall {
    Planning,
    Implementation,
}

/// Code agent double with a scripted outcome sequence.
///
/// Outcomes are consumed front-to-back, one per invocation; once the
/// script runs dry every further invocation fails.
#[derive(Default)]
pub struct MockCodeAgent {
    outcomes: Mutex<VecDeque<AgentOutcome>>,
    calls: Mutex<Vec<AgentCall>>,
    invocations: AtomicU32,
}

impl MockCodeAgent {
    /// Create a mock with an empty script.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an outcome to the script.
    #[must_use]
    pub fn with_outcome(self, outcome: AgentOutcome) -> Self {
        self.outcomes
            .lock()
            .expect("mock mutex poisoned")
            .push_back(outcome);
        self
    }

    /// Total invocations across both operations.
    #[must_use]
    pub fn invocations(&self) -> u32 {
        self.invocations.load(Ordering::SeqCst)
    }

    /// The sequence of operations invoked.
    #[must_use]
    pub fn calls(&self) -> Vec<AgentCall> {
        self.calls.lock().expect("mock mutex poisoned").clone()
    }

    fn next_outcome(&self, call: AgentCall) -> AgentOutcome {
        self.invocations.fetch_add(1, Ordering::SeqCst);
        self.calls.lock().expect("mock mutex poisoned").push(call);
        self.outcomes
            .lock()
            .expect("mock mutex poisoned")
            .pop_front()
            .unwrap_or_else(|| AgentOutcome::failed("no scripted outcome"))
    }
}

#[async_trait]
impl CodeAgent for MockCodeAgent {
    async fn run_planning(&self, _task: &Task) -> AgentOutcome {
        self.next_outcome(AgentCall::Planning)
    }

    async fn run_implementation(&self, _task: &Task) -> AgentOutcome {
        self.next_outcome(AgentCall::Implementation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_store_records_calls_in_order() {
        let store = MockTaskStore::new();
        store.set_stage("p1", Stage::Planning).await.unwrap();
        store.append_annotation("p1", "note").await.unwrap();
        let calls = store.calls();
        assert_eq!(calls.len(), 2);
        assert!(matches!(calls[0], StoreCall::SetStage { .. }));
        assert!(matches!(calls[1], StoreCall::Annotation { .. }));
    }

    #[tokio::test]
    async fn test_mock_store_scripted_query() {
        let store = MockTaskStore::new()
            .with_task(Stage::ToPlan, Task::new("p1", "Plan me", Stage::ToPlan));
        let tasks = store.query_by_stage(Stage::ToPlan).await.unwrap();
        assert_eq!(tasks.len(), 1);
        assert!(store
            .query_by_stage(Stage::ReadyToImplement)
            .await
            .unwrap()
            .is_empty());
        assert_eq!(store.queries(), vec![Stage::ToPlan, Stage::ReadyToImplement]);
    }

    #[tokio::test]
    async fn test_mock_agent_consumes_script() {
        let agent = MockCodeAgent::new()
            .with_outcome(AgentOutcome::failed("first"))
            .with_outcome(AgentOutcome::ok("second", None));
        let task = Task::new("p1", "Plan me", Stage::ToPlan);

        assert!(!agent.run_planning(&task).await.success);
        assert!(agent.run_planning(&task).await.success);
        // Script exhausted.
        assert!(!agent.run_planning(&task).await.success);
        assert_eq!(agent.invocations(), 3);
    }
}
