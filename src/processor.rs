//! Task processor.
//!
//! Drives exactly one actionable task through its trigger-to-done
//! transition: mark in-progress, invoke the agent with retries, then
//! persist the results. Side writes (plan text, session id, error
//! annotations) are best-effort; only the final done-stage write is part
//! of the success contract.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{error, info, warn};

use crate::agent::CodeAgent;
use crate::store::{TaskStore, PLAN_PROPERTY};
use crate::task::{AgentOutcome, Task};
use crate::workflow::Stage;

/// Prefix for annotations written by the orchestrator.
const ANNOTATION_TAG: &str = "[shepherd]";

/// Longest backoff applied between attempts, in seconds.
const MAX_BACKOFF_SECS: f64 = 300.0;

/// Processes actionable tasks through their stage transitions.
pub struct TaskProcessor<S, A> {
    store: Arc<S>,
    agent: Arc<A>,
    max_retries: u32,
    backoff_base: f64,
}

impl<S: TaskStore, A: CodeAgent> TaskProcessor<S, A> {
    /// Create a processor.
    ///
    /// `max_retries` is clamped to at least one attempt.
    #[must_use]
    pub fn new(store: Arc<S>, agent: Arc<A>, max_retries: u32, backoff_base: f64) -> Self {
        Self {
            store,
            agent,
            max_retries: max_retries.max(1),
            backoff_base,
        }
    }

    /// Process a single actionable task. Returns `true` on success.
    ///
    /// No error escapes this method: every documented failure path is
    /// reported through the return value and the store/logs.
    ///
    /// The in-progress stage is written before the agent runs, so progress
    /// is externally observable even if the process dies mid-task. On
    /// failure the task is left at the in-progress stage with no rollback;
    /// recovery is a human decision, flagged by the error annotation.
    pub async fn process_task(&self, task: &Task) -> bool {
        let Some(transition) = task.stage.trigger_transition() else {
            warn!(task = %task.name, stage = %task.stage, "no trigger transition, skipping");
            return false;
        };

        info!(
            task = %task.name,
            record = %task.id,
            from = %task.stage,
            to = %transition.done,
            "starting agent task"
        );

        if let Err(e) = self.store.set_stage(&task.id, transition.in_progress).await {
            error!(task = %task.name, error = %e, "failed to mark task in progress");
            return false;
        }

        let outcome = self.run_with_retries(task).await;

        if outcome.success {
            self.finish_task(task, transition.done, &outcome).await
        } else {
            self.report_failure(task, &outcome).await;
            false
        }
    }

    /// Persist side artifacts and write the done stage.
    async fn finish_task(&self, task: &Task, done: Stage, outcome: &AgentOutcome) -> bool {
        info!(task = %task.name, "agent task completed");

        // Plan text is only persisted for planning runs; losing it is
        // annoying but not fatal, the task itself still succeeded.
        if task.stage == Stage::ToPlan && !outcome.output.is_empty() {
            if let Err(e) = self
                .store
                .set_text_property(&task.id, PLAN_PROPERTY, &outcome.output)
                .await
            {
                warn!(task = %task.name, error = %e, "failed to store plan output");
            }
        }

        if let Some(session_id) = outcome.session_id.as_deref() {
            let note = format!("{ANNOTATION_TAG} Session ID: {session_id}");
            if let Err(e) = self.store.append_annotation(&task.id, &note).await {
                warn!(task = %task.name, error = %e, "failed to store session id");
            }
        }

        // The done write is the success contract. If it fails the agent's
        // work exists but the store does not know, so the next poll will
        // not pick the task up again and a human has to intervene.
        if let Err(e) = self.store.set_stage(&task.id, done).await {
            error!(
                task = %task.name,
                record = %task.id,
                stage = %done,
                error = %e,
                "CRITICAL: agent work completed but done-stage write failed"
            );
            return false;
        }

        true
    }

    /// Annotate the task with the last attempt's error, best-effort.
    async fn report_failure(&self, task: &Task, outcome: &AgentOutcome) {
        let error_text = outcome.error_text();
        error!(task = %task.name, error = %error_text, "agent task failed");

        let note = format!(
            "{ANNOTATION_TAG} Error at {}: {error_text}",
            Utc::now().to_rfc3339()
        );
        if let Err(e) = self.store.append_annotation(&task.id, &note).await {
            warn!(task = %task.name, error = %e, "failed to store error annotation");
        }
    }

    /// Invoke the agent up to `max_retries` times.
    ///
    /// Attempts run strictly sequentially against the same task context;
    /// exponential backoff applies only between attempts. The returned
    /// outcome is the last attempt's, earlier failures are logged only.
    async fn run_with_retries(&self, task: &Task) -> AgentOutcome {
        let mut last = AgentOutcome::failed("no attempts made");

        for attempt in 1..=self.max_retries {
            info!(
                task = %task.name,
                attempt,
                max_attempts = self.max_retries,
                "invoking code agent"
            );

            last = match task.stage {
                Stage::ToPlan => self.agent.run_planning(task).await,
                Stage::ReadyToImplement => self.agent.run_implementation(task).await,
                other => AgentOutcome::failed(format!("stage {other} is not an agent stage")),
            };

            if last.success {
                return last;
            }

            if attempt < self.max_retries {
                let delay = self.backoff_delay(attempt);
                info!(
                    task = %task.name,
                    wait_secs = delay.as_secs_f64(),
                    "agent attempt failed, backing off before retry"
                );
                tokio::time::sleep(delay).await;
            }
        }

        last
    }

    /// Backoff before the attempt after `attempt`: base^attempt seconds,
    /// capped at [`MAX_BACKOFF_SECS`] so large bases or attempt counts
    /// cannot overflow `Duration`.
    fn backoff_delay(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let secs = self.backoff_base.powi(exponent);
        if secs.is_finite() {
            Duration::from_secs_f64(secs.clamp(0.0, MAX_BACKOFF_SECS))
        } else {
            Duration::from_secs_f64(MAX_BACKOFF_SECS)
        }
    }
}
