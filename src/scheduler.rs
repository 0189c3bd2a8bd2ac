//! Poll-and-dispatch scheduler loop.
//!
//! Periodically queries the task store for tasks sitting in a trigger
//! stage and hands each one, serially, to the task processor. The loop
//! never overlaps poll cycles and never processes two tasks concurrently;
//! the only concurrency is between the interval sleep and an external
//! stop signal, which interrupts the sleep promptly.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::agent::CodeAgent;
use crate::processor::TaskProcessor;
use crate::projects::ProjectConfig;
use crate::store::TaskStore;
use crate::task::Task;
use crate::workflow::Stage;

/// Handle for requesting scheduler shutdown from another task.
///
/// `stop` is idempotent; a stop request takes effect at task-processing
/// boundaries only, never mid-task.
#[derive(Clone)]
pub struct SchedulerHandle {
    stop_tx: watch::Sender<bool>,
}

impl SchedulerHandle {
    /// Request the scheduler to stop after the current task.
    pub fn stop(&self) {
        info!("scheduler stop requested");
        let _ = self.stop_tx.send(true);
    }
}

/// Polls the task store for actionable tasks and processes them.
pub struct Scheduler<S, A> {
    store: Arc<S>,
    processor: TaskProcessor<S, A>,
    projects: ProjectConfig,
    database_id: String,
    poll_interval: Duration,
    stop_tx: watch::Sender<bool>,
    stop_rx: watch::Receiver<bool>,
}

impl<S: TaskStore, A: CodeAgent> Scheduler<S, A> {
    /// Create a scheduler in the stopped state.
    #[must_use]
    pub fn new(
        store: Arc<S>,
        processor: TaskProcessor<S, A>,
        projects: ProjectConfig,
        database_id: impl Into<String>,
        poll_interval: Duration,
    ) -> Self {
        let (stop_tx, stop_rx) = watch::channel(false);
        Self {
            store,
            processor,
            projects,
            database_id: database_id.into(),
            poll_interval,
            stop_tx,
            stop_rx,
        }
    }

    /// Get a handle that can stop this scheduler.
    #[must_use]
    pub fn handle(&self) -> SchedulerHandle {
        SchedulerHandle {
            stop_tx: self.stop_tx.clone(),
        }
    }

    fn stop_requested(&self) -> bool {
        *self.stop_rx.borrow()
    }

    /// Run the polling loop until a stop is requested.
    ///
    /// Any error escaping a poll cycle is logged and isolated to that
    /// cycle; the loop always proceeds to the next interval. The loop
    /// terminates only through [`SchedulerHandle::stop`].
    pub async fn run(&mut self) {
        info!(
            poll_interval_secs = self.poll_interval.as_secs(),
            database = %self.database_id,
            "scheduler started"
        );

        let mut stop_rx = self.stop_rx.clone();
        loop {
            if self.stop_requested() {
                break;
            }

            if let Err(e) = self.poll_once().await {
                error!(error = %e, "poll cycle failed");
            }

            tokio::select! {
                () = tokio::time::sleep(self.poll_interval) => {}
                changed = stop_rx.changed() => {
                    if changed.is_err() || *stop_rx.borrow() {
                        break;
                    }
                }
            }
        }

        info!("scheduler stopped");
    }

    /// Execute a single poll cycle.
    ///
    /// Also usable on its own for one-shot runs (`shepherd run --once`).
    pub async fn poll_once(&self) -> Result<()> {
        debug!("poll cycle start");

        let mut tasks: Vec<Task> = Vec::new();
        for stage in Stage::TRIGGERS {
            tasks.extend(self.store.query_by_stage(stage).await?);
        }

        if tasks.is_empty() {
            debug!("no actionable tasks");
            return Ok(());
        }

        info!(count = tasks.len(), "found actionable tasks");

        for task in &mut tasks {
            if self.stop_requested() {
                info!("stop requested, abandoning remaining tasks in batch");
                break;
            }

            self.fill_project_path(task);

            info!(task = %task.name, stage = %task.stage, "processing task");
            if self.processor.process_task(task).await {
                info!(task = %task.name, "task processed");
            } else {
                warn!(task = %task.name, "task failed");
            }
        }

        Ok(())
    }

    /// Fall back to the project mapping when the task carries no path.
    fn fill_project_path(&self, task: &mut Task) {
        if !task.project_path.is_empty() {
            return;
        }
        if let Some(dir) = self.projects.resolve_working_directory(&self.database_id) {
            debug!(task = %task.name, dir = %dir.display(), "using mapped working directory");
            task.project_path = dir.to_string_lossy().into_owned();
        }
    }
}
