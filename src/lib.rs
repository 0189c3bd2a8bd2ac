//! Shepherd - Task Lifecycle Orchestrator
//!
//! Moves development tasks through a fixed 14-stage workflow, invoking an
//! external AI code agent at the two AI-actionable stages and recording
//! results back into the external task store.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`workflow`] - The closed 14-stage status model and transition tables
//! - [`task`] - Task and agent outcome data models
//! - [`store`] - Task store seam and the hosted-database HTTP client
//! - [`agent`] - Code agent adapter (prompt building, subprocess invocation)
//! - [`processor`] - Per-task transition driver with retry/backoff
//! - [`scheduler`] - Poll-and-dispatch loop with graceful shutdown
//! - [`projects`] - Directory-mapping configuration
//! - [`config`] - Runtime settings
//! - [`error`] - Custom error types and handling
//! - [`testing`] - Testing infrastructure (mock store and agent)
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use std::time::Duration;
//! use shepherd::{CliCodeAgent, HttpTaskStore, Scheduler, StatusFieldKind, TaskProcessor};
//!
//! let store = Arc::new(HttpTaskStore::new(url, token, database_id, StatusFieldKind::Status));
//! let agent = Arc::new(CliCodeAgent::new("claude", Duration::from_secs(600), "Read,Write"));
//! let processor = TaskProcessor::new(store.clone(), agent, 2, 2.0);
//! let mut scheduler = Scheduler::new(store, processor, projects, database_id, Duration::from_secs(30));
//!
//! let handle = scheduler.handle();
//! scheduler.run().await; // until handle.stop()
//! ```

pub mod agent;
pub mod config;
pub mod error;
pub mod processor;
pub mod projects;
pub mod scheduler;
pub mod store;
pub mod task;
pub mod testing;
pub mod workflow;

// Re-export commonly used types
pub use error::{Result, ShepherdError};

pub use agent::{CliCodeAgent, CodeAgent};
pub use config::{Settings, DEFAULT_ALLOWED_TOOLS};
pub use processor::TaskProcessor;
pub use projects::{ProjectConfig, ProjectMapping};
pub use scheduler::{Scheduler, SchedulerHandle};
pub use store::{
    HttpTaskStore, StatusFieldKind, TaskStore, ANNOTATION_MAX_CHARS, PLAN_PROPERTY,
};
pub use task::{AgentOutcome, Task};
pub use workflow::{Stage, TriggerTransition};
