//! Runtime settings.
//!
//! Every knob is a CLI flag with an environment fallback, so deployments
//! can run `shepherd` from a unit file with nothing but env vars set.

use std::path::PathBuf;
use std::time::Duration;

use clap::Args;

use crate::error::{Result, ShepherdError};
use crate::store::StatusFieldKind;

/// Default capability names the agent is allowed to use.
pub const DEFAULT_ALLOWED_TOOLS: &str = "Read,Write,Edit,Bash,Glob,Grep";

/// Orchestrator settings, sourced from flags or environment.
#[derive(Args, Debug, Clone)]
pub struct Settings {
    /// Task store API token
    #[arg(long, env = "SHEPHERD_STORE_TOKEN", hide_env_values = true)]
    pub store_token: String,

    /// Task store database identifier
    #[arg(long, env = "SHEPHERD_DATABASE_ID")]
    pub database_id: String,

    /// Task store API base URL
    #[arg(
        long,
        env = "SHEPHERD_STORE_URL",
        default_value = "https://api.notion.com/v1"
    )]
    pub store_url: String,

    /// Which wire shape the store's stage field uses
    #[arg(long, env = "SHEPHERD_STATUS_FIELD", value_enum, default_value = "status")]
    pub status_field: StatusFieldKind,

    /// Seconds between poll cycles
    #[arg(long, env = "SHEPHERD_POLL_INTERVAL", default_value_t = 30)]
    pub poll_interval: u64,

    /// Maximum agent attempts per task
    #[arg(long, env = "SHEPHERD_MAX_RETRIES", default_value_t = 2)]
    pub max_retries: u32,

    /// Exponential backoff base between attempts, in seconds
    #[arg(long, env = "SHEPHERD_BACKOFF_BASE", default_value_t = 2.0)]
    pub backoff_base: f64,

    /// Code agent command name
    #[arg(long, env = "SHEPHERD_AGENT_COMMAND", default_value = "claude")]
    pub agent_command: String,

    /// Agent invocation timeout in seconds
    #[arg(long, env = "SHEPHERD_AGENT_TIMEOUT", default_value_t = 600)]
    pub agent_timeout: u64,

    /// Comma-separated capability names the agent may use
    #[arg(
        long,
        env = "SHEPHERD_ALLOWED_TOOLS",
        default_value = DEFAULT_ALLOWED_TOOLS
    )]
    pub allowed_tools: String,

    /// Path to the project directory-mapping file
    #[arg(long, env = "SHEPHERD_PROJECTS_FILE", default_value = "projects.toml")]
    pub projects_file: PathBuf,
}

impl Settings {
    /// Validate cross-field constraints clap cannot express.
    pub fn validate(&self) -> Result<()> {
        if self.poll_interval == 0 {
            return Err(ShepherdError::InvalidConfig {
                field: "poll_interval".into(),
                reason: "must be at least 1 second".into(),
            });
        }
        if self.max_retries == 0 {
            return Err(ShepherdError::InvalidConfig {
                field: "max_retries".into(),
                reason: "must allow at least one attempt".into(),
            });
        }
        if !self.backoff_base.is_finite() || self.backoff_base < 1.0 {
            return Err(ShepherdError::InvalidConfig {
                field: "backoff_base".into(),
                reason: "must be a finite value >= 1.0".into(),
            });
        }
        if self.agent_timeout == 0 {
            return Err(ShepherdError::InvalidConfig {
                field: "agent_timeout".into(),
                reason: "must be at least 1 second".into(),
            });
        }
        Ok(())
    }

    /// Poll interval as a duration.
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval)
    }

    /// Agent timeout as a duration.
    #[must_use]
    pub fn agent_timeout(&self) -> Duration {
        Duration::from_secs(self.agent_timeout)
    }
}
