//! Project directory-mapping configuration.
//!
//! A TOML file maps task store database ids to local working directories,
//! used as the fallback when a task record carries no project path of its
//! own. Invalid entries are skipped with a warning; only an unreadable or
//! unparseable file is a hard error.
//!
//! ```toml
//! [[projects]]
//! name = "billing-service"
//! database_id = "a1b2c3"
//! working_directory = "/srv/repos/billing"
//! ```

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{info, warn};

use crate::error::{Result, ShepherdError};

#[derive(Debug, Deserialize)]
struct ProjectsFile {
    #[serde(default)]
    projects: Vec<RawEntry>,
}

#[derive(Debug, Deserialize)]
struct RawEntry {
    #[serde(default)]
    name: String,
    #[serde(default)]
    database_id: String,
    #[serde(default)]
    working_directory: String,
}

/// One validated project mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectMapping {
    /// Human-readable project name.
    pub name: String,
    /// Task store database the project lives in.
    pub database_id: String,
    /// Absolute, existing working directory for the agent.
    pub working_directory: PathBuf,
}

/// Validated lookup table from database id to working directory.
#[derive(Debug, Default)]
pub struct ProjectConfig {
    mappings: Vec<ProjectMapping>,
}

impl ProjectConfig {
    /// An empty mapping set.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Load and validate the mapping file.
    ///
    /// A missing file yields an empty mapping set; a present but
    /// unparseable file is a configuration error.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!(path = %path.display(), "project mapping file not found, continuing without mappings");
            return Ok(Self::empty());
        }

        let raw = std::fs::read_to_string(path).map_err(|e| {
            ShepherdError::config_with_path(format!("failed to read: {e}"), path.to_path_buf())
        })?;
        let file: ProjectsFile = toml::from_str(&raw).map_err(|e| {
            ShepherdError::config_with_path(format!("failed to parse: {e}"), path.to_path_buf())
        })?;

        let mut mappings = Vec::new();
        let mut seen_ids: HashSet<String> = HashSet::new();

        for entry in file.projects {
            let name = entry.name.trim();
            if name.is_empty() {
                warn!("skipping project entry with missing or empty name");
                continue;
            }
            let database_id = entry.database_id.trim();
            if database_id.is_empty() {
                warn!(project = name, "skipping project entry with missing database_id");
                continue;
            }
            if !seen_ids.insert(database_id.to_string()) {
                warn!(project = name, database_id, "skipping duplicate database_id");
                continue;
            }
            let dir = Path::new(entry.working_directory.trim());
            if dir.as_os_str().is_empty() {
                warn!(project = name, "skipping project entry with missing working_directory");
                continue;
            }
            if !dir.is_absolute() {
                warn!(project = name, path = %dir.display(), "skipping relative working_directory");
                continue;
            }
            if !dir.is_dir() {
                warn!(project = name, path = %dir.display(), "skipping missing working_directory");
                continue;
            }

            mappings.push(ProjectMapping {
                name: name.to_string(),
                database_id: database_id.to_string(),
                working_directory: dir.to_path_buf(),
            });
        }

        info!(count = mappings.len(), "project mappings loaded");
        Ok(Self { mappings })
    }

    /// Resolve the working directory mapped to a database id.
    #[must_use]
    pub fn resolve_working_directory(&self, database_id: &str) -> Option<&Path> {
        self.mappings
            .iter()
            .find(|m| m.database_id == database_id)
            .map(|m| m.working_directory.as_path())
    }

    /// All validated mappings.
    #[must_use]
    pub fn mappings(&self) -> &[ProjectMapping] {
        &self.mappings
    }
}
