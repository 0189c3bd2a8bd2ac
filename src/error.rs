//! Custom error types for shepherd.
//!
//! This module provides structured error types that enable better
//! error handling, reporting, and recovery throughout the orchestrator.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for shepherd operations
#[derive(Error, Debug)]
pub enum ShepherdError {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Failed to load configuration
    #[error("Configuration error: {message}")]
    Config {
        message: String,
        path: Option<PathBuf>,
    },

    /// Invalid configuration value
    #[error("Invalid configuration: {field} - {reason}")]
    InvalidConfig { field: String, reason: String },

    // =========================================================================
    // Task Store Errors
    // =========================================================================
    /// Task store operation failed
    #[error("Task store {operation} failed: {message}")]
    Store { operation: String, message: String },

    /// Stage token from the store did not match any known stage
    #[error("Unknown stage token: {token}")]
    UnknownStage { token: String },

    // =========================================================================
    // Agent Errors
    // =========================================================================
    /// Code agent invocation failed
    #[error("Agent invocation failed: {message}")]
    Agent { message: String },

    /// Working directory rejected before launching the agent
    #[error("Invalid working directory '{path}': {reason}")]
    WorkingDirectory { path: String, reason: String },

    // =========================================================================
    // Wrapped Errors
    // =========================================================================
    /// IO error wrapper
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON error wrapper
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// HTTP error wrapper
    #[error(transparent)]
    Http(#[from] reqwest::Error),

    /// Generic error wrapper
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ShepherdError {
    // =========================================================================
    // Constructor helpers
    // =========================================================================

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            path: None,
        }
    }

    /// Create a configuration error with path
    pub fn config_with_path(message: impl Into<String>, path: PathBuf) -> Self {
        Self::Config {
            message: message.into(),
            path: Some(path),
        }
    }

    /// Create a task store error
    pub fn store(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Store {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Create an agent error
    pub fn agent(message: impl Into<String>) -> Self {
        Self::Agent {
            message: message.into(),
        }
    }

    /// Create a working directory error
    pub fn working_directory(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::WorkingDirectory {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Get error code for exit status
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config { .. } | Self::InvalidConfig { .. } => 7,
            Self::WorkingDirectory { .. } => 2,
            _ => 1,
        }
    }
}

/// Type alias for shepherd results
pub type Result<T> = std::result::Result<T, ShepherdError>;
