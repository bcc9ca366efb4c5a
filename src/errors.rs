// src/errors.rs

//! Crate-wide error aliases and helpers.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RunTaskError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("missing environment variable {0:?}")]
    MissingEnv(String),

    #[error(
        "No service provided for override and can't determine default service with {0} container definitions"
    )]
    AmbiguousOverride(usize),

    #[error("Invalid override: {0}")]
    InvalidOverride(String),

    #[error("Unable to run task: {0}")]
    Submission(String),

    #[error("Waiting for tasks to stop failed: {0}")]
    Polling(String),

    /// A container stopped without an exit code; carries the stop reason verbatim.
    #[error("{0}")]
    Finalization(String),

    #[error("Invariant violated: {0}")]
    InvariantViolation(String),

    #[error("run cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl RunTaskError {
    /// Process exit code used when the run fails at the orchestration level.
    ///
    /// Container exit codes never travel through this type; they are reported
    /// through [`crate::engine::RunResult`].
    pub fn exit_code(&self) -> i32 {
        1
    }

    /// True for errors raised before anything was submitted.
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            RunTaskError::ConfigError(_)
                | RunTaskError::MissingEnv(_)
                | RunTaskError::AmbiguousOverride(_)
                | RunTaskError::InvalidOverride(_)
                | RunTaskError::IoError(_)
                | RunTaskError::TomlError(_)
                | RunTaskError::JsonError(_)
        )
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, RunTaskError>;
