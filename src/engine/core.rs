// src/engine/core.rs

//! Pure pieces of the run engine.
//!
//! Nothing here awaits, spawns or touches a backend: run phases, the sentinel
//! predicate, stream-prefix generation and exit-code aggregation. The async
//! shell in [`crate::engine::runtime`] drives these.

use std::fmt;

use crate::backend::{LogEvent, Task};
use crate::engine::marker::sentinel_prefix;
use crate::errors::{Result, RunTaskError};

/// Stages of a run, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Submitting,
    Running,
    AwaitingTermination,
    Finalizing,
    Joining,
    Done,
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunPhase::Submitting => "submitting",
            RunPhase::Running => "running",
            RunPhase::AwaitingTermination => "awaiting-termination",
            RunPhase::Finalizing => "finalizing",
            RunPhase::Joining => "joining",
            RunPhase::Done => "done",
        };
        f.write_str(name)
    }
}

/// Outcome of a run that reached `Done`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunResult {
    /// First non-zero container exit code in enumeration order, else 0.
    pub exit_code: i32,
    /// Name of the container that produced `exit_code`, when non-zero.
    pub failed_container: Option<String>,
    /// Final state of every task instance.
    pub tasks: Vec<Task>,
}

impl RunResult {
    pub fn success() -> Self {
        Self {
            exit_code: 0,
            failed_container: None,
            tasks: Vec::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Predicate for a container's tailer: keep going until the entry starts
/// with that container's finish-marker prefix.
pub fn sentinel_predicate(container_id: &str) -> impl FnMut(&LogEvent) -> bool + Send + 'static {
    let prefix = sentinel_prefix(container_id);
    move |event: &LogEvent| !event.message.starts_with(&prefix)
}

/// Stream prefix used when the run has no explicit name.
pub fn generated_stream_prefix() -> String {
    format!(
        "run_task_{}",
        chrono::Utc::now().timestamp_subsec_nanos()
    )
}

/// Aggregate the final state of all task instances into a [`RunResult`].
///
/// Containers are scanned in the order the backend returned them. A
/// container without an exit code fails the run with its stop reason.
pub fn aggregate_exit_code(tasks: Vec<Task>) -> Result<RunResult> {
    let mut failed: Option<(i32, String)> = None;

    for container in tasks.iter().flat_map(|t| t.containers.iter()) {
        let Some(code) = container.exit_code else {
            let reason = container.reason.clone().unwrap_or_else(|| {
                format!("container {} stopped without an exit code", container.name)
            });
            return Err(RunTaskError::Finalization(reason));
        };

        if code != 0 && failed.is_none() {
            failed = Some((code, container.name.clone()));
        }
    }

    let (exit_code, failed_container) = match failed {
        Some((code, name)) => (code, Some(name)),
        None => (0, None),
    };

    Ok(RunResult {
        exit_code,
        failed_container,
        tasks,
    })
}
