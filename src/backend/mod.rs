// src/backend/mod.rs

//! Pluggable orchestrator and log backend abstraction.
//!
//! The run engine talks to an [`OrchestratorBackend`] and a [`LogBackend`]
//! instead of a concrete service. Production wiring uses
//! [`local::LocalOrchestrator`] (containers run as local processes) and
//! [`file_store::FileLogStore`] (streams as JSON-lines files); tests provide
//! in-memory fakes that script task lifecycles and log contents.
//!
//! Backend methods return `anyhow::Result`; the engine decides which stage
//! of the run an error belongs to and maps it into
//! [`crate::errors::RunTaskError`].

use std::fmt;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::JobDefinition;
use crate::overrides::ContainerOverride;
use crate::types::{Status, LaunchType};

pub mod file_store;
pub mod local;

pub use file_store::FileLogStore;
pub use local::LocalOrchestrator;

/// A registered definition: `family:revision`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DefinitionRef {
    pub family: String,
    pub revision: u32,
}

impl fmt::Display for DefinitionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.family, self.revision)
    }
}

/// Network placement for task instances.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct NetworkConfig {
    pub subnets: Vec<String>,
    pub security_groups: Vec<String>,
    pub assign_public_ip: bool,
}

impl NetworkConfig {
    /// Build a network configuration, or `None` when neither subnets nor
    /// security groups are given.
    pub fn from_parts(subnets: &[String], security_groups: &[String]) -> Option<Self> {
        if subnets.is_empty() && security_groups.is_empty() {
            return None;
        }
        Some(Self {
            subnets: subnets.to_vec(),
            security_groups: security_groups.to_vec(),
            assign_public_ip: true,
        })
    }
}

/// Everything needed to start a job on the orchestrator.
#[derive(Debug, Clone, Serialize)]
pub struct JobSubmission {
    pub definition: DefinitionRef,
    pub cluster: String,
    pub count: u32,
    pub launch_type: LaunchType,
    pub network: Option<NetworkConfig>,
    pub overrides: Vec<ContainerOverride>,
}

/// One running instance of a submitted job, as observed on the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    /// Unique identifier; the trailing `/` segment is the short id.
    pub id: String,
    pub status: Status,
    pub containers: Vec<Container>,
}

impl Task {
    pub fn is_stopped(&self) -> bool {
        self.status.is_stopped() && self.containers.iter().all(|c| c.status.is_stopped())
    }
}

/// One container within a task instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Container {
    pub name: String,
    pub id: String,
    pub status: Status,
    /// Present only once the container stopped after running.
    pub exit_code: Option<i32>,
    /// Why the container stopped, when there is no exit code to report.
    pub reason: Option<String>,
}

/// A single entry in a log stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEvent {
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    pub message: String,
}

impl LogEvent {
    pub fn now(message: impl Into<String>) -> Self {
        Self {
            timestamp: chrono::Utc::now().timestamp_millis(),
            message: message.into(),
        }
    }
}

/// Position in a log stream.
///
/// What the number means is up to the backend (an entry index in memory, a
/// byte offset on disk). Callers start at [`LogCursor::start`] and otherwise
/// only pass back the `next` of the previous page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct LogCursor(pub u64);

impl LogCursor {
    pub fn start() -> Self {
        LogCursor(0)
    }

    pub fn advance(self, by: usize) -> Self {
        LogCursor(self.0 + by as u64)
    }
}

/// Entries returned by one fetch, plus where the next fetch should start.
#[derive(Debug, Clone, Default)]
pub struct LogPage {
    pub events: Vec<LogEvent>,
    pub next: LogCursor,
}

/// Orchestrator API consumed by the run engine.
#[async_trait]
pub trait OrchestratorBackend: Send + Sync {
    /// Register a definition and return the reference to submit against.
    async fn register_definition(&self, definition: &JobDefinition) -> Result<DefinitionRef>;

    /// Start `submission.count` task instances.
    async fn submit_job(&self, submission: &JobSubmission) -> Result<Vec<Task>>;

    /// Current state of the given tasks, in request order.
    async fn describe_tasks(&self, cluster: &str, task_ids: &[String]) -> Result<Vec<Task>>;

    /// Resolve once every given task and all of its containers are stopped.
    ///
    /// There is no timeout; callers race this against their own cancellation.
    async fn wait_until_stopped(&self, cluster: &str, task_ids: &[String]) -> Result<()>;
}

/// Log API consumed by the run engine.
#[async_trait]
pub trait LogBackend: Send + Sync {
    /// Create the log group if it does not exist yet.
    async fn ensure_group(&self, group: &str) -> Result<()>;

    /// Entries of `stream` from `cursor` onwards, in arrival order.
    ///
    /// A stream that has not been written yet reads as empty.
    async fn fetch_events(&self, group: &str, stream: &str, cursor: LogCursor) -> Result<LogPage>;

    /// Append one entry to `stream`, creating the stream if needed.
    async fn append_event(&self, group: &str, stream: &str, message: &str) -> Result<()>;
}
