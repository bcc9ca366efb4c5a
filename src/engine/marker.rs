// src/engine/marker.rs

//! Finish markers.
//!
//! Once the orchestrator reports a container stopped, a synthetic entry
//! `Container <short id> exited with <code>` is appended to that container's
//! stream. The tailer for the container recognises it as its sentinel.

use tracing::info;

use crate::backend::{Container, LogBackend};
use crate::engine::stream::{LogStreamRef, short_id};
use crate::errors::{Result, RunTaskError};

/// Literal prefix every finish marker for `container_id` starts with.
pub fn sentinel_prefix(container_id: &str) -> String {
    format!("Container {} exited with", short_id(container_id))
}

/// Full finish-marker text.
pub fn finish_marker(container_id: &str, exit_code: i32) -> String {
    format!("{} {}", sentinel_prefix(container_id), exit_code)
}

/// Appends finish markers to container streams in one log group.
pub struct FinishMarkerWriter<'a> {
    logs: &'a dyn LogBackend,
    group: &'a str,
}

impl<'a> FinishMarkerWriter<'a> {
    pub fn new(logs: &'a dyn LogBackend, group: &'a str) -> Self {
        Self { logs, group }
    }

    /// Write exactly one marker for a stopped container and return its exit
    /// code.
    ///
    /// Fails with an invariant violation if the container is not stopped,
    /// and with the container's stop reason if it has no exit code.
    pub async fn write(&self, stream: &LogStreamRef, container: &Container) -> Result<i32> {
        if !container.status.is_stopped() {
            return Err(RunTaskError::InvariantViolation(format!(
                "expected container to be STOPPED, got {}",
                container.status
            )));
        }

        let Some(exit_code) = container.exit_code else {
            let reason = container.reason.clone().unwrap_or_else(|| {
                format!("container {} stopped without an exit code", container.name)
            });
            return Err(RunTaskError::Finalization(reason));
        };

        let stream_name = stream.to_string();
        let message = finish_marker(&container.id, exit_code);
        self.logs
            .append_event(self.group, &stream_name, &message)
            .await
            .map_err(|e| {
                RunTaskError::Finalization(format!(
                    "writing finish marker to {stream_name}: {e:#}"
                ))
            })?;

        info!(container = %container.name, stream = %stream_name, exit_code, "wrote finish marker");
        Ok(exit_code)
    }
}
