// src/engine/stream.rs

//! Log stream addressing.

use std::fmt;

/// Trailing `/` segment of an identifier (`a/b/c` -> `c`).
pub fn short_id(id: &str) -> &str {
    id.rsplit('/').next().unwrap_or(id)
}

/// Deterministic address of one container's log output:
/// `<prefix>/<container name>/<short task id>`.
///
/// Both the tailer (reading) and the finish-marker writer (writing) derive the
/// stream this way, so they always agree on where a container logs.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LogStreamRef {
    pub prefix: String,
    pub container_name: String,
    pub task_id_base: String,
}

impl LogStreamRef {
    pub fn new(prefix: &str, container_name: &str, task_id: &str) -> Self {
        Self {
            prefix: prefix.to_string(),
            container_name: container_name.to_string(),
            task_id_base: short_id(task_id).to_string(),
        }
    }
}

impl fmt::Display for LogStreamRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}",
            self.prefix, self.container_name, self.task_id_base
        )
    }
}
