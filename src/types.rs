use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// How the orchestrator should place the submitted task instances.
///
/// - `Standard`: run on capacity the cluster already owns (default).
/// - `Serverless`: ask the backend to provision capacity per task
///   (`--fargate` on the CLI).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LaunchType {
    #[default]
    Standard,
    Serverless,
}

impl FromStr for LaunchType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "standard" | "ec2" => Ok(LaunchType::Standard),
            "serverless" | "fargate" => Ok(LaunchType::Serverless),
            other => Err(format!(
                "invalid launch type: {other} (expected \"standard\" or \"serverless\")"
            )),
        }
    }
}

impl fmt::Display for LaunchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LaunchType::Standard => f.write_str("standard"),
            LaunchType::Serverless => f.write_str("serverless"),
        }
    }
}

/// Lifecycle status of a task instance or one of its containers, as last
/// reported by the orchestrator backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Status {
    Pending,
    Running,
    Stopped,
}

impl Status {
    pub fn is_stopped(self) -> bool {
        self == Status::Stopped
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Pending => f.write_str("PENDING"),
            Status::Running => f.write_str("RUNNING"),
            Status::Stopped => f.write_str("STOPPED"),
        }
    }
}
