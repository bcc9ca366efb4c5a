// src/config/model.rs

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Job definition as read from a TOML (or JSON) file.
///
/// ```toml
/// family = "billing-migrate"
///
/// [[container]]
/// name = "app"
/// image = "registry.example.com/billing:latest"
/// command = ["./migrate", "--all"]
/// environment = [{ name = "RAILS_ENV", value = "${RAILS_ENV}" }]
/// ```
///
/// JSON files may use the `containerDefinitions` spelling for the container
/// list.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawJobDefinition {
    pub family: String,

    #[serde(default, rename = "container", alias = "containerDefinitions")]
    pub containers: Vec<ContainerDefinition>,

    #[serde(default, alias = "taskRoleArn")]
    pub task_role: Option<String>,

    #[serde(default)]
    pub cpu: Option<String>,

    #[serde(default)]
    pub memory: Option<String>,
}

/// One container of a job definition.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct ContainerDefinition {
    pub name: String,

    #[serde(default)]
    pub image: Option<String>,

    /// Argument vector; the first element is the program.
    #[serde(default)]
    pub command: Vec<String>,

    #[serde(default)]
    pub environment: Vec<EnvVar>,

    #[serde(default, alias = "workingDirectory")]
    pub working_directory: Option<String>,

    #[serde(default)]
    pub essential: Option<bool>,

    /// Where the container's console output is shipped.
    ///
    /// Always overwritten before registration so every container logs to the
    /// run's log group.
    #[serde(default, alias = "logConfiguration")]
    pub log_configuration: Option<LogConfiguration>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct EnvVar {
    pub name: String,
    pub value: String,
}

impl EnvVar {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Log driver settings attached to a container definition.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct LogConfiguration {
    #[serde(alias = "logDriver")]
    pub driver: String,

    #[serde(default)]
    pub options: BTreeMap<String, String>,
}

/// Name of the log driver this tool installs on every container.
pub const LOG_DRIVER: &str = "runtask-logs";
pub const LOG_OPTION_GROUP: &str = "group";
pub const LOG_OPTION_REGION: &str = "region";
pub const LOG_OPTION_STREAM_PREFIX: &str = "stream-prefix";

impl LogConfiguration {
    /// Route output to `group`, with streams named `<prefix>/<container>/<task>`.
    pub fn for_run(group: &str, region: Option<&str>, stream_prefix: &str) -> Self {
        let mut options = BTreeMap::new();
        options.insert(LOG_OPTION_GROUP.to_string(), group.to_string());
        if let Some(region) = region {
            options.insert(LOG_OPTION_REGION.to_string(), region.to_string());
        }
        options.insert(
            LOG_OPTION_STREAM_PREFIX.to_string(),
            stream_prefix.to_string(),
        );
        Self {
            driver: LOG_DRIVER.to_string(),
            options,
        }
    }

    pub fn group(&self) -> Option<&str> {
        self.options.get(LOG_OPTION_GROUP).map(String::as_str)
    }

    pub fn stream_prefix(&self) -> Option<&str> {
        self.options
            .get(LOG_OPTION_STREAM_PREFIX)
            .map(String::as_str)
    }
}

/// Validated job definition.
///
/// Only constructed through `TryFrom<RawJobDefinition>` (see
/// [`crate::config::validate`]), so a `JobDefinition` always has a family and
/// at least one uniquely named container.
#[derive(Debug, Clone, Serialize)]
pub struct JobDefinition {
    pub family: String,
    pub containers: Vec<ContainerDefinition>,
    pub task_role: Option<String>,
    pub cpu: Option<String>,
    pub memory: Option<String>,
}

impl JobDefinition {
    pub(crate) fn new_unchecked(raw: RawJobDefinition) -> Self {
        Self {
            family: raw.family,
            containers: raw.containers,
            task_role: raw.task_role,
            cpu: raw.cpu,
            memory: raw.memory,
        }
    }

    pub fn container_names(&self) -> impl Iterator<Item = &str> {
        self.containers.iter().map(|c| c.name.as_str())
    }

    pub fn container(&self, name: &str) -> Option<&ContainerDefinition> {
        self.containers.iter().find(|c| c.name == name)
    }

    /// Point every container's logging at the given group and prefix.
    pub fn set_log_configuration(&mut self, config: &LogConfiguration) {
        for def in self.containers.iter_mut() {
            def.log_configuration = Some(config.clone());
        }
    }
}
