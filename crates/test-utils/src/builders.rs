#![allow(dead_code)]

use runtask::backend::{Container, Task};
use runtask::config::{ContainerDefinition, EnvVar, JobDefinition, RawJobDefinition};
use runtask::types::Status;

/// Builder for `JobDefinition` to simplify test setup.
pub struct DefinitionBuilder {
    raw: RawJobDefinition,
}

impl DefinitionBuilder {
    pub fn new(family: &str) -> Self {
        Self {
            raw: RawJobDefinition {
                family: family.to_string(),
                containers: Vec::new(),
                task_role: None,
                cpu: None,
                memory: None,
            },
        }
    }

    pub fn with_container(mut self, container: ContainerDefinition) -> Self {
        self.raw.containers.push(container);
        self
    }

    pub fn build(self) -> JobDefinition {
        JobDefinition::try_from(self.raw).expect("Failed to build valid definition from builder")
    }
}

/// Builder for `ContainerDefinition`.
pub struct ContainerDefBuilder {
    def: ContainerDefinition,
}

impl ContainerDefBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            def: ContainerDefinition {
                name: name.to_string(),
                image: None,
                command: Vec::new(),
                environment: Vec::new(),
                working_directory: None,
                essential: None,
                log_configuration: None,
            },
        }
    }

    pub fn image(mut self, image: &str) -> Self {
        self.def.image = Some(image.to_string());
        self
    }

    pub fn command(mut self, argv: &[&str]) -> Self {
        self.def.command = argv.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn env(mut self, name: &str, value: &str) -> Self {
        self.def.environment.push(EnvVar::new(name, value));
        self
    }

    pub fn build(self) -> ContainerDefinition {
        self.def
    }
}

/// A container as the fake orchestrator will run it.
#[derive(Debug, Clone)]
pub struct FakeContainer {
    pub name: String,
    pub id: String,
    /// Lines the container "prints" while running.
    pub output: Vec<String>,
    pub exit_code: Option<i32>,
    pub reason: Option<String>,
}

impl FakeContainer {
    pub fn new(name: &str, id: &str) -> Self {
        Self {
            name: name.to_string(),
            id: id.to_string(),
            output: Vec::new(),
            exit_code: Some(0),
            reason: None,
        }
    }

    pub fn prints(mut self, line: &str) -> Self {
        self.output.push(line.to_string());
        self
    }

    pub fn exits_with(mut self, code: i32) -> Self {
        self.exit_code = Some(code);
        self.reason = None;
        self
    }

    /// Stopped without ever running (no exit code).
    pub fn killed(mut self, reason: &str) -> Self {
        self.exit_code = None;
        self.reason = Some(reason.to_string());
        self
    }

    pub fn snapshot(&self, stopped: bool) -> Container {
        if stopped {
            Container {
                name: self.name.clone(),
                id: self.id.clone(),
                status: Status::Stopped,
                exit_code: self.exit_code,
                reason: self.reason.clone(),
            }
        } else {
            Container {
                name: self.name.clone(),
                id: self.id.clone(),
                status: Status::Running,
                exit_code: None,
                reason: None,
            }
        }
    }
}

/// A task instance as the fake orchestrator will run it.
#[derive(Debug, Clone)]
pub struct FakeTask {
    pub id: String,
    pub containers: Vec<FakeContainer>,
}

impl FakeTask {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            containers: Vec::new(),
        }
    }

    pub fn with_container(mut self, container: FakeContainer) -> Self {
        self.containers.push(container);
        self
    }

    pub fn snapshot(&self, stopped: bool) -> Task {
        Task {
            id: self.id.clone(),
            status: if stopped {
                Status::Stopped
            } else {
                Status::Running
            },
            containers: self.containers.iter().map(|c| c.snapshot(stopped)).collect(),
        }
    }
}

/// Stopped task with the given `(name, exit code)` containers, for
/// aggregation tests.
pub fn stopped_task(id: &str, containers: &[(&str, Option<i32>)]) -> Task {
    Task {
        id: id.to_string(),
        status: Status::Stopped,
        containers: containers
            .iter()
            .enumerate()
            .map(|(i, (name, code))| Container {
                name: name.to_string(),
                id: format!("{id}/container/{i}"),
                status: Status::Stopped,
                exit_code: *code,
                reason: code.is_none().then(|| "stopped before start".to_string()),
            })
            .collect(),
    }
}
