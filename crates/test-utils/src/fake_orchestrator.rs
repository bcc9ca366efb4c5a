use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use runtask::backend::{DefinitionRef, JobSubmission, OrchestratorBackend, Task};
use runtask::config::JobDefinition;
use runtask::engine::LogStreamRef;

use crate::builders::FakeTask;
use crate::memory_logs::MemoryLogStore;

#[derive(Default)]
struct FakeState {
    registered: Vec<JobDefinition>,
    submissions: Vec<JobSubmission>,
}

#[derive(Default, Clone)]
struct Failures {
    register: Option<String>,
    submit: Option<String>,
    wait: Option<String>,
    describe: Option<String>,
}

/// A scripted orchestrator that:
/// - records registered definitions and submissions
/// - on submit, writes each container's scripted output into its log stream
///   (as routed by the registered definition's log configuration)
/// - reports the scripted tasks stopped, either immediately or once
///   [`FakeOrchestrator::release`] is called.
pub struct FakeOrchestrator {
    tasks: Vec<FakeTask>,
    logs: Option<Arc<MemoryLogStore>>,
    auto_stop: bool,
    stop: CancellationToken,
    state: Mutex<FakeState>,
    failures: Failures,
}

impl FakeOrchestrator {
    pub fn new(tasks: Vec<FakeTask>) -> Self {
        Self {
            tasks,
            logs: None,
            auto_stop: true,
            stop: CancellationToken::new(),
            state: Mutex::new(FakeState::default()),
            failures: Failures::default(),
        }
    }

    pub fn with_logs(mut self, logs: Arc<MemoryLogStore>) -> Self {
        self.logs = Some(logs);
        self
    }

    /// Block `wait_until_stopped` until [`release`](Self::release).
    pub fn manual_stop(mut self) -> Self {
        self.auto_stop = false;
        self
    }

    pub fn release(&self) {
        self.stop.cancel();
    }

    pub fn fail_register(mut self, msg: &str) -> Self {
        self.failures.register = Some(msg.to_string());
        self
    }

    pub fn fail_submit(mut self, msg: &str) -> Self {
        self.failures.submit = Some(msg.to_string());
        self
    }

    pub fn fail_wait(mut self, msg: &str) -> Self {
        self.failures.wait = Some(msg.to_string());
        self
    }

    pub fn fail_describe(mut self, msg: &str) -> Self {
        self.failures.describe = Some(msg.to_string());
        self
    }

    pub fn registered(&self) -> Vec<JobDefinition> {
        self.state.lock().unwrap().registered.clone()
    }

    pub fn submissions(&self) -> Vec<JobSubmission> {
        self.state.lock().unwrap().submissions.clone()
    }

    fn is_stopped(&self) -> bool {
        self.auto_stop || self.stop.is_cancelled()
    }

    fn write_scripted_output(&self, definition: &JobDefinition) {
        let Some(logs) = &self.logs else {
            return;
        };

        for task in self.tasks.iter() {
            for container in task.containers.iter() {
                let Some(cfg) = definition
                    .container(&container.name)
                    .and_then(|c| c.log_configuration.as_ref())
                else {
                    continue;
                };
                let (Some(group), Some(prefix)) = (cfg.group(), cfg.stream_prefix()) else {
                    continue;
                };
                let stream = LogStreamRef::new(prefix, &container.name, &task.id).to_string();
                for line in container.output.iter() {
                    logs.push(group, &stream, line);
                }
            }
        }
    }
}

#[async_trait]
impl OrchestratorBackend for FakeOrchestrator {
    async fn register_definition(&self, definition: &JobDefinition) -> Result<DefinitionRef> {
        if let Some(msg) = &self.failures.register {
            return Err(anyhow!(msg.clone()));
        }
        let mut state = self.state.lock().unwrap();
        state.registered.push(definition.clone());
        Ok(DefinitionRef {
            family: definition.family.clone(),
            revision: state.registered.len() as u32,
        })
    }

    async fn submit_job(&self, submission: &JobSubmission) -> Result<Vec<Task>> {
        if let Some(msg) = &self.failures.submit {
            return Err(anyhow!(msg.clone()));
        }

        let definition = {
            let mut state = self.state.lock().unwrap();
            state.submissions.push(submission.clone());
            state
                .registered
                .last()
                .cloned()
                .ok_or_else(|| anyhow!("nothing registered"))?
        };

        self.write_scripted_output(&definition);

        Ok(self.tasks.iter().map(|t| t.snapshot(false)).collect())
    }

    async fn describe_tasks(&self, _cluster: &str, task_ids: &[String]) -> Result<Vec<Task>> {
        if let Some(msg) = &self.failures.describe {
            return Err(anyhow!(msg.clone()));
        }

        let stopped = self.is_stopped();
        Ok(self
            .tasks
            .iter()
            .filter(|t| task_ids.contains(&t.id))
            .map(|t| t.snapshot(stopped))
            .collect())
    }

    async fn wait_until_stopped(&self, _cluster: &str, _task_ids: &[String]) -> Result<()> {
        if let Some(msg) = &self.failures.wait {
            return Err(anyhow!(msg.clone()));
        }
        if !self.auto_stop {
            self.stop.cancelled().await;
        }
        Ok(())
    }
}
