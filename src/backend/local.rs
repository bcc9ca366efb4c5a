// src/backend/local.rs

//! Orchestrator backend that runs every container as a local process.
//!
//! Each container's command is spawned with `tokio::process::Command`; its
//! stdout and stderr lines are appended to the container's log stream through
//! the shared [`LogBackend`], exactly where the log configuration on the
//! registered definition says they should go. Exit codes are recorded when
//! the process ends, after all of its output has been shipped.

use std::collections::HashMap;
use std::process::{ExitStatus, Stdio};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{
    Container, DefinitionRef, JobSubmission, LogBackend, OrchestratorBackend, Task,
};
use crate::config::{ContainerDefinition, EnvVar, JobDefinition};
use crate::engine::stream::LogStreamRef;
use crate::overrides::ContainerOverride;
use crate::types::Status;

/// How often `wait_until_stopped` re-checks task state.
const DEFAULT_WAIT_INTERVAL: Duration = Duration::from_millis(250);

/// Where a container's output goes.
#[derive(Debug, Clone)]
struct LogTarget {
    group: String,
    stream: String,
}

/// What to launch for one container.
#[derive(Debug, Clone)]
struct Launch {
    task_id: String,
    container_index: usize,
    container_name: String,
    command: Vec<String>,
    environment: Vec<EnvVar>,
    working_directory: Option<String>,
    log_target: Option<LogTarget>,
}

#[derive(Debug, Default)]
struct LocalState {
    /// family -> registered revisions (revision N is at index N - 1)
    definitions: HashMap<String, Vec<JobDefinition>>,
    tasks: HashMap<String, Task>,
}

/// Local-process orchestrator.
pub struct LocalOrchestrator {
    logs: Arc<dyn LogBackend>,
    state: Arc<Mutex<LocalState>>,
    wait_interval: Duration,
}

impl LocalOrchestrator {
    pub fn new(logs: Arc<dyn LogBackend>) -> Self {
        Self {
            logs,
            state: Arc::new(Mutex::new(LocalState::default())),
            wait_interval: DEFAULT_WAIT_INTERVAL,
        }
    }

    pub fn with_wait_interval(mut self, interval: Duration) -> Self {
        self.wait_interval = interval;
        self
    }

    fn lock(&self) -> MutexGuard<'_, LocalState> {
        lock_state(&self.state)
    }
}

fn lock_state(state: &Mutex<LocalState>) -> MutexGuard<'_, LocalState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

#[async_trait]
impl OrchestratorBackend for LocalOrchestrator {
    async fn register_definition(&self, definition: &JobDefinition) -> Result<DefinitionRef> {
        let mut state = self.lock();
        let revisions = state
            .definitions
            .entry(definition.family.clone())
            .or_default();
        revisions.push(definition.clone());

        let revision = u32::try_from(revisions.len()).context("too many revisions")?;
        debug!(family = %definition.family, revision, "registered definition");
        Ok(DefinitionRef {
            family: definition.family.clone(),
            revision,
        })
    }

    async fn submit_job(&self, submission: &JobSubmission) -> Result<Vec<Task>> {
        if submission.count == 0 {
            bail!("count must be at least 1");
        }

        let definition = {
            let state = self.lock();
            let def_ref = &submission.definition;
            state
                .definitions
                .get(&def_ref.family)
                .and_then(|revs| revs.get((def_ref.revision as usize).wrapping_sub(1)))
                .cloned()
                .ok_or_else(|| anyhow!("definition {} is not registered", def_ref))?
        };

        for o in submission.overrides.iter() {
            if definition.container(&o.name).is_none() {
                bail!(
                    "override targets container '{}' which is not in definition {}",
                    o.name,
                    submission.definition
                );
            }
        }

        if let Some(network) = &submission.network {
            debug!(
                subnets = ?network.subnets,
                security_groups = ?network.security_groups,
                "network configuration has no effect on local processes"
            );
        }

        let mut tasks = Vec::with_capacity(submission.count as usize);
        let mut launches = Vec::new();

        for _ in 0..submission.count {
            let task_id = format!("local:task/{}/{}", submission.cluster, Uuid::new_v4());
            let mut containers = Vec::with_capacity(definition.containers.len());

            for (index, def) in definition.containers.iter().enumerate() {
                let container_id = format!(
                    "local:container/{}/{}",
                    submission.cluster,
                    Uuid::new_v4()
                );
                containers.push(Container {
                    name: def.name.clone(),
                    id: container_id,
                    status: Status::Pending,
                    exit_code: None,
                    reason: None,
                });

                let override_for = submission.overrides.iter().find(|o| o.name == def.name);
                launches.push(build_launch(&task_id, index, def, override_for));
            }

            tasks.push(Task {
                id: task_id,
                status: Status::Pending,
                containers,
            });
        }

        {
            let mut state = self.lock();
            for task in tasks.iter() {
                state.tasks.insert(task.id.clone(), task.clone());
            }
        }

        info!(
            definition = %submission.definition,
            cluster = %submission.cluster,
            launch_type = %submission.launch_type,
            count = submission.count,
            "starting local task instances"
        );

        for launch in launches {
            let state = Arc::clone(&self.state);
            let logs = Arc::clone(&self.logs);
            tokio::spawn(async move {
                run_container(launch, state, logs).await;
            });
        }

        Ok(tasks)
    }

    async fn describe_tasks(&self, _cluster: &str, task_ids: &[String]) -> Result<Vec<Task>> {
        let state = self.lock();
        task_ids
            .iter()
            .map(|id| {
                state
                    .tasks
                    .get(id)
                    .cloned()
                    .ok_or_else(|| anyhow!("unknown task {id}"))
            })
            .collect()
    }

    async fn wait_until_stopped(&self, cluster: &str, task_ids: &[String]) -> Result<()> {
        loop {
            let tasks = self.describe_tasks(cluster, task_ids).await?;
            if tasks.iter().all(Task::is_stopped) {
                return Ok(());
            }
            tokio::time::sleep(self.wait_interval).await;
        }
    }
}

/// Merge a definition with its override (override command replaces, override
/// environment entries win over definition entries of the same name).
fn build_launch(
    task_id: &str,
    container_index: usize,
    def: &ContainerDefinition,
    override_for: Option<&ContainerOverride>,
) -> Launch {
    let mut command = def.command.clone();
    let mut environment = def.environment.clone();

    if let Some(o) = override_for {
        command = o.command.clone();
        for var in o.environment.iter() {
            environment.retain(|e| e.name != var.name);
            environment.push(var.clone());
        }
    }

    let log_target = def.log_configuration.as_ref().and_then(|cfg| {
        let group = cfg.group()?;
        let prefix = cfg.stream_prefix()?;
        Some(LogTarget {
            group: group.to_string(),
            stream: LogStreamRef::new(prefix, &def.name, task_id).to_string(),
        })
    });

    Launch {
        task_id: task_id.to_string(),
        container_index,
        container_name: def.name.clone(),
        command,
        environment,
        working_directory: def.working_directory.clone(),
        log_target,
    }
}

/// Run one container process to completion and record how it ended.
async fn run_container(launch: Launch, state: Arc<Mutex<LocalState>>, logs: Arc<dyn LogBackend>) {
    let Some((program, args)) = launch.command.split_first() else {
        let reason = format!(
            "CannotStartContainerError: container '{}' has no command",
            launch.container_name
        );
        warn!(container = %launch.container_name, "{}", reason);
        mark_stopped(&state, &launch, None, Some(reason));
        return;
    };

    let mut cmd = Command::new(program);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    for var in launch.environment.iter() {
        cmd.env(&var.name, &var.value);
    }
    if let Some(dir) = &launch.working_directory {
        cmd.current_dir(dir);
    }

    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(e) => {
            let reason = format!("CannotStartContainerError: {e}");
            warn!(container = %launch.container_name, error = %e, "failed to start container process");
            mark_stopped(&state, &launch, None, Some(reason));
            return;
        }
    };

    info!(
        task = %launch.task_id,
        container = %launch.container_name,
        program = %program,
        "container process started"
    );
    mark_running(&state, &launch);

    let mut shippers = Vec::new();
    if let Some(stdout) = child.stdout.take() {
        shippers.push(tokio::spawn(ship_lines(
            stdout,
            launch.clone(),
            Arc::clone(&logs),
        )));
    }
    if let Some(stderr) = child.stderr.take() {
        shippers.push(tokio::spawn(ship_lines(
            stderr,
            launch.clone(),
            Arc::clone(&logs),
        )));
    }

    let status = child.wait().await;

    // Output must be in the stream before the container is reported stopped.
    for shipper in shippers {
        if let Err(e) = shipper.await {
            warn!(container = %launch.container_name, error = %e, "log shipper task failed");
        }
    }

    match status {
        Ok(status) => {
            let code = container_exit_code(&status);
            info!(
                task = %launch.task_id,
                container = %launch.container_name,
                exit_code = ?code,
                success = status.success(),
                "container process exited"
            );
            let reason = match (status.code(), code) {
                (Some(_), _) => None,
                (None, Some(_)) => Some("Container terminated by signal".to_string()),
                (None, None) => Some(format!("ContainerRuntimeError: no exit status ({status})")),
            };
            mark_stopped(&state, &launch, code, reason);
        }
        Err(e) => {
            warn!(container = %launch.container_name, error = %e, "waiting for container process failed");
            mark_stopped(&state, &launch, None, Some(format!("ContainerRuntimeError: {e}")));
        }
    }
}

/// Forward every line of a process stream into the container's log stream.
///
/// Reads until EOF whatever the bytes are, so the child never writes into a
/// closed pipe. Invalid UTF-8 is replaced, not dropped.
async fn ship_lines<R>(reader: R, launch: Launch, logs: Arc<dyn LogBackend>)
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();

    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => {
                warn!(container = %launch.container_name, error = %e, "reading container output failed");
                break;
            }
        }

        let line = String::from_utf8_lossy(trim_line_ending(&buf));
        match &launch.log_target {
            Some(target) => {
                if let Err(e) = logs.append_event(&target.group, &target.stream, &line).await {
                    warn!(
                        container = %launch.container_name,
                        stream = %target.stream,
                        error = %e,
                        "dropping container output line"
                    );
                }
            }
            None => debug!(container = %launch.container_name, "output: {}", line),
        }
    }
}

fn trim_line_ending(buf: &[u8]) -> &[u8] {
    let buf = buf.strip_suffix(b"\n").unwrap_or(buf);
    buf.strip_suffix(b"\r").unwrap_or(buf)
}

/// Exit code as a container runtime reports it: the process's own code, or
/// `128 + signal` when it was killed by a signal.
fn container_exit_code(status: &ExitStatus) -> Option<i32> {
    if let Some(code) = status.code() {
        return Some(code);
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return Some(128 + signal);
        }
    }
    None
}

fn mark_running(state: &Mutex<LocalState>, launch: &Launch) {
    update_container(state, launch, |c| c.status = Status::Running);
}

fn mark_stopped(
    state: &Mutex<LocalState>,
    launch: &Launch,
    exit_code: Option<i32>,
    reason: Option<String>,
) {
    update_container(state, launch, |c| {
        c.status = Status::Stopped;
        c.exit_code = exit_code;
        c.reason = reason;
    });
}

fn update_container(
    state: &Mutex<LocalState>,
    launch: &Launch,
    apply: impl FnOnce(&mut Container),
) {
    let mut state = lock_state(state);
    let Some(task) = state.tasks.get_mut(&launch.task_id) else {
        warn!(task = %launch.task_id, "container update for unknown task");
        return;
    };

    if let Some(container) = task.containers.get_mut(launch.container_index) {
        apply(container);
    }

    task.status = if task.containers.iter().all(|c| c.status.is_stopped()) {
        Status::Stopped
    } else if task
        .containers
        .iter()
        .any(|c| c.status == Status::Running)
    {
        Status::Running
    } else {
        Status::Pending
    };
}
