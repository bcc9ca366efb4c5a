// src/engine/runtime.rs

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::backend::{
    JobSubmission, LogBackend, NetworkConfig, OrchestratorBackend, Task,
};
use crate::config::{JobDefinition, LogConfiguration};
use crate::engine::core::{RunPhase, RunResult, aggregate_exit_code, sentinel_predicate};
use crate::engine::marker::FinishMarkerWriter;
use crate::engine::stream::LogStreamRef;
use crate::engine::tailer::{LogTailer, OutputSink, TailExit};
use crate::errors::{Result, RunTaskError};
use crate::overrides::ContainerOverride;
use crate::types::LaunchType;

/// Everything a single run needs, already resolved and validated.
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub definition: JobDefinition,
    pub overrides: Vec<ContainerOverride>,
    pub cluster: String,
    pub count: u32,
    pub launch_type: LaunchType,
    pub network: Option<NetworkConfig>,
    pub log_group: String,
    pub region: Option<String>,
    /// Run name; every stream of this run starts with it.
    pub stream_prefix: String,
}

#[derive(Debug, Clone, Copy)]
pub struct RunOptions {
    /// Wait between tailer fetches.
    pub poll_interval: Duration,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
        }
    }
}

/// Drives one run end to end:
///
/// 1. submit the job,
/// 2. start one tailer per container,
/// 3. wait for the backend to report every task stopped,
/// 4. write a finish marker per container and signal its tailer,
/// 5. join the tailers,
/// 6. aggregate exit codes.
///
/// Tailers and the termination wait run concurrently; the `JoinSet` is the
/// only barrier between them.
pub struct RunOrchestrator {
    orchestrator: Arc<dyn OrchestratorBackend>,
    logs: Arc<dyn LogBackend>,
    sink: Arc<dyn OutputSink>,
    options: RunOptions,
}

impl fmt::Debug for RunOrchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunOrchestrator")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

/// A tailer that has been started, plus the token that tells it its
/// container is done.
struct TailerHandle {
    stream: LogStreamRef,
    finished: CancellationToken,
}

impl RunOrchestrator {
    pub fn new(
        orchestrator: Arc<dyn OrchestratorBackend>,
        logs: Arc<dyn LogBackend>,
        sink: Arc<dyn OutputSink>,
        options: RunOptions,
    ) -> Self {
        Self {
            orchestrator,
            logs,
            sink,
            options,
        }
    }

    /// Run the job to completion.
    ///
    /// Returns the aggregated [`RunResult`]; a non-zero container exit code is
    /// a result, not an error. Cancelling `cancel` aborts the run with
    /// [`RunTaskError::Cancelled`] and stops every tailer.
    pub async fn run(&self, request: RunRequest, cancel: CancellationToken) -> Result<RunResult> {
        enter(RunPhase::Submitting);
        let tasks = self.submit(&request, &cancel).await?;

        enter(RunPhase::Running);
        let tail_cancel = cancel.child_token();
        // Any early return below stops the tailers.
        let _stop_tailers = tail_cancel.clone().drop_guard();
        let mut tailers = JoinSet::new();
        let handles = self.spawn_tailers(&request, &tasks, &mut tailers, &tail_cancel);

        enter(RunPhase::AwaitingTermination);
        let task_ids: Vec<String> = tasks.iter().map(|t| t.id.clone()).collect();
        for id in task_ids.iter() {
            info!("Waiting until task {} has stopped", id);
        }
        until_cancelled(
            &cancel,
            self.orchestrator.wait_until_stopped(&request.cluster, &task_ids),
        )
        .await?
        .map_err(|e| RunTaskError::Polling(format!("{e:#}")))?;
        info!("All tasks have stopped");

        enter(RunPhase::Finalizing);
        let final_tasks = until_cancelled(
            &cancel,
            self.orchestrator.describe_tasks(&request.cluster, &task_ids),
        )
        .await?
        .map_err(|e| RunTaskError::Polling(format!("{e:#}")))?;
        self.finalize(&request, &final_tasks, &handles).await?;

        enter(RunPhase::Joining);
        info!("Waiting for logs to finish");
        while let Some(joined) = tailers.join_next().await {
            if let Err(e) = joined {
                warn!(error = %e, "log tailer task did not complete");
            }
        }

        let result = aggregate_exit_code(final_tasks)?;
        enter(RunPhase::Done);
        Ok(result)
    }

    /// Create the log group, register the definition with logging routed to
    /// it, and submit the job.
    async fn submit(&self, request: &RunRequest, cancel: &CancellationToken) -> Result<Vec<Task>> {
        until_cancelled(cancel, self.logs.ensure_group(&request.log_group))
            .await?
            .map_err(|e| {
                RunTaskError::Submission(format!(
                    "creating log group {}: {e:#}",
                    request.log_group
                ))
            })?;

        info!("Setting tasks to use log group {}", request.log_group);
        let mut definition = request.definition.clone();
        definition.set_log_configuration(&LogConfiguration::for_run(
            &request.log_group,
            request.region.as_deref(),
            &request.stream_prefix,
        ));

        info!("Registering a task for {}", definition.family);
        let definition_ref =
            until_cancelled(cancel, self.orchestrator.register_definition(&definition))
                .await?
                .map_err(|e| {
                    RunTaskError::Submission(format!(
                        "registering definition {}: {e:#}",
                        definition.family
                    ))
                })?;

        let submission = JobSubmission {
            definition: definition_ref,
            cluster: request.cluster.clone(),
            count: request.count,
            launch_type: request.launch_type,
            network: request.network.clone(),
            overrides: request.overrides.clone(),
        };

        info!("Running task {}", submission.definition);
        let tasks = until_cancelled(cancel, self.orchestrator.submit_job(&submission))
            .await?
            .map_err(|e| RunTaskError::Submission(format!("{e:#}")))?;

        if tasks.is_empty() {
            return Err(RunTaskError::Submission(
                "orchestrator started no tasks".to_string(),
            ));
        }

        Ok(tasks)
    }

    /// Start one tailer per container, keyed by container id.
    fn spawn_tailers(
        &self,
        request: &RunRequest,
        tasks: &[Task],
        tailers: &mut JoinSet<()>,
        cancel: &CancellationToken,
    ) -> HashMap<String, TailerHandle> {
        let mut handles = HashMap::new();

        for task in tasks {
            for container in task.containers.iter() {
                let stream = LogStreamRef::new(&request.stream_prefix, &container.name, &task.id);
                let finished = CancellationToken::new();
                let tailer = LogTailer::new(
                    Arc::clone(&self.logs),
                    &request.log_group,
                    stream.clone(),
                    self.options.poll_interval,
                );
                let predicate = sentinel_predicate(&container.id);
                let sink = Arc::clone(&self.sink);
                let tailer_finished = finished.clone();
                let tailer_cancel = cancel.clone();

                debug!(container = %container.name, stream = %stream, "spawning log tailer");
                tailers.spawn(async move {
                    match tailer
                        .watch(predicate, sink.as_ref(), &tailer_finished, &tailer_cancel)
                        .await
                    {
                        Ok(TailExit::Cancelled) => {
                            debug!(stream = %tailer.stream(), "log tailer stopped by cancellation")
                        }
                        Ok(exit) => debug!(stream = %tailer.stream(), ?exit, "log tailer finished"),
                        Err(e) => warn!("Log watcher returned error: {e:#}"),
                    }
                });

                handles.insert(container.id.clone(), TailerHandle { stream, finished });
            }
        }

        handles
    }

    /// Write a finish marker for every container and tell its tailer it is
    /// done. The first failure aborts the run.
    async fn finalize(
        &self,
        request: &RunRequest,
        final_tasks: &[Task],
        handles: &HashMap<String, TailerHandle>,
    ) -> Result<()> {
        let writer = FinishMarkerWriter::new(self.logs.as_ref(), &request.log_group);

        for task in final_tasks {
            for container in task.containers.iter() {
                let handle = handles.get(&container.id);
                let stream = match handle {
                    Some(h) => h.stream.clone(),
                    None => {
                        warn!(container = %container.name, task = %task.id, "no tailer for container");
                        LogStreamRef::new(&request.stream_prefix, &container.name, &task.id)
                    }
                };

                writer.write(&stream, container).await?;

                if let Some(h) = handle {
                    h.finished.cancel();
                }
            }
        }

        Ok(())
    }
}

fn enter(phase: RunPhase) {
    debug!(%phase, "run phase");
}

/// Await `fut` unless `cancel` fires first.
async fn until_cancelled<F, T>(cancel: &CancellationToken, fut: F) -> Result<T>
where
    F: Future<Output = T>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(RunTaskError::Cancelled),
        out = fut => Ok(out),
    }
}
