// src/lib.rs

pub mod backend;
pub mod cli;
pub mod config;
pub mod engine;
pub mod env;
pub mod errors;
pub mod logging;
pub mod overrides;
pub mod types;

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::backend::{FileLogStore, LocalOrchestrator, LogBackend, NetworkConfig};
use crate::cli::CliArgs;
use crate::config::load_and_validate;
use crate::engine::{
    RunOptions, RunOrchestrator, RunRequest, RunResult, StdoutSink, generated_stream_prefix,
};
use crate::env::{EnvLookup, ProcessEnv};
use crate::errors::Result;
use crate::overrides::resolve_overrides;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - definition loading and override resolution (all before submission)
/// - the file log store and local orchestrator backend
/// - the run orchestrator
/// - Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<RunResult> {
    let env = ProcessEnv;
    let request = build_request(&args, &env)?;

    if args.dry_run {
        print_dry_run(&request);
        return Ok(RunResult::success());
    }

    let poll_interval = Duration::from_millis(args.poll_interval_ms.max(1));
    let store = FileLogStore::new(&args.log_dir);
    debug!(log_dir = %store.root().display(), "using file log store");
    let logs: Arc<dyn LogBackend> = Arc::new(store);
    let orchestrator = Arc::new(LocalOrchestrator::new(Arc::clone(&logs)));
    let prefix_output = args.prefix_output || request.definition.containers.len() > 1;
    let sink = Arc::new(StdoutSink::new(prefix_output));

    // Ctrl-C → cancel the run.
    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("failed to listen for Ctrl+C: {e}");
                return;
            }
            info!("interrupt received; cancelling run");
            cancel.cancel();
        });
    }

    let engine = RunOrchestrator::new(orchestrator, logs, sink, RunOptions { poll_interval });
    engine.run(request, cancel).await
}

/// Load the definition and resolve overrides into a [`RunRequest`].
///
/// Every configuration error surfaces here, before anything is submitted.
pub fn build_request(args: &CliArgs, env: &dyn EnvLookup) -> Result<RunRequest> {
    let definition = load_and_validate(&args.file, env)?;
    let container_names: Vec<String> = definition.container_names().map(str::to_string).collect();
    let overrides = resolve_overrides(&args.overrides, &args.env, &container_names, env)?;

    let stream_prefix = args
        .name
        .clone()
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(generated_stream_prefix);

    Ok(RunRequest {
        definition,
        overrides,
        cluster: args.cluster.clone(),
        count: args.count,
        launch_type: args.effective_launch_type(),
        network: NetworkConfig::from_parts(&args.subnets, &args.security_groups),
        log_group: args.log_group.clone(),
        region: args.region.clone(),
        stream_prefix,
    })
}

/// Simple dry-run output: print what would be submitted.
fn print_dry_run(request: &RunRequest) {
    println!("runtask dry-run");
    println!("  family = {}", request.definition.family);
    println!("  cluster = {}", request.cluster);
    println!("  count = {}", request.count);
    println!("  launch_type = {}", request.launch_type);
    println!("  log_group = {}", request.log_group);
    println!("  stream_prefix = {}", request.stream_prefix);
    if let Some(network) = &request.network {
        println!("  subnets = {:?}", network.subnets);
        println!("  security_groups = {:?}", network.security_groups);
    }
    println!();

    println!("containers ({}):", request.definition.containers.len());
    for container in request.definition.containers.iter() {
        println!("  - {}", container.name);
        if let Some(image) = &container.image {
            println!("      image: {image}");
        }

        match request.overrides.iter().find(|o| o.name == container.name) {
            Some(o) => {
                println!("      command (override): {:?}", o.command);
                for var in o.environment.iter() {
                    println!("      env (override): {}={}", var.name, var.value);
                }
            }
            None => {
                if !container.command.is_empty() {
                    println!("      command: {:?}", container.command);
                }
            }
        }
    }

    debug!("dry-run complete (nothing submitted)");
}
