// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::config::default_definition_path;
use crate::overrides::OverrideSpec;
use crate::types::LaunchType;

/// Command-line arguments for `runtask`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "runtask",
    version,
    about = "Run a containerized job once, stream its logs and exit with its exit code.",
    long_about = None
)]
pub struct CliArgs {
    /// Run name; used as the log stream prefix.
    ///
    /// A `run_task_<n>` name is generated when omitted.
    #[arg(long, short = 'n', value_name = "NAME")]
    pub name: Option<String>,

    /// Path to the job definition (TOML, or JSON with a `.json` extension).
    #[arg(long, short = 'f', value_name = "PATH", default_value_os_t = default_definition_path())]
    pub file: PathBuf,

    /// Cluster to run the job on.
    #[arg(long, short = 'c', value_name = "NAME", default_value = "default")]
    pub cluster: String,

    /// Log group every container logs to.
    #[arg(long, short = 'l', value_name = "NAME", default_value = "runtask")]
    pub log_group: String,

    /// Region recorded in the containers' log configuration.
    #[arg(long, env = "RUNTASK_REGION", value_name = "REGION")]
    pub region: Option<String>,

    /// Launch type (standard or serverless).
    #[arg(long, value_name = "TYPE", default_value = "standard")]
    pub launch_type: LaunchType,

    /// Shorthand for `--launch-type serverless`.
    #[arg(long)]
    pub fargate: bool,

    /// Subnet for the task network configuration (repeatable).
    #[arg(long = "subnet", value_name = "ID")]
    pub subnets: Vec<String>,

    /// Security group for the task network configuration (repeatable).
    #[arg(long = "security-group", value_name = "ID")]
    pub security_groups: Vec<String>,

    /// Number of task instances to start.
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
    pub count: u32,

    /// Command override, `service:command...` (repeatable).
    ///
    /// The service may be omitted when the definition has a single container.
    #[arg(long = "override", short = 'o', value_name = "SPEC")]
    pub overrides: Vec<OverrideSpec>,

    /// Environment override, `KEY=VALUE` or `KEY` to copy from the host
    /// (repeatable).
    #[arg(long = "env", short = 'e', value_name = "KEY[=VALUE]")]
    pub env: Vec<String>,

    /// Directory backing the file log store.
    #[arg(long, env = "RUNTASK_LOG_DIR", value_name = "DIR", default_value = ".runtask/logs")]
    pub log_dir: PathBuf,

    /// Milliseconds between log fetches.
    #[arg(long, value_name = "MS", default_value_t = 1000)]
    pub poll_interval_ms: u64,

    /// Prefix every output line with its container name.
    ///
    /// Always on when the definition has more than one container.
    #[arg(long)]
    pub prefix_output: bool,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `RUNTASK_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Load and resolve everything, print the submission, but don't run it.
    #[arg(long)]
    pub dry_run: bool,
}

impl CliArgs {
    pub fn effective_launch_type(&self) -> LaunchType {
        if self.fargate {
            LaunchType::Serverless
        } else {
            self.launch_type
        }
    }
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
