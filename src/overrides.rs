// src/overrides.rs

//! Override/Environment resolution.
//!
//! Turns the repeatable `--override service:command...` and `--env KEY[=VALUE]`
//! flags into per-container overrides that are attached to the submitted job.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use tracing::{info, warn};

use crate::config::EnvVar;
use crate::env::EnvLookup;
use crate::errors::{Result, RunTaskError};

/// A declared override, as given on the command line.
///
/// `worker:./migrate --all` targets container `worker`; `./migrate --all`
/// (nothing before the first `:` that looks like a container name) leaves the
/// target unspecified.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OverrideSpec {
    pub service: Option<String>,
    pub command: Vec<String>,
}

impl OverrideSpec {
    pub fn new(service: Option<&str>, command: &[&str]) -> Self {
        Self {
            service: service.map(str::to_string),
            command: command.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl FromStr for OverrideSpec {
    type Err = RunTaskError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(RunTaskError::InvalidOverride(
                "override must not be empty".to_string(),
            ));
        }

        let (service, rest) = match s.split_once(':') {
            Some((head, tail)) if !head.chars().any(char::is_whitespace) => {
                let head = head.trim();
                let service = if head.is_empty() {
                    None
                } else {
                    Some(head.to_string())
                };
                (service, tail)
            }
            _ => (None, s),
        };

        let command = rest.split_whitespace().map(str::to_string).collect();
        Ok(OverrideSpec { service, command })
    }
}

impl fmt::Display for OverrideSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(service) = &self.service {
            write!(f, "{service}:")?;
        }
        write!(f, "{}", self.command.join(" "))
    }
}

/// Override attached to one container of the submitted job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContainerOverride {
    pub name: String,
    pub command: Vec<String>,
    pub environment: Vec<EnvVar>,
}

/// Resolve `KEY=VALUE` / `KEY` entries into name/value pairs.
///
/// Entries are split on the first `=`. A bare `KEY` is looked up in `env`
/// and is an error when absent. Order is preserved; nothing is deduplicated.
pub fn resolve_env(entries: &[String], env: &dyn EnvLookup) -> Result<Vec<EnvVar>> {
    let mut resolved = Vec::with_capacity(entries.len());

    for entry in entries {
        let pair = match entry.split_once('=') {
            Some((key, value)) => EnvVar::new(key, value),
            None => {
                let value = env
                    .lookup(entry)
                    .ok_or_else(|| RunTaskError::MissingEnv(entry.clone()))?;
                EnvVar::new(entry.as_str(), value)
            }
        };
        resolved.push(pair);
    }

    Ok(resolved)
}

/// Pick the container an override applies to.
///
/// An explicit target is returned as is. Without one, the job must have
/// exactly one container definition.
pub fn resolve_target(spec: &OverrideSpec, container_names: &[String]) -> Result<String> {
    if let Some(service) = &spec.service {
        return Ok(service.clone());
    }

    match container_names {
        [only] => {
            info!("Assuming override applies to '{}'", only);
            Ok(only.clone())
        }
        names => Err(RunTaskError::AmbiguousOverride(names.len())),
    }
}

/// Build the container overrides for a submission.
///
/// Specs with an empty command are skipped. The resolved environment is
/// attached to every override that is produced.
pub fn resolve_overrides(
    specs: &[OverrideSpec],
    env_entries: &[String],
    container_names: &[String],
    env: &dyn EnvLookup,
) -> Result<Vec<ContainerOverride>> {
    let environment = resolve_env(env_entries, env)?;

    let mut overrides = Vec::new();
    for spec in specs.iter().filter(|s| !s.command.is_empty()) {
        let name = resolve_target(spec, container_names)?;
        overrides.push(ContainerOverride {
            name,
            command: spec.command.clone(),
            environment: environment.clone(),
        });
    }

    if overrides.is_empty() && !environment.is_empty() {
        warn!(
            count = environment.len(),
            "environment overrides given without a command override; they will not be applied"
        );
    }

    Ok(overrides)
}
