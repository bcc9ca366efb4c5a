// src/config/template.rs

//! `$VAR` / `${VAR}` expansion over the raw definition source.
//!
//! Expansion runs on the text before it is parsed, so any string value in the
//! definition can reference the host environment. `$$` yields a literal `$`.

use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::env::EnvLookup;
use crate::errors::{Result, RunTaskError};

static VAR_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$(?:(\$)|\{([A-Za-z_][A-Za-z0-9_]*)\}|([A-Za-z_][A-Za-z0-9_]*))")
        .expect("variable pattern is a valid regex")
});

/// Expand environment references in `source`.
///
/// Fails on the first reference that the environment cannot resolve.
pub fn expand_env(source: &str, env: &dyn EnvLookup) -> Result<String> {
    let mut missing: Option<String> = None;

    let expanded = VAR_PATTERN.replace_all(source, |caps: &Captures<'_>| {
        if caps.get(1).is_some() {
            return "$".to_string();
        }

        let name = caps
            .get(2)
            .or_else(|| caps.get(3))
            .map(|m| m.as_str())
            .unwrap_or_default();

        match env.lookup(name) {
            Some(value) => value,
            None => {
                if missing.is_none() {
                    missing = Some(name.to_string());
                }
                String::new()
            }
        }
    });

    match missing {
        Some(name) => Err(RunTaskError::ConfigError(format!(
            "definition references undefined environment variable {name:?}"
        ))),
        None => Ok(expanded.into_owned()),
    }
}
