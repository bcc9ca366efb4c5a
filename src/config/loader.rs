// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::model::{JobDefinition, RawJobDefinition};
use crate::config::template::expand_env;
use crate::env::EnvLookup;
use crate::errors::Result;

/// Load a job definition from a given path and return the raw `RawJobDefinition`.
///
/// Environment references are expanded first, then the text is deserialized
/// as JSON when the file ends in `.json` and as TOML otherwise. No semantic
/// validation happens here; use [`load_and_validate`] for that.
pub fn load_from_path(path: impl AsRef<Path>, env: &dyn EnvLookup) -> Result<RawJobDefinition> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;
    let expanded = expand_env(&contents, env)?;

    let raw = if is_json(path) {
        debug!(path = %path.display(), "parsing definition as JSON");
        serde_json::from_str(&expanded)?
    } else {
        debug!(path = %path.display(), "parsing definition as TOML");
        toml::from_str(&expanded)?
    };

    Ok(raw)
}

/// Load a job definition from path and run validation.
///
/// - Expands `$VAR` references against `env`.
/// - Reads TOML or JSON.
/// - Checks the family name and that containers exist with unique names.
pub fn load_and_validate(path: impl AsRef<Path>, env: &dyn EnvLookup) -> Result<JobDefinition> {
    let raw = load_from_path(&path, env)?;
    let definition = JobDefinition::try_from(raw)?;
    Ok(definition)
}

/// Definition file used when `--file` is not given.
pub fn default_definition_path() -> PathBuf {
    PathBuf::from("taskdefinition.toml")
}

fn is_json(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}
