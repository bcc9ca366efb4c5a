// src/config/validate.rs

use std::collections::HashSet;

use crate::config::model::{JobDefinition, RawJobDefinition};
use crate::errors::{Result, RunTaskError};

impl TryFrom<RawJobDefinition> for JobDefinition {
    type Error = crate::errors::RunTaskError;

    fn try_from(raw: RawJobDefinition) -> std::result::Result<Self, Self::Error> {
        validate_raw_definition(&raw)?;
        Ok(JobDefinition::new_unchecked(raw))
    }
}

fn validate_raw_definition(def: &RawJobDefinition) -> Result<()> {
    validate_family(def)?;
    ensure_has_containers(def)?;
    validate_container_names(def)?;
    Ok(())
}

fn validate_family(def: &RawJobDefinition) -> Result<()> {
    if def.family.trim().is_empty() {
        return Err(RunTaskError::ConfigError(
            "definition must set a non-empty `family`".to_string(),
        ));
    }

    let valid = def
        .family
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if !valid {
        return Err(RunTaskError::ConfigError(format!(
            "family '{}' may only contain letters, digits, '-' and '_'",
            def.family
        )));
    }

    Ok(())
}

fn ensure_has_containers(def: &RawJobDefinition) -> Result<()> {
    if def.containers.is_empty() {
        return Err(RunTaskError::ConfigError(
            "definition must contain at least one [[container]] section".to_string(),
        ));
    }
    Ok(())
}

fn validate_container_names(def: &RawJobDefinition) -> Result<()> {
    let mut seen = HashSet::new();

    for container in def.containers.iter() {
        if container.name.trim().is_empty() {
            return Err(RunTaskError::ConfigError(format!(
                "container definition in family '{}' has an empty name",
                def.family
            )));
        }
        if container.name.contains('/') {
            return Err(RunTaskError::ConfigError(format!(
                "container name '{}' must not contain '/'",
                container.name
            )));
        }
        if !seen.insert(container.name.as_str()) {
            return Err(RunTaskError::ConfigError(format!(
                "container '{}' is defined more than once",
                container.name
            )));
        }
    }

    Ok(())
}
