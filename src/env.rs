// src/env.rs

//! Injected environment lookup.
//!
//! Override resolution and definition templating never read the process
//! environment directly; they go through [`EnvLookup`] so tests can supply a
//! fixed map instead.

use std::collections::HashMap;

/// Capability to look up a variable in the host environment.
pub trait EnvLookup: Send + Sync {
    fn lookup(&self, key: &str) -> Option<String>;
}

/// Reads from the real process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvLookup for ProcessEnv {
    fn lookup(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

/// A fixed set of variables, mostly useful in tests and dry runs.
#[derive(Debug, Clone, Default)]
pub struct MapEnv {
    vars: HashMap<String, String>,
}

impl MapEnv {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, value: &str) -> Self {
        self.vars.insert(key.to_string(), value.to_string());
        self
    }
}

impl EnvLookup for MapEnv {
    fn lookup(&self, key: &str) -> Option<String> {
        self.vars.get(key).cloned()
    }
}
