// src/config/mod.rs

//! Job definition loading.
//!
//! - [`model`] holds the serde structs for the definition file.
//! - [`template`] expands `$VAR` references against the host environment.
//! - [`loader`] reads, expands and parses a file.
//! - [`validate`] turns a `RawJobDefinition` into a `JobDefinition`.

pub mod loader;
pub mod model;
pub mod template;
pub mod validate;

pub use loader::{default_definition_path, load_and_validate, load_from_path};
pub use model::{
    ContainerDefinition, EnvVar, JobDefinition, LogConfiguration, RawJobDefinition,
};
