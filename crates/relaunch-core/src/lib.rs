//! relaunch-core — shared types and manifest parsing for relaunch.
//!
//! - **`types`** — revisions, deployment attempts, service descriptors,
//!   health check results
//! - **`config`** — `relaunch.toml` parser and validation
//! - **`template`** — argv templates for collaborator commands

pub mod config;
pub mod template;
pub mod types;

pub use config::{
    Commands, EndpointConfig, ExternalConfig, Liveness, ProjectConfig, RelaunchConfig,
    ServiceConfig, StateBackend, Timings,
};
pub use template::{CommandTemplate, TemplateVars};
pub use types::*;
