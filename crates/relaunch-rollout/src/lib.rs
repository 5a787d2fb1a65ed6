//! relaunch-rollout — the deployment orchestrator.
//!
//! Drives one deployment attempt through a fixed sequence of phases and
//! either commits the target as the new stable revision or restores the
//! previous stable revision.
//!
//! ```text
//! Building → Migrating → Starting → HealthCheckInternal → RefreshIngress
//!   → HealthCheckExternal → CommitStable → Committed
//!
//! any forward failure → RollingBack → RollbackVerified | RollbackFailed
//! ```
//!
//! # Components
//!
//! - **`phase`** — the phase enum and its single transition function
//! - **`collaborators`** — traits for version control, builder, migrations,
//!   runtime, and ingress
//! - **`orchestrator`** — executes each phase's work and the run loop
//! - **`rollback`** — the one recovery path every forward failure converges on
//! - **`report`** — what a finished run hands back to the caller

pub mod collaborators;
pub mod error;
pub mod orchestrator;
pub mod phase;
pub mod report;
pub mod rollback;

pub use collaborators::{
    ArtifactBuilder, Collaborators, IngressRefresher, MigrationRunner, RuntimeController,
    VersionControl,
};
pub use error::{CollaboratorError, CollaboratorResult, DeployError, DeployResult};
pub use orchestrator::Orchestrator;
pub use phase::Phase;
pub use report::DeploymentReport;
