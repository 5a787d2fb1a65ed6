//! External collaborator seams.
//!
//! Every call is awaited to completion before the orchestrator moves on;
//! from the state machine's point of view each one is a blocking step.

use std::sync::Arc;

use async_trait::async_trait;
use relaunch_core::{Revision, RunStatus};
use relaunch_health::{Clock, EndpointProbe, LivenessProbe};
use relaunch_state::RevisionStore;

use crate::error::CollaboratorResult;

#[async_trait]
pub trait VersionControl: Send + Sync {
    /// The commit currently checked out, as an immutable id.
    async fn current_revision(&self) -> CollaboratorResult<Revision>;

    /// Move the working state to `revision`.
    async fn reset_to(&self, revision: &Revision) -> CollaboratorResult<()>;
}

#[async_trait]
pub trait ArtifactBuilder: Send + Sync {
    /// Build artifacts for every service in `services` from `revision`.
    /// Failures are treated as transient and retried by the caller.
    async fn build(&self, services: &[String], revision: &Revision) -> CollaboratorResult<()>;

    /// Remove artifacts no longer referenced by the running stack.
    async fn prune(&self) -> CollaboratorResult<()>;
}

#[async_trait]
pub trait MigrationRunner: Send + Sync {
    async fn migrate(&self, revision: &Revision) -> CollaboratorResult<()>;
}

#[async_trait]
pub trait RuntimeController: Send + Sync {
    /// Bring up `services` on the most recently built artifacts.
    async fn start(&self, services: &[String]) -> CollaboratorResult<()>;

    async fn status(&self, service: &str) -> CollaboratorResult<RunStatus>;
}

#[async_trait]
pub trait IngressRefresher: Send + Sync {
    /// Make the routing layer drop cached upstream addresses.
    async fn refresh(&self) -> CollaboratorResult<()>;
}

/// Everything the orchestrator talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub vcs: Arc<dyn VersionControl>,
    pub builder: Arc<dyn ArtifactBuilder>,
    pub migrations: Arc<dyn MigrationRunner>,
    pub runtime: Arc<dyn RuntimeController>,
    pub ingress: Arc<dyn IngressRefresher>,
    pub liveness: Arc<dyn LivenessProbe>,
    pub endpoints: Arc<dyn EndpointProbe>,
    pub store: Arc<dyn RevisionStore>,
    pub clock: Arc<dyn Clock>,
}
