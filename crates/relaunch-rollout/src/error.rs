//! Deployment error taxonomy.

use relaunch_core::{HealthTarget, Revision, TypeError};
use thiserror::Error;

pub type CollaboratorResult<T> = Result<T, CollaboratorError>;

pub type DeployResult<T> = Result<T, DeployError>;

/// Failure reported by an external collaborator.
#[derive(Debug, Error)]
pub enum CollaboratorError {
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} failed ({status}): {stderr}")]
    Exit {
        program: String,
        status: String,
        stderr: String,
    },

    #[error("invalid revision from version control: {0}")]
    Revision(#[from] TypeError),

    #[error("{0}")]
    Other(String),
}

/// Why a deployment step failed.
///
/// Forward-path errors all converge on the rollback subroutine; the
/// `Rollback*` variants are terminal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeployError {
    #[error("could not check out {revision}: {reason}")]
    Checkout { revision: Revision, reason: String },

    #[error("build failed after {attempts} attempt(s): {reason}")]
    Build { attempts: u32, reason: String },

    #[error("migration failed: {0}")]
    Migration(String),

    #[error("runtime rejected start: {0}")]
    Start(String),

    #[error("health check for {target} failed after {attempts} attempt(s)")]
    HealthCheckTimeout { target: HealthTarget, attempts: u32 },

    #[error("ingress refresh failed: {0}")]
    IngressRefresh(String),

    #[error("could not record stable revision: {0}")]
    Commit(String),

    #[error("rollback impossible: {0}")]
    RollbackImpossible(String),

    #[error("rollback could not reset to {revision}: {reason}")]
    RollbackReset { revision: Revision, reason: String },

    #[error("stable revision {revision} failed to rebuild after {attempts} attempt(s): {reason}")]
    RollbackBuild {
        revision: Revision,
        attempts: u32,
        reason: String,
    },

    #[error("runtime rejected start of stable revision {revision}: {reason}")]
    RollbackStart { revision: Revision, reason: String },
}

impl DeployError {
    /// Terminal errors end the run as `failed`; no further automatic action.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            DeployError::RollbackImpossible(_)
                | DeployError::RollbackReset { .. }
                | DeployError::RollbackBuild { .. }
                | DeployError::RollbackStart { .. }
        )
    }
}
