//! Rollback subroutine.
//!
//! The single recovery path for every forward failure: read the stable
//! record, reset to it, rebuild, restart. Migrations are not re-run; the
//! stable revision already ran against the current schema.
//!
//! The restored revision is *not* re-verified through the public entry
//! point. A stable revision can degrade on its own (expired certificate,
//! changed external dependency), so every successful rollback says so in
//! the log rather than claiming a verified state.

use relaunch_core::{Revision, ServiceDescriptor};
use tracing::{error, info, warn};

use crate::error::{DeployError, DeployResult};
use crate::orchestrator::Orchestrator;

impl Orchestrator {
    /// Restore the stable revision outside of a deployment attempt.
    ///
    /// Running this repeatedly converges on the same revision.
    pub async fn rollback(&self) -> DeployResult<Revision> {
        let mut services = self.fresh_descriptors();
        self.restore_stable(&mut services).await
    }

    pub(crate) async fn restore_stable(
        &self,
        services: &mut [ServiceDescriptor],
    ) -> DeployResult<Revision> {
        let stable = match self.deps.store.stable_revision() {
            Ok(Some(rev)) => rev,
            Ok(None) => {
                error!("no stable revision recorded; nothing safe to roll back to");
                return Err(DeployError::RollbackImpossible(
                    "no stable revision recorded".to_string(),
                ));
            }
            Err(e) => {
                error!(error = %e, "stable record unreadable; refusing to guess a rollback target");
                return Err(DeployError::RollbackImpossible(format!(
                    "stable record unreadable: {e}"
                )));
            }
        };

        info!(revision = %stable, "rolling back to stable revision");

        if let Err(e) = self.deps.vcs.reset_to(&stable).await {
            error!(revision = %stable, error = %e, "rollback reset failed");
            return Err(DeployError::RollbackReset {
                revision: stable,
                reason: e.to_string(),
            });
        }

        for (svc, fresh) in services.iter_mut().zip(self.fresh_descriptors()) {
            *svc = fresh;
        }

        if let Err(exhausted) = self.build_with_retry(&stable, services).await {
            error!(
                revision = %stable,
                attempts = exhausted.attempts,
                "stable revision failed to rebuild; double failure, no further action"
            );
            return Err(DeployError::RollbackBuild {
                revision: stable,
                attempts: exhausted.attempts,
                reason: exhausted.last.to_string(),
            });
        }

        if let Err(e) = self.start_services(services).await {
            error!(revision = %stable, error = %e, "runtime rejected start of stable revision");
            return Err(DeployError::RollbackStart {
                revision: stable,
                reason: e.to_string(),
            });
        }

        if let Err(e) = self.deps.ingress.refresh().await {
            warn!(error = %e, "ingress refresh after rollback failed; continuing");
        }

        warn!(
            revision = %stable,
            "stable revision restored without external re-verification"
        );
        Ok(stable)
    }
}
