//! Result of a finished deployment attempt.

use relaunch_core::{DeploymentAttempt, HealthCheckResult, Outcome, Revision, ServiceDescriptor};

use crate::error::DeployError;
use crate::phase::Phase;

#[derive(Debug, Clone)]
pub struct DeploymentReport {
    pub attempt: DeploymentAttempt,
    /// Every phase entered, in order, starting with `Building`.
    pub phases: Vec<Phase>,
    pub services: Vec<ServiceDescriptor>,
    pub health_checks: Vec<HealthCheckResult>,
    /// Stable revision as read when the attempt started.
    pub previous_stable: Option<Revision>,
    /// The forward-path failure that triggered rollback.
    pub cause: Option<DeployError>,
    /// The terminal rollback failure, when the outcome is `failed`.
    pub fatal: Option<DeployError>,
    /// The revision restored by rollback.
    pub restored: Option<Revision>,
}

impl DeploymentReport {
    pub fn outcome(&self) -> Outcome {
        self.attempt.outcome()
    }

    pub fn final_phase(&self) -> Option<Phase> {
        self.phases.last().copied()
    }

    /// The revision that should be running now, if any is known.
    pub fn running_revision(&self) -> Option<&Revision> {
        match self.outcome() {
            Outcome::Success => Some(&self.attempt.target_revision),
            Outcome::RolledBack => self.restored.as_ref(),
            Outcome::Pending | Outcome::Failed => None,
        }
    }

    /// One-line operator summary.
    pub fn summary(&self) -> String {
        let target = &self.attempt.target_revision;
        match self.outcome() {
            Outcome::Success => format!("success: {target} is now the stable revision"),
            Outcome::RolledBack => {
                let restored = self
                    .restored
                    .as_ref()
                    .map(|r| r.to_string())
                    .unwrap_or_else(|| "?".to_string());
                let cause = self
                    .cause
                    .as_ref()
                    .map(|c| c.to_string())
                    .unwrap_or_default();
                format!(
                    "rolled_back: {target} failed ({cause}); restored {restored} \
                     without external re-verification"
                )
            }
            Outcome::Failed => {
                let fatal = self
                    .fatal
                    .as_ref()
                    .map(|c| c.to_string())
                    .unwrap_or_default();
                let cause = self
                    .cause
                    .as_ref()
                    .map(|c| c.to_string())
                    .unwrap_or_default();
                format!(
                    "failed: {target} failed ({cause}) and recovery failed ({fatal}); \
                     manual intervention required"
                )
            }
            Outcome::Pending => format!("pending: {target}"),
        }
    }
}
