//! Deployment phases and the transition function.

use std::fmt;

use relaunch_core::Outcome;
use serde::Serialize;

/// Where a deployment attempt currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Building,
    Migrating,
    Starting,
    HealthCheckInternal,
    RefreshIngress,
    HealthCheckExternal,
    CommitStable,
    RollingBack,
    /// Terminal: the target is the new stable revision.
    Committed,
    /// Terminal: the previous stable revision is running again.
    RollbackVerified,
    /// Terminal: nothing safe could be restored. Needs an operator.
    RollbackFailed,
}

impl Phase {
    /// The first phase of every attempt.
    pub const INITIAL: Phase = Phase::Building;

    /// Compute the next phase from the result of this phase's work.
    ///
    /// Forward phases advance on success and fall into `RollingBack` on
    /// any failure. `RollingBack` ends in `RollbackVerified` or
    /// `RollbackFailed`. Terminal phases never move.
    pub fn transition<E>(self, step: &Result<(), E>) -> Phase {
        use Phase::*;

        let ok = step.is_ok();
        match self {
            Committed | RollbackVerified | RollbackFailed => self,
            RollingBack if ok => RollbackVerified,
            RollingBack => RollbackFailed,
            _ if !ok => RollingBack,
            Building => Migrating,
            Migrating => Starting,
            Starting => HealthCheckInternal,
            HealthCheckInternal => RefreshIngress,
            RefreshIngress => HealthCheckExternal,
            HealthCheckExternal => CommitStable,
            CommitStable => Committed,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Phase::Committed | Phase::RollbackVerified | Phase::RollbackFailed
        )
    }

    /// The attempt outcome this phase implies; `Pending` until terminal.
    pub fn outcome(self) -> Outcome {
        match self {
            Phase::Committed => Outcome::Success,
            Phase::RollbackVerified => Outcome::RolledBack,
            Phase::RollbackFailed => Outcome::Failed,
            _ => Outcome::Pending,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Phase::Building => "BUILDING",
            Phase::Migrating => "MIGRATING",
            Phase::Starting => "STARTING",
            Phase::HealthCheckInternal => "HEALTH_CHECK_INTERNAL",
            Phase::RefreshIngress => "REFRESH_INGRESS",
            Phase::HealthCheckExternal => "HEALTH_CHECK_EXTERNAL",
            Phase::CommitStable => "COMMIT_STABLE",
            Phase::RollingBack => "ROLLING_BACK",
            Phase::Committed => "COMMITTED",
            Phase::RollbackVerified => "ROLLBACK_VERIFIED",
            Phase::RollbackFailed => "ROLLBACK_FAILED",
        };
        f.write_str(s)
    }
}
