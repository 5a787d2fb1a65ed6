//! Orchestrator — executes the work of each deployment phase.
//!
//! The run loop executes the current phase and hands the result to
//! [`Phase::transition`] until a terminal phase is reached. All
//! decisions about *where* to go next live in the transition function;
//! this module only decides whether a phase's work succeeded.

use relaunch_core::{
    BuildStatus, DeploymentAttempt, EndpointConfig, HealthCheckResult, HealthTarget, Outcome,
    RelaunchConfig, Revision, RunStatus, ServiceConfig, ServiceDescriptor, StableRevisionRecord,
    Timings,
};
use relaunch_health::{poll_until_healthy, PollPolicy};
use tracing::{debug, error, info, warn};

use crate::collaborators::Collaborators;
use crate::error::{CollaboratorError, CollaboratorResult, DeployError};
use crate::phase::Phase;
use crate::report::DeploymentReport;

/// Drives deployment attempts against one environment.
///
/// Callers must ensure only one attempt runs per environment at a time.
pub struct Orchestrator {
    pub(crate) services: Vec<ServiceConfig>,
    pub(crate) endpoints: Vec<EndpointConfig>,
    pub(crate) timings: Timings,
    pub(crate) deps: Collaborators,
}

/// A build that used up its attempt ceiling.
pub(crate) struct BuildExhausted {
    pub attempts: u32,
    pub last: CollaboratorError,
}

impl Orchestrator {
    pub fn new(
        services: Vec<ServiceConfig>,
        endpoints: Vec<EndpointConfig>,
        timings: Timings,
        deps: Collaborators,
    ) -> Self {
        Self {
            services,
            endpoints,
            timings,
            deps,
        }
    }

    pub fn from_config(config: &RelaunchConfig, deps: Collaborators) -> Self {
        Self::new(
            config.services.clone(),
            config.external.endpoints.clone(),
            config.timing.clone(),
            deps,
        )
    }

    pub fn timings(&self) -> &Timings {
        &self.timings
    }

    /// The revision version control currently has checked out.
    pub async fn current_revision(&self) -> CollaboratorResult<Revision> {
        self.deps.vcs.current_revision().await
    }

    /// Run one deployment attempt for `target` to a terminal outcome.
    pub async fn deploy(&self, target: Revision) -> DeploymentReport {
        let previous_stable = match self.deps.store.stable_revision() {
            Ok(rev) => rev,
            Err(e) => {
                warn!(error = %e, "could not read stable record before deploying");
                None
            }
        };

        let mut report = DeploymentReport {
            attempt: DeploymentAttempt::new(target.clone(), self.deps.clock.now()),
            phases: vec![Phase::INITIAL],
            services: self.fresh_descriptors(),
            health_checks: Vec::new(),
            previous_stable,
            cause: None,
            fatal: None,
            restored: None,
        };

        info!(
            revision = %target,
            stable = report.previous_stable.as_ref().map(Revision::as_str).unwrap_or("none"),
            services = self.services.len(),
            "deployment started"
        );

        let mut phase = Phase::INITIAL;
        while !phase.is_terminal() {
            let step = self.execute(phase, &mut report).await;
            if let Err(e) = &step {
                if phase == Phase::RollingBack {
                    report.fatal = Some(e.clone());
                } else {
                    warn!(%phase, error = %e, "phase failed, rolling back");
                    report.cause = Some(e.clone());
                }
            }
            let next = phase.transition(&step);
            debug!(from = %phase, to = %next, "phase transition");
            report.phases.push(next);
            phase = next;
        }

        if let Err(e) = report.attempt.finish(phase.outcome()) {
            error!(error = %e, "attempt outcome already set");
        }

        match report.outcome() {
            Outcome::Success => info!(revision = %target, "deployment committed"),
            Outcome::RolledBack => warn!(
                revision = %target,
                restored = %report.restored.as_ref().map(Revision::as_str).unwrap_or("?"),
                "deployment rolled back"
            ),
            _ => error!(
                revision = %target,
                error = %report.fatal.as_ref().map(ToString::to_string).unwrap_or_default(),
                "deployment FAILED; manual intervention required"
            ),
        }
        report
    }

    async fn execute(&self, phase: Phase, report: &mut DeploymentReport) -> Result<(), DeployError> {
        let target = report.attempt.target_revision.clone();
        match phase {
            Phase::Building => {
                let commit = self.checkout(&target).await?;
                if commit != target {
                    info!(requested = %target, %commit, "resolved target revision");
                    report.attempt.target_revision = commit.clone();
                }
                info!(revision = %commit, "building");
                match self.build_with_retry(&commit, &mut report.services).await {
                    Ok(retries) => {
                        report.attempt.build_retry_count = retries;
                        Ok(())
                    }
                    Err(exhausted) => {
                        report.attempt.build_retry_count = exhausted.attempts.saturating_sub(1);
                        Err(DeployError::Build {
                            attempts: exhausted.attempts,
                            reason: exhausted.last.to_string(),
                        })
                    }
                }
            }
            Phase::Migrating => {
                info!(revision = %target, "applying migrations");
                self.deps
                    .migrations
                    .migrate(&target)
                    .await
                    .map_err(|e| DeployError::Migration(e.to_string()))
            }
            Phase::Starting => {
                info!(revision = %target, "starting services");
                self.start_services(&mut report.services)
                    .await
                    .map_err(|e| DeployError::Start(e.to_string()))
            }
            Phase::HealthCheckInternal => self.check_internal(report).await,
            Phase::RefreshIngress => {
                info!("refreshing ingress");
                self.deps
                    .ingress
                    .refresh()
                    .await
                    .map_err(|e| DeployError::IngressRefresh(e.to_string()))?;
                let settle = self.timings.ingress_settle();
                debug!(?settle, "waiting for ingress to settle");
                self.deps.clock.sleep(settle).await;
                Ok(())
            }
            Phase::HealthCheckExternal => self.check_external(report).await,
            Phase::CommitStable => self.commit(&target).await,
            Phase::RollingBack => {
                let restored = self.restore_stable(&mut report.services).await?;
                report.restored = Some(restored);
                Ok(())
            }
            Phase::Committed | Phase::RollbackVerified | Phase::RollbackFailed => Ok(()),
        }
    }

    pub(crate) fn fresh_descriptors(&self) -> Vec<ServiceDescriptor> {
        self.services
            .iter()
            .map(|s| ServiceDescriptor::new(s.name.clone()))
            .collect()
    }

    fn service_names(&self) -> Vec<String> {
        self.services.iter().map(|s| s.name.clone()).collect()
    }

    /// Check out `target` and return the commit it resolved to. Refs such
    /// as branch names move, so only the resolved id is built and recorded.
    async fn checkout(&self, target: &Revision) -> Result<Revision, DeployError> {
        let checkout_failed = |e: CollaboratorError| DeployError::Checkout {
            revision: target.clone(),
            reason: e.to_string(),
        };
        match self.deps.vcs.current_revision().await {
            Ok(current) if &current == target => return Ok(current),
            Ok(current) => debug!(%current, %target, "checking out target"),
            Err(e) => debug!(error = %e, "current revision unknown, checking out target"),
        }
        self.deps
            .vcs
            .reset_to(target)
            .await
            .map_err(checkout_failed)?;
        self.deps
            .vcs
            .current_revision()
            .await
            .map_err(checkout_failed)
    }

    /// Build the whole service set, retrying up to the ceiling with a fixed
    /// back-off. Returns the number of retries used.
    pub(crate) async fn build_with_retry(
        &self,
        revision: &Revision,
        services: &mut [ServiceDescriptor],
    ) -> Result<u32, BuildExhausted> {
        let names = self.service_names();
        let max = self.timings.build_attempts;
        let mut attempt = 1;

        loop {
            match self.deps.builder.build(&names, revision).await {
                Ok(()) => {
                    for svc in services.iter_mut() {
                        svc.build_status = BuildStatus::Built;
                    }
                    info!(%revision, attempt, "build succeeded");
                    return Ok(attempt - 1);
                }
                Err(e) if attempt < max => {
                    warn!(
                        %revision,
                        attempt,
                        max,
                        error = %e,
                        backoff_secs = self.timings.build_backoff_secs,
                        "build failed, retrying"
                    );
                    self.deps.clock.sleep(self.timings.build_backoff()).await;
                    attempt += 1;
                }
                Err(e) => {
                    for svc in services.iter_mut() {
                        svc.build_status = BuildStatus::BuildFailed;
                    }
                    error!(%revision, attempts = attempt, error = %e, "build failed, giving up");
                    return Err(BuildExhausted {
                        attempts: attempt,
                        last: e,
                    });
                }
            }
        }
    }

    /// Ask the runtime to start everything, then record what it reports.
    pub(crate) async fn start_services(
        &self,
        services: &mut [ServiceDescriptor],
    ) -> CollaboratorResult<()> {
        let names = self.service_names();
        self.deps.runtime.start(&names).await?;

        for svc in services.iter_mut() {
            svc.run_status = match self.deps.runtime.status(&svc.name).await {
                Ok(status) => status,
                Err(e) => {
                    debug!(service = %svc.name, error = %e, "status unavailable");
                    RunStatus::Starting
                }
            };
        }
        Ok(())
    }

    async fn check_internal(&self, report: &mut DeploymentReport) -> Result<(), DeployError> {
        let policy = PollPolicy::new(
            self.timings.internal_interval(),
            self.timings.internal_attempts,
        );
        let clock = self.deps.clock.as_ref();
        let liveness = self.deps.liveness.as_ref();

        for (config, descriptor) in self.services.iter().zip(report.services.iter_mut()) {
            let target = HealthTarget::Service(config.name.clone());

            if config.liveness.is_none() {
                info!(service = %config.name, "no liveness contract; treating as healthy");
                descriptor.run_status = RunStatus::Running;
                report.health_checks.push(HealthCheckResult {
                    target,
                    attempt_number: 1,
                    passed: true,
                    observed_at: clock.now(),
                });
                continue;
            }

            let poll = poll_until_healthy(target, policy, clock, move |_| async move {
                liveness.probe(config).await.is_healthy()
            })
            .await;

            let passed = poll.passed();
            let attempts = poll.attempts();
            report.health_checks.extend(poll.results);

            if !passed {
                descriptor.run_status = RunStatus::Unhealthy;
                return Err(DeployError::HealthCheckTimeout {
                    target: poll.target,
                    attempts,
                });
            }
            descriptor.run_status = RunStatus::Running;
            info!(service = %config.name, attempts, "service healthy");
        }
        Ok(())
    }

    async fn check_external(&self, report: &mut DeploymentReport) -> Result<(), DeployError> {
        let policy = PollPolicy::new(
            self.timings.external_interval(),
            self.timings.external_attempts,
        );
        let clock = self.deps.clock.as_ref();
        let probe = self.deps.endpoints.as_ref();

        for endpoint in &self.endpoints {
            let target = HealthTarget::External(endpoint.url.clone());
            let poll = poll_until_healthy(target, policy, clock, move |_| async move {
                probe
                    .probe(&endpoint.url, &endpoint.accept)
                    .await
                    .is_healthy()
            })
            .await;

            let passed = poll.passed();
            let attempts = poll.attempts();
            report.health_checks.extend(poll.results);

            if !passed {
                return Err(DeployError::HealthCheckTimeout {
                    target: poll.target,
                    attempts,
                });
            }
            info!(url = %endpoint.url, attempts, "public endpoint healthy");
        }
        Ok(())
    }

    async fn commit(&self, target: &Revision) -> Result<(), DeployError> {
        let record = StableRevisionRecord::new(target.clone(), self.deps.clock.now());
        self.deps
            .store
            .write(&record)
            .map_err(|e| DeployError::Commit(e.to_string()))?;
        info!(revision = %target, "stable revision recorded");

        if let Err(e) = self.deps.builder.prune().await {
            warn!(error = %e, "artifact prune failed; continuing");
        }
        Ok(())
    }
}
