//! In-process fakes for every collaborator.
//!
//! `FakeEnv` models one environment: a checked-out head, the last built
//! revision, and the revision the runtime is serving. Failure knobs are
//! keyed by revision so forward and rollback paths can be steered
//! independently.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use relaunch_core::{
    CommandTemplate, EndpointConfig, Liveness, Revision, RunStatus, ServiceConfig,
    StableRevisionRecord, Timings,
};
use relaunch_health::{EndpointProbe, LivenessProbe, ManualClock, ProbeResult};
use relaunch_rollout::{
    ArtifactBuilder, CollaboratorError, CollaboratorResult, Collaborators, IngressRefresher,
    MigrationRunner, Orchestrator, RuntimeController, VersionControl,
};
use relaunch_state::{RedbRevisionStore, RevisionStore, StateError, StateResult};

pub fn rev(s: &str) -> Revision {
    Revision::new(s).unwrap()
}

#[derive(Debug, Default)]
pub struct EnvState {
    pub head: Option<Revision>,
    /// Movable refs (branch names) and the commit each points at.
    pub refs: HashMap<String, Revision>,
    pub built: Option<Revision>,
    pub running: Option<Revision>,

    /// Fail this many upcoming builds, whatever the revision.
    pub transient_build_failures: u32,
    /// Revisions whose builds always fail.
    pub broken_builds: HashSet<Revision>,
    pub reset_fails_for: HashSet<Revision>,
    pub migrate_fails: bool,
    pub start_fails_for: HashSet<Revision>,
    pub ingress_fails: bool,
    pub prune_fails: bool,
    /// (service, revision) pairs that never pass liveness.
    pub unhealthy: HashSet<(String, Revision)>,
    /// Revisions whose public endpoints never answer with an accepted code.
    pub external_down_for: HashSet<Revision>,

    pub builds: HashMap<Revision, u32>,
    pub resets: Vec<Revision>,
    pub migrations: u32,
    pub starts: u32,
    pub refreshes: u32,
    pub prunes: u32,
    pub liveness_probes: HashMap<String, u32>,
    pub external_probes: u32,
    /// Ordered log of collaborator calls.
    pub events: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct FakeEnv(Arc<Mutex<EnvState>>);

impl FakeEnv {
    /// An environment already serving `revision`.
    pub fn serving(revision: &str) -> Self {
        let env = Self::default();
        {
            let mut s = env.state();
            s.head = Some(rev(revision));
            s.built = Some(rev(revision));
            s.running = Some(rev(revision));
        }
        env
    }

    /// A fresh environment with `revision` checked out but nothing running.
    pub fn checked_out(revision: &str) -> Self {
        let env = Self::default();
        env.state().head = Some(rev(revision));
        env
    }

    pub fn state(&self) -> MutexGuard<'_, EnvState> {
        self.0.lock().unwrap()
    }

    pub fn running(&self) -> Option<Revision> {
        self.state().running.clone()
    }

    pub fn builds_of(&self, revision: &str) -> u32 {
        self.state().builds.get(&rev(revision)).copied().unwrap_or(0)
    }

    pub fn events(&self) -> Vec<String> {
        self.state().events.clone()
    }
}

#[async_trait]
impl VersionControl for FakeEnv {
    async fn current_revision(&self) -> CollaboratorResult<Revision> {
        self.state()
            .head
            .clone()
            .ok_or_else(|| CollaboratorError::Other("no head".into()))
    }

    async fn reset_to(&self, revision: &Revision) -> CollaboratorResult<()> {
        let mut s = self.state();
        s.events.push(format!("reset {revision}"));
        s.resets.push(revision.clone());
        if s.reset_fails_for.contains(revision) {
            return Err(CollaboratorError::Other(format!(
                "unknown revision {revision}"
            )));
        }
        let commit = s
            .refs
            .get(revision.as_str())
            .cloned()
            .unwrap_or_else(|| revision.clone());
        s.head = Some(commit);
        Ok(())
    }
}

#[async_trait]
impl ArtifactBuilder for FakeEnv {
    async fn build(&self, _services: &[String], revision: &Revision) -> CollaboratorResult<()> {
        let mut s = self.state();
        s.events.push(format!("build {revision}"));
        *s.builds.entry(revision.clone()).or_default() += 1;
        if s.head.as_ref() != Some(revision) {
            return Err(CollaboratorError::Other(format!(
                "head is not {revision}"
            )));
        }
        if s.transient_build_failures > 0 {
            s.transient_build_failures -= 1;
            return Err(CollaboratorError::Other("registry timeout".into()));
        }
        if s.broken_builds.contains(revision) {
            return Err(CollaboratorError::Other("compile error".into()));
        }
        s.built = Some(revision.clone());
        Ok(())
    }

    async fn prune(&self) -> CollaboratorResult<()> {
        let mut s = self.state();
        s.events.push("prune".into());
        s.prunes += 1;
        if s.prune_fails {
            return Err(CollaboratorError::Other("prune failed".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl MigrationRunner for FakeEnv {
    async fn migrate(&self, revision: &Revision) -> CollaboratorResult<()> {
        let mut s = self.state();
        s.events.push(format!("migrate {revision}"));
        s.migrations += 1;
        if s.migrate_fails {
            return Err(CollaboratorError::Other("duplicate column".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl RuntimeController for FakeEnv {
    async fn start(&self, _services: &[String]) -> CollaboratorResult<()> {
        let mut s = self.state();
        s.events.push("start".into());
        s.starts += 1;
        let built = s
            .built
            .clone()
            .ok_or_else(|| CollaboratorError::Other("nothing built".into()))?;
        if s.start_fails_for.contains(&built) {
            return Err(CollaboratorError::Other("port already allocated".into()));
        }
        s.running = Some(built);
        Ok(())
    }

    async fn status(&self, _service: &str) -> CollaboratorResult<RunStatus> {
        Ok(RunStatus::Starting)
    }
}

#[async_trait]
impl IngressRefresher for FakeEnv {
    async fn refresh(&self) -> CollaboratorResult<()> {
        let mut s = self.state();
        s.events.push("refresh".into());
        s.refreshes += 1;
        if s.ingress_fails {
            return Err(CollaboratorError::Other("proxy unreachable".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl LivenessProbe for FakeEnv {
    async fn probe(&self, service: &ServiceConfig) -> ProbeResult {
        let mut s = self.state();
        *s.liveness_probes.entry(service.name.clone()).or_default() += 1;
        let Some(running) = s.running.clone() else {
            return ProbeResult::Failed;
        };
        if s.unhealthy.contains(&(service.name.clone(), running)) {
            ProbeResult::Unhealthy
        } else {
            ProbeResult::Healthy
        }
    }
}

#[async_trait]
impl EndpointProbe for FakeEnv {
    async fn probe(&self, url: &str, _accepted: &[u16]) -> ProbeResult {
        let mut s = self.state();
        s.external_probes += 1;
        let entry = format!("probe {url}");
        if s.events.last() != Some(&entry) {
            s.events.push(entry);
        }
        match s.running.clone() {
            Some(running) if !s.external_down_for.contains(&running) => ProbeResult::Healthy,
            _ => ProbeResult::Unhealthy,
        }
    }
}

/// A store whose writes always fail.
pub struct ReadOnlyStore(pub RedbRevisionStore);

impl RevisionStore for ReadOnlyStore {
    fn read(&self) -> StateResult<Option<StableRevisionRecord>> {
        self.0.read()
    }

    fn write(&self, _record: &StableRevisionRecord) -> StateResult<()> {
        Err(StateError::Write("read-only filesystem".into()))
    }
}

/// A store whose record can never be read.
pub struct CorruptStore(pub RedbRevisionStore);

impl RevisionStore for CorruptStore {
    fn read(&self) -> StateResult<Option<StableRevisionRecord>> {
        Err(StateError::Corrupt("expected value at line 1 column 1".into()))
    }

    fn write(&self, record: &StableRevisionRecord) -> StateResult<()> {
        self.0.write(record)
    }
}

pub fn services() -> Vec<ServiceConfig> {
    vec![
        ServiceConfig {
            name: "api".into(),
            liveness: Some(Liveness::Http("http://127.0.0.1:8000/health".into())),
        },
        ServiceConfig {
            name: "web".into(),
            liveness: Some(Liveness::Command(CommandTemplate::new(["true"]))),
        },
        ServiceConfig {
            name: "proxy".into(),
            liveness: None,
        },
    ]
}

pub fn endpoints() -> Vec<EndpointConfig> {
    vec![
        EndpointConfig {
            url: "http://127.0.0.1/".into(),
            accept: vec![200, 304],
        },
        EndpointConfig {
            url: "http://127.0.0.1/api/health".into(),
            accept: vec![200],
        },
    ]
}

pub fn store_with(stable: Option<&str>) -> RedbRevisionStore {
    let store = RedbRevisionStore::open_in_memory().unwrap();
    if let Some(commit) = stable {
        store
            .write(&StableRevisionRecord::new(rev(commit), 1))
            .unwrap();
    }
    store
}

pub fn collaborators(
    env: &FakeEnv,
    store: Arc<dyn RevisionStore>,
    clock: &ManualClock,
) -> Collaborators {
    let env = Arc::new(env.clone());
    Collaborators {
        vcs: env.clone(),
        builder: env.clone(),
        migrations: env.clone(),
        runtime: env.clone(),
        ingress: env.clone(),
        liveness: env.clone(),
        endpoints: env,
        store,
        clock: Arc::new(clock.clone()),
    }
}

pub fn orchestrator(
    env: &FakeEnv,
    store: Arc<dyn RevisionStore>,
    clock: &ManualClock,
) -> Orchestrator {
    Orchestrator::new(
        services(),
        endpoints(),
        Timings::default(),
        collaborators(env, store, clock),
    )
}

/// Sleep budget of the happy path with default timings: ingress settle only.
pub const SETTLE: Duration = Duration::from_secs(10);
