pub mod deploy;
pub mod rollback;
pub mod stable;

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use relaunch_core::{RelaunchConfig, StateBackend};
use relaunch_health::{HttpEndpointProbe, ManifestLiveness, SystemClock};
use relaunch_rollout::{Collaborators, Orchestrator};
use relaunch_state::{FileRevisionStore, RedbRevisionStore, RevisionStore};
use tracing::debug;

use crate::adapters::{GitVersionControl, ManifestCommands};

/// Command-line overrides for attempt ceilings.
#[derive(Debug, Default, Clone, Copy)]
pub struct Overrides {
    pub build_attempts: Option<u32>,
    pub health_attempts: Option<u32>,
    pub external_attempts: Option<u32>,
}

pub fn load_config(path: &Path, overrides: Overrides) -> anyhow::Result<RelaunchConfig> {
    let mut config = RelaunchConfig::from_file(path)?;
    if let Some(n) = overrides.build_attempts {
        config.timing.build_attempts = n;
    }
    if let Some(n) = overrides.health_attempts {
        config.timing.internal_attempts = n;
    }
    if let Some(n) = overrides.external_attempts {
        config.timing.external_attempts = n;
    }
    config.timing.validate().context("invalid command-line override")?;
    debug!(project = %config.project.name, timing = ?config.timing, "manifest loaded");
    Ok(config)
}

pub fn open_store(config: &RelaunchConfig) -> anyhow::Result<Arc<dyn RevisionStore>> {
    let path = &config.project.stable_record;
    Ok(match config.project.state_backend {
        StateBackend::File => Arc::new(FileRevisionStore::new(path)),
        StateBackend::Redb => {
            let db = path.with_extension("redb");
            let store = RedbRevisionStore::open(&db)
                .with_context(|| format!("failed to open {}", db.display()))?;
            Arc::new(store)
        }
    })
}

/// Wire the production collaborators for a manifest.
pub fn orchestrator(config: &RelaunchConfig) -> anyhow::Result<Orchestrator> {
    let workdir = &config.project.workdir;
    let commands = Arc::new(ManifestCommands::new(workdir, config.commands.clone()));
    let timeout = config.timing.probe_timeout();

    let deps = Collaborators {
        vcs: Arc::new(GitVersionControl::new(workdir)),
        builder: commands.clone(),
        migrations: commands.clone(),
        runtime: commands.clone(),
        ingress: commands,
        liveness: Arc::new(ManifestLiveness::new(workdir, timeout)),
        endpoints: Arc::new(HttpEndpointProbe::new(timeout)),
        store: open_store(config)?,
        clock: Arc::new(SystemClock),
    };
    Ok(Orchestrator::from_config(config, deps))
}
