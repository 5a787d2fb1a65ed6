//! Process-backed collaborators: `git` for version control, manifest
//! command templates for everything else.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use relaunch_core::{CommandTemplate, Commands, Revision, RunStatus, TemplateVars};
use relaunch_rollout::{
    ArtifactBuilder, CollaboratorError, CollaboratorResult, IngressRefresher, MigrationRunner,
    RuntimeController, VersionControl,
};
use tokio::process::Command;
use tracing::{debug, warn};

/// Lines of stderr kept in error messages.
const STDERR_TAIL_LINES: usize = 20;

/// Captured output of a finished process.
struct Finished {
    success: bool,
    status: String,
    stdout: String,
    stderr: String,
}

async fn spawn(workdir: &Path, argv: &[String]) -> CollaboratorResult<Finished> {
    let (program, args) = argv
        .split_first()
        .ok_or_else(|| CollaboratorError::Other("empty command".to_string()))?;
    debug!(%program, ?args, "running");

    let output = Command::new(program)
        .args(args)
        .current_dir(workdir)
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|source| CollaboratorError::Spawn {
            program: program.clone(),
            source,
        })?;

    Ok(Finished {
        success: output.status.success(),
        status: output.status.to_string(),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
}

/// Run a command; a non-zero exit is an error carrying the stderr tail.
async fn run(workdir: &Path, argv: &[String]) -> CollaboratorResult<String> {
    let finished = spawn(workdir, argv).await?;
    if finished.success {
        return Ok(finished.stdout);
    }
    Err(CollaboratorError::Exit {
        program: argv.first().cloned().unwrap_or_default(),
        status: finished.status,
        stderr: tail(&finished.stderr, STDERR_TAIL_LINES),
    })
}

fn tail(text: &str, lines: usize) -> String {
    let all: Vec<&str> = text.trim_end().lines().collect();
    let skip = all.len().saturating_sub(lines);
    all[skip..].join("\n")
}

// ── Version control ────────────────────────────────────────────────

pub struct GitVersionControl {
    workdir: PathBuf,
}

impl GitVersionControl {
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self {
            workdir: workdir.into(),
        }
    }

    fn git(args: &[&str]) -> Vec<String> {
        std::iter::once("git")
            .chain(args.iter().copied())
            .map(String::from)
            .collect()
    }
}

#[async_trait]
impl VersionControl for GitVersionControl {
    async fn current_revision(&self) -> CollaboratorResult<Revision> {
        let out = run(&self.workdir, &Self::git(&["rev-parse", "HEAD"])).await?;
        Ok(Revision::new(out.trim())?)
    }

    async fn reset_to(&self, revision: &Revision) -> CollaboratorResult<()> {
        // Offline checkouts still work when the revision is already local.
        if let Err(e) = run(&self.workdir, &Self::git(&["fetch", "--quiet", "--all"])).await {
            warn!(error = %e, "git fetch failed; resetting with local objects");
        }
        run(
            &self.workdir,
            &Self::git(&["reset", "--hard", "--quiet", revision.as_str()]),
        )
        .await?;
        Ok(())
    }
}

// ── Manifest commands ──────────────────────────────────────────────

/// All manifest-configured commands, run from the project workdir.
#[derive(Clone)]
pub struct ManifestCommands {
    workdir: PathBuf,
    commands: Commands,
}

impl ManifestCommands {
    pub fn new(workdir: impl Into<PathBuf>, commands: Commands) -> Self {
        Self {
            workdir: workdir.into(),
            commands,
        }
    }

    async fn run(&self, template: &CommandTemplate, vars: TemplateVars<'_>) -> CollaboratorResult<String> {
        run(&self.workdir, &template.expand(vars)).await
    }
}

#[async_trait]
impl ArtifactBuilder for ManifestCommands {
    async fn build(&self, services: &[String], revision: &Revision) -> CollaboratorResult<()> {
        let vars = TemplateVars {
            revision: Some(revision),
            services,
            service: None,
        };
        self.run(&self.commands.build, vars).await?;
        Ok(())
    }

    async fn prune(&self) -> CollaboratorResult<()> {
        match &self.commands.prune {
            Some(prune) => self.run(prune, TemplateVars::default()).await.map(drop),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl MigrationRunner for ManifestCommands {
    async fn migrate(&self, revision: &Revision) -> CollaboratorResult<()> {
        let vars = TemplateVars {
            revision: Some(revision),
            ..TemplateVars::default()
        };
        self.run(&self.commands.migrate, vars).await?;
        Ok(())
    }
}

#[async_trait]
impl RuntimeController for ManifestCommands {
    async fn start(&self, services: &[String]) -> CollaboratorResult<()> {
        let vars = TemplateVars {
            services,
            ..TemplateVars::default()
        };
        self.run(&self.commands.start, vars).await?;
        Ok(())
    }

    /// Exit 0 with non-empty stdout means running; any other exit means stopped.
    async fn status(&self, service: &str) -> CollaboratorResult<RunStatus> {
        let Some(template) = &self.commands.status else {
            return Ok(RunStatus::Starting);
        };
        let vars = TemplateVars {
            service: Some(service),
            ..TemplateVars::default()
        };
        let finished = spawn(&self.workdir, &template.expand(vars)).await?;
        if finished.success && !finished.stdout.trim().is_empty() {
            Ok(RunStatus::Running)
        } else {
            Ok(RunStatus::Stopped)
        }
    }
}

#[async_trait]
impl IngressRefresher for ManifestCommands {
    async fn refresh(&self) -> CollaboratorResult<()> {
        self.run(&self.commands.refresh_ingress, TemplateVars::default())
            .await?;
        Ok(())
    }
}
