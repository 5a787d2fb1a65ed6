//! relaunch.toml manifest parser.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};

use crate::template::CommandTemplate;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelaunchConfig {
    pub project: ProjectConfig,
    #[serde(rename = "service", default)]
    pub services: Vec<ServiceConfig>,
    pub commands: Commands,
    #[serde(default)]
    pub external: ExternalConfig,
    #[serde(default)]
    pub timing: Timings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    pub name: String,
    /// Directory the collaborator commands run in. Relative paths resolve
    /// against the manifest's directory.
    #[serde(default = "default_workdir")]
    pub workdir: PathBuf,
    /// Location of the stable revision record. Relative paths resolve
    /// against `workdir`.
    #[serde(default = "default_stable_record")]
    pub stable_record: PathBuf,
    #[serde(default)]
    pub state_backend: StateBackend,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StateBackend {
    /// JSON file replaced atomically on write.
    #[default]
    File,
    /// Single row in a redb database.
    Redb,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
    /// Liveness contract. Services without one count as healthy once started.
    pub liveness: Option<Liveness>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Liveness {
    /// GET the URL; any 2xx passes.
    Http(String),
    /// Run the command; exit status 0 passes.
    Command(CommandTemplate),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Commands {
    pub build: CommandTemplate,
    pub migrate: CommandTemplate,
    pub start: CommandTemplate,
    /// Optional per-service status query; exit 0 with non-empty stdout means running.
    pub status: Option<CommandTemplate>,
    pub refresh_ingress: CommandTemplate,
    pub prune: Option<CommandTemplate>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExternalConfig {
    #[serde(rename = "endpoint", default)]
    pub endpoints: Vec<EndpointConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointConfig {
    pub url: String,
    #[serde(default = "default_accept")]
    pub accept: Vec<u16>,
}

/// Retry ceilings, intervals, and settle delays for one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timings {
    pub build_attempts: u32,
    pub build_backoff_secs: u64,
    pub internal_interval_secs: u64,
    pub internal_attempts: u32,
    pub ingress_settle_secs: u64,
    pub external_interval_secs: u64,
    pub external_attempts: u32,
    pub probe_timeout_secs: u64,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            build_attempts: 3,
            build_backoff_secs: 30,
            internal_interval_secs: 2,
            internal_attempts: 30,
            ingress_settle_secs: 10,
            external_interval_secs: 5,
            external_attempts: 12,
            probe_timeout_secs: 5,
        }
    }
}

impl Timings {
    pub fn build_backoff(&self) -> Duration {
        Duration::from_secs(self.build_backoff_secs)
    }

    pub fn internal_interval(&self) -> Duration {
        Duration::from_secs(self.internal_interval_secs)
    }

    pub fn ingress_settle(&self) -> Duration {
        Duration::from_secs(self.ingress_settle_secs)
    }

    pub fn external_interval(&self) -> Duration {
        Duration::from_secs(self.external_interval_secs)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        for (name, value) in [
            ("build_attempts", self.build_attempts),
            ("internal_attempts", self.internal_attempts),
            ("external_attempts", self.external_attempts),
        ] {
            if value == 0 {
                bail!("[timing] {name} must be at least 1");
            }
        }
        if self.probe_timeout_secs == 0 {
            bail!("[timing] probe_timeout_secs must be at least 1");
        }
        Ok(())
    }
}

fn default_workdir() -> PathBuf {
    PathBuf::from(".")
}

fn default_stable_record() -> PathBuf {
    PathBuf::from(".relaunch/stable.json")
}

fn default_accept() -> Vec<u16> {
    vec![200, 304]
}

impl RelaunchConfig {
    /// Load, resolve relative paths, and validate a manifest.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let mut config = Self::parse(&content)
            .with_context(|| format!("invalid manifest {}", path.display()))?;
        let base = path.parent().unwrap_or(Path::new("."));
        config.resolve_paths(base);
        Ok(config)
    }

    /// Parse and validate manifest text without touching the filesystem.
    pub fn parse(content: &str) -> anyhow::Result<Self> {
        let config: RelaunchConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn resolve_paths(&mut self, base: &Path) {
        if self.project.workdir.is_relative() {
            self.project.workdir = base.join(&self.project.workdir);
        }
        if self.project.stable_record.is_relative() {
            self.project.stable_record = self.project.workdir.join(&self.project.stable_record);
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.services.is_empty() {
            bail!("at least one [[service]] is required");
        }
        let mut seen = HashSet::new();
        for svc in &self.services {
            if svc.name.trim().is_empty() {
                bail!("service name must not be empty");
            }
            if !seen.insert(svc.name.as_str()) {
                bail!("duplicate service name: {}", svc.name);
            }
            match &svc.liveness {
                Some(Liveness::Http(url)) => check_http_url(url)
                    .with_context(|| format!("service {} liveness", svc.name))?,
                Some(Liveness::Command(cmd)) if cmd.is_empty() => {
                    bail!("service {} liveness command is empty", svc.name)
                }
                _ => {}
            }
        }

        let required = [
            ("build", &self.commands.build),
            ("migrate", &self.commands.migrate),
            ("start", &self.commands.start),
            ("refresh_ingress", &self.commands.refresh_ingress),
        ];
        for (name, cmd) in required {
            if cmd.is_empty() {
                bail!("[commands] {name} must not be empty");
            }
            if cmd.uses_service() {
                bail!("[commands] {name} cannot use {{service}}; use {{services}}");
            }
        }
        if let Some(prune) = &self.commands.prune {
            if prune.is_empty() {
                bail!("[commands] prune must not be empty when set");
            }
        }
        if let Some(status) = &self.commands.status {
            if status.is_empty() {
                bail!("[commands] status must not be empty when set");
            }
        }

        if self.external.endpoints.is_empty() {
            bail!("at least one [[external.endpoint]] is required");
        }
        for ep in &self.external.endpoints {
            check_http_url(&ep.url).with_context(|| format!("external endpoint {}", ep.url))?;
            if ep.accept.is_empty() {
                bail!("external endpoint {} accepts no status codes", ep.url);
            }
            if let Some(bad) = ep.accept.iter().find(|c| !(100..=599).contains(*c)) {
                bail!("external endpoint {} accepts invalid status code {bad}", ep.url);
            }
        }

        self.timing.validate()
    }
}

fn check_http_url(url: &str) -> anyhow::Result<()> {
    let uri: http::Uri = url.parse().with_context(|| format!("invalid URL {url}"))?;
    match uri.scheme_str() {
        Some("http") => {}
        Some(other) => bail!("unsupported scheme {other} in {url}; only http is probed"),
        None => bail!("URL {url} has no scheme"),
    }
    if uri.host().is_none() {
        bail!("URL {url} has no host");
    }
    Ok(())
}
