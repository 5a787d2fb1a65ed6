//! Probe seams used by the orchestrator, and their manifest-driven
//! implementations.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use relaunch_core::{Liveness, ServiceConfig, TemplateVars};
use tracing::debug;

use crate::checker::{http_probe, ProbeResult, StatusCheck};

/// Internal, per-service liveness check.
#[async_trait]
pub trait LivenessProbe: Send + Sync {
    async fn probe(&self, service: &ServiceConfig) -> ProbeResult;
}

/// External check through the public entry point.
#[async_trait]
pub trait EndpointProbe: Send + Sync {
    async fn probe(&self, url: &str, accepted: &[u16]) -> ProbeResult;
}

/// Liveness driven by each service's `liveness` manifest entry.
#[derive(Debug, Clone)]
pub struct ManifestLiveness {
    workdir: PathBuf,
    timeout: Duration,
}

impl ManifestLiveness {
    pub fn new(workdir: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            workdir: workdir.into(),
            timeout,
        }
    }

    async fn run_command(&self, service: &str, argv: &[String]) -> ProbeResult {
        let Some((program, args)) = argv.split_first() else {
            return ProbeResult::Failed;
        };
        let status = tokio::time::timeout(
            self.timeout,
            tokio::process::Command::new(program)
                .args(args)
                .current_dir(&self.workdir)
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .kill_on_drop(true)
                .status(),
        )
        .await;

        match status {
            Ok(Ok(status)) if status.success() => ProbeResult::Healthy,
            Ok(Ok(status)) => {
                debug!(%service, %program, code = ?status.code(), "liveness command failed");
                ProbeResult::Unhealthy
            }
            Ok(Err(e)) => {
                debug!(%service, %program, error = %e, "liveness command could not run");
                ProbeResult::Failed
            }
            Err(_) => {
                debug!(%service, %program, "liveness command timed out");
                ProbeResult::Failed
            }
        }
    }
}

#[async_trait]
impl LivenessProbe for ManifestLiveness {
    async fn probe(&self, service: &ServiceConfig) -> ProbeResult {
        match &service.liveness {
            None => ProbeResult::Healthy,
            Some(Liveness::Http(url)) => {
                http_probe(url, StatusCheck::AnySuccess, self.timeout).await
            }
            Some(Liveness::Command(template)) => {
                let argv = template.expand(TemplateVars {
                    service: Some(&service.name),
                    ..Default::default()
                });
                self.run_command(&service.name, &argv).await
            }
        }
    }
}

/// Plain HTTP/1.1 endpoint probe with an accepted-status set.
#[derive(Debug, Clone, Copy)]
pub struct HttpEndpointProbe {
    timeout: Duration,
}

impl HttpEndpointProbe {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl EndpointProbe for HttpEndpointProbe {
    async fn probe(&self, url: &str, accepted: &[u16]) -> ProbeResult {
        http_probe(url, StatusCheck::OneOf(accepted), self.timeout).await
    }
}
