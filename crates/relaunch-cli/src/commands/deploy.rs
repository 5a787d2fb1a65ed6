use std::path::Path;
use std::process::ExitCode;

use anyhow::Context;
use relaunch_core::{Outcome, Revision};

use super::Overrides;

pub async fn deploy(
    config_path: &Path,
    revision: Option<&str>,
    overrides: Overrides,
) -> anyhow::Result<ExitCode> {
    let config = super::load_config(config_path, overrides)?;
    let orchestrator = super::orchestrator(&config)?;

    let target = match revision {
        Some(r) => Revision::new(r)?,
        None => orchestrator
            .current_revision()
            .await
            .context("no revision given and the current revision is unknown")?,
    };

    let report = orchestrator.deploy(target).await;
    let code = match report.outcome() {
        Outcome::Success | Outcome::RolledBack => {
            println!("{}", report.summary());
            ExitCode::SUCCESS
        }
        _ => {
            eprintln!("error: {}", report.summary());
            ExitCode::FAILURE
        }
    };
    println!(
        "attempt: {} outcome={} build_retries={} health_checks={}",
        report.attempt.target_revision.short(),
        report.outcome(),
        report.attempt.build_retry_count,
        report.health_checks.len()
    );
    Ok(code)
}
