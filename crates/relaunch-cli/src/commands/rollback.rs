use std::path::Path;
use std::process::ExitCode;

pub async fn rollback(config_path: &Path) -> anyhow::Result<ExitCode> {
    let config = super::load_config(config_path, super::Overrides::default())?;
    let orchestrator = super::orchestrator(&config)?;

    match orchestrator.rollback().await {
        Ok(revision) => {
            println!("restored {revision} (not re-verified through the public endpoint)");
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            eprintln!("error: rollback failed: {e}; manual intervention required");
            Ok(ExitCode::FAILURE)
        }
    }
}
