use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

mod adapters;
mod commands;

use commands::Overrides;

#[derive(Parser)]
#[command(
    name = "relaunch",
    about = "relaunch — redeploy a service set with automatic rollback",
    version,
    propagate_version = true
)]
struct Cli {
    /// Path to the deployment manifest.
    #[arg(short, long, global = true, default_value = "relaunch.toml")]
    config: PathBuf,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Build, migrate, start and verify a revision; roll back on failure.
    ///
    /// Without REVISION the revision currently checked out is deployed.
    Deploy {
        revision: Option<String>,

        /// Build attempt ceiling (first attempt included).
        #[arg(long)]
        build_attempts: Option<u32>,

        /// Internal liveness attempt ceiling per service.
        #[arg(long)]
        health_attempts: Option<u32>,

        /// External endpoint attempt ceiling per endpoint.
        #[arg(long)]
        external_attempts: Option<u32>,
    },
    /// Restore the recorded stable revision.
    Rollback,
    /// Print the recorded stable revision.
    Stable,
}

fn init_tracing(json: bool) -> anyhow::Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new("info,relaunch=debug"))?;
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = init_tracing(cli.log_json) {
        eprintln!("error: failed to initialise logging: {e}");
        return ExitCode::FAILURE;
    }

    let result = match cli.command {
        Command::Deploy {
            revision,
            build_attempts,
            health_attempts,
            external_attempts,
        } => {
            let overrides = Overrides {
                build_attempts,
                health_attempts,
                external_attempts,
            };
            commands::deploy::deploy(&cli.config, revision.as_deref(), overrides).await
        }
        Command::Rollback => commands::rollback::rollback(&cli.config).await,
        Command::Stable => commands::stable::stable(&cli.config),
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
