use std::path::Path;
use std::process::ExitCode;

pub fn stable(config_path: &Path) -> anyhow::Result<ExitCode> {
    let config = super::load_config(config_path, super::Overrides::default())?;
    let store = super::open_store(&config)?;

    match store.read()? {
        Some(record) => {
            println!("{} (recorded at {})", record.commit, record.recorded_at);
            Ok(ExitCode::SUCCESS)
        }
        None => {
            eprintln!("no stable revision recorded");
            Ok(ExitCode::FAILURE)
        }
    }
}
