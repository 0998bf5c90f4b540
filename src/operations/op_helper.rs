use crate::config_loader::MasterConfig;
use anyhow::{Context, Result};
use clap::ArgMatches;
use log::debug;
use std::time::Instant;

/// Output directory for an operation: the CLI override when given, the configured one otherwise.
pub fn resolve_output_directory(master_config: &MasterConfig, args: &ArgMatches, cli_key: &str) -> String {
    match args.try_get_one::<String>(cli_key).ok().flatten() {
        Some(dir) => {
            debug!("Output directory overridden from CLI: {}", dir);
            dir.clone()
        }
        None => master_config.app_settings.output_directory.clone(),
    }
}

/// Runs blocking work (OpenCV, blocking HTTP) off the async runtime and flattens the result.
pub async fn run_blocking<T, F>(operation_display_name: &str, work: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    let started = Instant::now();
    let result = tokio::task::spawn_blocking(work)
        .await
        .with_context(|| format!("{} task panicked or was cancelled", operation_display_name))?;
    debug!("{} blocking section finished in {:?}", operation_display_name, started.elapsed());
    result
}
