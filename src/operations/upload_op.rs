use crate::config_loader::MasterConfig;
use crate::core::finalize;
use crate::core::session::SessionOutcome;
use crate::operations::op_helper;
use crate::tracking::client::TrackingClient;
use anyhow::{bail, Context, Result};
use clap::ArgMatches;
use log::info;
use std::path::PathBuf;
use std::time::Instant;

/// Manual recovery for an artifact that stayed on disk after a failed upload.
pub async fn handle_upload_cli(master_config: &MasterConfig, args: &ArgMatches) -> Result<()> {
    let op_start_time = Instant::now();
    let tracking_id = args
        .get_one::<String>("tracking-id")
        .cloned()
        .context("--tracking-id is required")?;
    let artifact = args
        .get_one::<String>("file")
        .map(PathBuf::from)
        .context("--file is required")?;
    if !artifact.is_file() {
        bail!("Artifact '{}' does not exist or is not a file", artifact.display());
    }

    let tracking_config = master_config.tracking.clone();
    let display_path = artifact.display().to_string();
    let outcome = op_helper::run_blocking("Artifact upload", move || {
        let client = TrackingClient::new(&tracking_config)?;
        Ok(finalize::upload_and_release(&client, &tracking_id, &artifact))
    })
    .await?;

    match outcome {
        SessionOutcome::Completed => {
            info!("✅ '{}' recovered in {:?}", display_path, op_start_time.elapsed());
            Ok(())
        }
        other => bail!("Upload of '{}' did not complete ({:?})", display_path, other),
    }
}
