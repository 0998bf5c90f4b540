use barcam::common::logging_setup;
use barcam::{cli, config_loader, operations};
use log::{info, error, debug};
use anyhow::{Result, bail};
use std::time::Instant;

#[tokio::main]
async fn main() -> Result<()> {
    let main_start_time = Instant::now();
    let matches = cli::build_cli().get_matches();

    let config_path = matches
        .get_one::<String>("config")
        .map(|s| s.as_str())
        .unwrap_or(cli::DEFAULT_CONFIG_PATH);

    let config_load_start_time = Instant::now();
    let master_config = match config_loader::load_config(config_path) {
        Ok(cfg) => {
            logging_setup::initialize_logging(Some(&cfg), &matches);
            info!("✅ Configuration loaded from: {} in {:?}", config_path, config_load_start_time.elapsed());
            cfg
        }
        Err(e) => {
            logging_setup::initialize_logging(None, &matches);
            error!("❌ Failed to load configuration from '{}': {:#}. Exiting.", config_path, e);
            return Err(e.context(format!("Failed to load configuration from '{}'", config_path)));
        }
    };

    if let Some((operation_name, sub_matches)) = matches.subcommand() {
        debug!("🎬 Dispatching to subcommand: {}", operation_name);
        let op_start_time = Instant::now();

        let op_result: Result<()> = match operation_name {
            "run" => operations::record_op::handle_run_cli(&master_config, sub_matches).await,
            "register" => {
                operations::workstation_op::handle_register_cli(&master_config, config_path, sub_matches).await
            }
            "upload" => operations::upload_op::handle_upload_cli(&master_config, sub_matches).await,
            other => bail!("Subcommand '{}' not implemented.", other),
        };

        if let Err(e) = op_result {
            error!("❌ Operation '{}' failed after {:?}: {:#}", operation_name, op_start_time.elapsed(), e);
            return Err(e);
        }
        info!("✅ Operation '{}' completed in {:?}.", operation_name, op_start_time.elapsed());
    } else {
        info!("🤔 No subcommand provided. Try `barcam run` or `barcam --help`.");
    }

    info!("🏁 barcam finished in {:?}.", main_start_time.elapsed());
    Ok(())
}
