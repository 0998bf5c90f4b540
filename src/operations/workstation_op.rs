use crate::config_loader::{self, MasterConfig};
use crate::operations::op_helper;
use crate::tracking::client::TrackingClient;
use crate::tracking::types::WorkstationInfo;
use anyhow::{Context, Result};
use clap::ArgMatches;
use log::{debug, info, warn};
use std::net::UdpSocket;
use std::time::Instant;

pub async fn handle_register_cli(master_config: &MasterConfig, config_path: &str, args: &ArgMatches) -> Result<()> {
    let op_start_time = Instant::now();
    let mut updated_config = master_config.clone();
    if let Some(name) = args.get_one::<String>("name") {
        updated_config.tracking.workstation_name = name.clone();
    }
    if updated_config.tracking.workstation_name.trim().is_empty() {
        updated_config.tracking.workstation_name = "workstation".to_string();
        warn!("⚠️ No workstation_name configured; registering as '{}'.", updated_config.tracking.workstation_name);
    }

    let info = workstation_info(&updated_config);
    let existing_id = updated_config.tracking.workstation_id;
    let tracking_config = updated_config.tracking.clone();
    info!(
        "🖥️ {} workstation '{}' ({}) at {}",
        if existing_id.is_some() { "Updating" } else { "Registering" },
        info.workstation_name,
        info.system_ip,
        tracking_config.api_base
    );

    let workstation_id = op_helper::run_blocking("Workstation registration", move || {
        let client = TrackingClient::new(&tracking_config)?;
        let id = match existing_id {
            Some(id) => {
                client.update_workstation(id, &info)?;
                id
            }
            None => client.create_workstation(&info)?,
        };
        Ok(id)
    })
    .await
    .context("Workstation registration failed")?;

    if existing_id != Some(workstation_id) || updated_config.tracking.workstation_name != master_config.tracking.workstation_name {
        updated_config.tracking.workstation_id = Some(workstation_id);
        config_loader::save_config(config_path, &updated_config)
            .with_context(|| format!("Workstation {} registered but config could not be saved", workstation_id))?;
    }
    info!("✅ Workstation id {} ready in {:?}", workstation_id, op_start_time.elapsed());
    Ok(())
}

pub fn workstation_info(config: &MasterConfig) -> WorkstationInfo {
    WorkstationInfo {
        workstation_name: config.tracking.workstation_name.clone(),
        system_ip: config.tracking.system_ip.clone().unwrap_or_else(local_ip_address),
        rtsp_url: config.stream.source.clone(),
        frame_rate: config.stream.frame_rate,
        pre_buffer_duration: config.pipeline.pre_buffer_seconds,
        post_buffer_duration: config.pipeline.post_buffer_seconds,
        video_quality: config.stream.resolution.label().to_string(),
        video_save_path: config.app_settings.output_directory.clone(),
        api_base: config.tracking.api_base.clone(),
    }
}

/// Address of the interface that routes outward. Connecting a UDP socket sends no packets.
fn local_ip_address() -> String {
    let routed = UdpSocket::bind("0.0.0.0:0").and_then(|socket| {
        socket.connect("8.8.8.8:80")?;
        socket.local_addr()
    });
    match routed {
        Ok(addr) => addr.ip().to_string(),
        Err(e) => {
            debug!("Could not determine local IP ({}); using loopback.", e);
            "127.0.0.1".to_string()
        }
    }
}
