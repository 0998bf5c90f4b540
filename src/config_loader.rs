use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use crate::app_config::{ApplicationConfig, PipelineSettings, StreamConfig, TrackingConfig};
use anyhow::{Result, Context, bail};
use log::{debug, info};
use std::time::Instant;

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct MasterConfig {
    #[serde(rename = "application", default)]
    pub app_settings: ApplicationConfig,
    #[serde(default)]
    pub stream: StreamConfig,
    #[serde(default)]
    pub pipeline: PipelineSettings,
    #[serde(default)]
    pub tracking: TrackingConfig,
}

pub fn load_config(path: &str) -> Result<MasterConfig> {
    debug!("📄 Attempting to load config from: {}", path);
    let start_time = Instant::now();

    let config_str = fs::read_to_string(path)
        .with_context(|| format!("Failed to read configuration file '{}'. 📖", path))?;
    debug!("Read config file in {:?}", start_time.elapsed());

    let config = parse_config(&config_str)
        .with_context(|| format!("Failed to load configuration from '{}'", path))?;

    info!("✅ Successfully loaded and validated configuration from '{}' in {:?}", path, start_time.elapsed());
    Ok(config)
}

pub fn parse_config(config_str: &str) -> Result<MasterConfig> {
    let config: MasterConfig = serde_yaml::from_str(config_str)
        .context("Failed to parse YAML configuration. 💔")?;
    validate_master_config(&config).context("Master configuration validation failed 👎")?;
    Ok(config)
}

/// Writes the configuration back to disk, e.g. after a workstation id was issued.
pub fn save_config(path: &str, config: &MasterConfig) -> Result<()> {
    let yaml = serde_yaml::to_string(config).context("Failed to serialize configuration")?;
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory '{}'", parent.display()))?;
        }
    }
    fs::write(path, yaml).with_context(|| format!("Failed to write configuration file '{}'", path))?;
    info!("💾 Configuration saved to '{}'", path);
    Ok(())
}

fn validate_master_config(config: &MasterConfig) -> Result<()> {
    debug!("🕵️ Validating master configuration...");
    let validation_start_time = Instant::now();
    let app = &config.app_settings;
    if app.output_directory.is_empty() {
        bail!("❌ Application output_directory cannot be empty.");
    }
    let output_path = Path::new(&app.output_directory);
    if output_path.exists() && !output_path.is_dir() {
        bail!("❌ Output directory '{}' exists but is not a directory.", app.output_directory);
    }
    if app.video_format.is_empty() {
        bail!("❌ Application video_format cannot be empty.");
    }

    if config.stream.source.trim().is_empty() {
        bail!("❌ Stream source cannot be empty.");
    }
    if config.stream.frame_rate == 0 {
        bail!("❌ Stream frame_rate must be greater than zero.");
    }

    if config.pipeline.queue_capacity == 0 {
        bail!("❌ Pipeline queue_capacity must be greater than zero.");
    }

    if config.tracking.api_base.trim().is_empty() {
        bail!("❌ Tracking api_base cannot be empty.");
    }
    info!("👍 Master configuration validated successfully in {:?}.", validation_start_time.elapsed());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app_config::ResolutionPreset;

    #[test]
    fn empty_document_yields_defaults() {
        let cfg = parse_config("{}").unwrap();
        assert_eq!(cfg.stream.frame_rate, 30);
        assert_eq!(cfg.pipeline.queue_capacity, 300);
        assert_eq!(cfg.app_settings.filename_timestamp_format, "%Y%m%d_%H%M%S");
        assert_eq!(cfg.tracking.workstation_id, None);
    }

    #[test]
    fn sections_override_defaults() {
        let yaml = r#"
application:
  output_directory: ./clips
  video_format: avi
stream:
  source: "rtsp://10.0.0.5/stream"
  frame_rate: 10
  resolution: low
pipeline:
  pre_buffer_seconds: 2
  post_buffer_seconds: 1
tracking:
  api_base: http://tracker.local:27189
  workstation_id: 7
"#;
        let cfg = parse_config(yaml).unwrap();
        assert_eq!(cfg.app_settings.video_format, "avi");
        assert_eq!(cfg.app_settings.video_codec, "mp4v");
        assert_eq!(cfg.stream.resolution, ResolutionPreset::Low);
        assert_eq!(cfg.pipeline.pre_roll_capacity(cfg.stream.frame_rate), 20);
        assert_eq!(cfg.pipeline.queue_capacity, 300);
        assert_eq!(cfg.tracking.workstation_id, Some(7));
    }

    #[test]
    fn rejects_zero_frame_rate() {
        let err = parse_config("stream:\n  frame_rate: 0\n").unwrap_err();
        assert!(format!("{:#}", err).contains("frame_rate"));
    }

    #[test]
    fn rejects_output_path_that_is_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("not_a_dir");
        std::fs::write(&file, b"x").unwrap();
        let yaml = format!("application:\n  output_directory: \"{}\"\n", file.display());
        assert!(parse_config(&yaml).is_err());
    }

    #[test]
    fn save_then_load_preserves_workstation_id() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("conf").join("barcam.yaml");
        let path_str = path.to_str().unwrap();
        let mut cfg = MasterConfig::default();
        cfg.tracking.workstation_id = Some(42);
        cfg.tracking.workstation_name = "Line-A Station 3".into();
        save_config(path_str, &cfg).unwrap();

        let loaded = load_config(path_str).unwrap();
        assert_eq!(loaded.tracking.workstation_id, Some(42));
        assert_eq!(loaded.tracking.workstation_name, "Line-A Station 3");
    }

    #[test]
    fn shipped_sample_config_is_valid() {
        let cfg = parse_config(include_str!("../config/barcam.yaml")).unwrap();
        assert_eq!(cfg.stream.resolution, ResolutionPreset::High);
        assert_eq!(cfg.pipeline.post_buffer_seconds, 5);
    }
}
