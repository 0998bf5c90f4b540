use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct ApplicationConfig {
    pub output_directory: String,
    pub video_format: String, // Container, e.g., "mp4", "avi"
    pub video_codec: String,  // e.g., "mp4v", "h264", "mjpeg"
    pub filename_timestamp_format: String, // strftime format string
    pub log_level: Option<String>,
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        ApplicationConfig {
            output_directory: "Videos".to_string(),
            video_format: "mp4".to_string(),
            video_codec: "mp4v".to_string(),
            filename_timestamp_format: "%Y%m%d_%H%M%S".to_string(),
            log_level: Some("info".to_string()),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ResolutionPreset {
    Low,
    Medium,
    #[default]
    High,
    Ultra,
}

impl ResolutionPreset {
    pub fn dimensions(&self) -> (u32, u32) {
        match self {
            ResolutionPreset::Low => (640, 480),
            ResolutionPreset::Medium => (1280, 720),
            ResolutionPreset::High => (1920, 1080),
            ResolutionPreset::Ultra => (3840, 2160),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ResolutionPreset::Low => "Low",
            ResolutionPreset::Medium => "Medium",
            ResolutionPreset::High => "High",
            ResolutionPreset::Ultra => "Ultra",
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct StreamConfig {
    /// Device index (e.g. "0") or stream URI (e.g. "rtsp://...").
    pub source: String,
    pub frame_rate: u32,
    pub resolution: ResolutionPreset,
}

impl Default for StreamConfig {
    fn default() -> Self {
        StreamConfig {
            source: "0".to_string(),
            frame_rate: 30,
            resolution: ResolutionPreset::High,
        }
    }
}

/// Knobs of the recorder pipeline. These are the values `PipelineHandle::reconfigure` accepts.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct PipelineSettings {
    pub pre_buffer_seconds: u32,
    pub post_buffer_seconds: u32,
    pub queue_capacity: usize,
    pub enqueue_timeout_ms: u64,
    pub dequeue_timeout_ms: u64,
    pub read_retry_backoff_ms: u64,
    pub writer_drain_timeout_secs: u64,
    pub shutdown_grace_ms: u64,
    pub writer_join_timeout_secs: u64,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        PipelineSettings {
            pre_buffer_seconds: 5,
            post_buffer_seconds: 5,
            queue_capacity: 300,
            enqueue_timeout_ms: 1000,
            dequeue_timeout_ms: 1000,
            read_retry_backoff_ms: 10,
            writer_drain_timeout_secs: 30,
            shutdown_grace_ms: 500,
            writer_join_timeout_secs: 5,
        }
    }
}

impl PipelineSettings {
    pub fn pre_roll_capacity(&self, frame_rate: u32) -> usize {
        self.pre_buffer_seconds as usize * frame_rate as usize
    }

    pub fn post_roll(&self) -> Duration {
        Duration::from_secs(self.post_buffer_seconds as u64)
    }

    pub fn enqueue_timeout(&self) -> Duration {
        Duration::from_millis(self.enqueue_timeout_ms)
    }

    pub fn dequeue_timeout(&self) -> Duration {
        Duration::from_millis(self.dequeue_timeout_ms)
    }

    pub fn read_retry_backoff(&self) -> Duration {
        Duration::from_millis(self.read_retry_backoff_ms)
    }

    pub fn writer_drain_timeout(&self) -> Duration {
        Duration::from_secs(self.writer_drain_timeout_secs)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }

    pub fn writer_join_timeout(&self) -> Duration {
        Duration::from_secs(self.writer_join_timeout_secs)
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct TrackingConfig {
    pub api_base: String,
    pub workstation_id: Option<i64>,
    pub workstation_name: String,
    pub system_ip: Option<String>,
    pub request_timeout_secs: u64,
    pub upload_timeout_secs: u64,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        TrackingConfig {
            api_base: "http://127.0.0.1:27189".to_string(),
            workstation_id: None,
            workstation_name: String::new(),
            system_ip: None,
            request_timeout_secs: 10,
            upload_timeout_secs: 120,
        }
    }
}
