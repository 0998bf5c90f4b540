use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration Error: {0}")]
    Config(String),

    #[error("Stream source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("Frame read failed: {0}")]
    FrameRead(String),

    #[error("Encoder open failed for '{path}': {details}")]
    EncoderOpen { path: String, details: String },

    #[error("Encoder Error: {0}")]
    Encoder(String),

    #[error("Tracking API Error: {0}")]
    Tracking(String),

    #[error("Upload Error: {0}")]
    Upload(String),

    #[error("File I/O Error: {0}")]
    Io(String),
}

impl AppError {
    /// Single-frame hiccups are retried by the capture loop and never surfaced.
    pub fn is_transient(&self) -> bool {
        matches!(self, AppError::FrameRead(_))
    }
}

// Allow conversion from std::io::Error to AppError::Io
impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Io(err.to_string())
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            AppError::Tracking(format!("request timed out: {}", err))
        } else {
            AppError::Tracking(err.to_string())
        }
    }
}

#[cfg(feature = "opencv")]
impl From<opencv::Error> for AppError {
    fn from(err: opencv::Error) -> Self {
        AppError::Encoder(err.to_string())
    }
}
