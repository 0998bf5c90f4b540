use crate::errors::AppError;
use chrono::{DateTime, Local};
use std::path::Path;

// --- Data structures for frame information ---

/// One captured image. Pixel data is packed BGR24, `width * height * 3` bytes.
#[derive(Debug, Clone)]
pub struct Frame {
    pub seq: u64,
    pub captured_at: DateTime<Local>,
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl Frame {
    pub fn new(seq: u64, width: u32, height: u32, data: Vec<u8>) -> Self {
        Frame {
            seq,
            captured_at: Local::now(),
            width,
            height,
            data,
        }
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

/// Parameters the encoder is opened with for one session.
#[derive(Debug, Clone, PartialEq)]
pub struct EncoderSpec {
    pub frame_rate: f64,
    pub width: u32,
    pub height: u32,
    pub codec: String,
}

// --- The FrameSource Trait ---

/// A live stream handle. Opening happens in the implementor's constructor; a handle that
/// cannot be opened is a fatal `AppError::SourceUnavailable`.
pub trait FrameSource: Send {
    fn describe(&self) -> String;

    /// Blocks until the next frame is available. `AppError::FrameRead` is a transient
    /// hiccup the caller retries.
    fn next_frame(&mut self) -> Result<Frame, AppError>;

    /// Size every frame is normalised to.
    fn frame_size(&self) -> (u32, u32);
}

// --- The VideoEncoder Trait ---

/// Swappable boundary around the native encoder. At most one file is open at a time.
pub trait VideoEncoder: Send {
    fn open(&mut self, path: &Path, spec: &EncoderSpec) -> Result<(), AppError>;
    fn write(&mut self, frame: &Frame) -> Result<(), AppError>;
    fn close(&mut self) -> Result<(), AppError>;
    fn is_open(&self) -> bool;
}
