use crate::core::capture_source::{EncoderSpec, Frame, FrameSource, VideoEncoder};
use crate::errors::AppError;
use log::{debug, info, warn};
use opencv::prelude::*;
use opencv::{core as opencv_core, imgproc, videoio};
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Live stream opened through OpenCV. The source string is either a device index ("0")
/// or anything `VideoCapture::from_file` accepts (rtsp/http URLs, files).
pub struct OpenCvSource {
    source: String,
    capture: videoio::VideoCapture,
    width: u32,
    height: u32,
    next_seq: u64,
}

impl OpenCvSource {
    pub fn open(source: &str, frame_size: (u32, u32)) -> Result<Self, AppError> {
        let open_start = Instant::now();
        debug!("Creating VideoCapture for '{}'", source);
        let unavailable = |e: opencv::Error| {
            AppError::SourceUnavailable(format!("OpenCV could not open '{}': {}", source, e))
        };
        let mut capture = match source.trim().parse::<i32>() {
            Ok(index) => videoio::VideoCapture::new(index, videoio::CAP_ANY).map_err(unavailable)?,
            Err(_) => videoio::VideoCapture::from_file(source, videoio::CAP_ANY).map_err(unavailable)?,
        };
        if !capture.is_opened().map_err(unavailable)? {
            return Err(AppError::SourceUnavailable(format!(
                "Stream '{}' could not be opened",
                source
            )));
        }

        let (width, height) = frame_size;
        // Devices that cannot honour the request keep their native size; frames are resized on read.
        if let Err(e) = capture.set(videoio::CAP_PROP_FRAME_WIDTH, width as f64) {
            debug!("Could not request frame width {} from '{}': {}", width, source, e);
        }
        if let Err(e) = capture.set(videoio::CAP_PROP_FRAME_HEIGHT, height as f64) {
            debug!("Could not request frame height {} from '{}': {}", height, source, e);
        }
        info!("📷 Stream '{}' opened at {}x{} in {:?}", source, width, height, open_start.elapsed());

        Ok(OpenCvSource {
            source: source.to_string(),
            capture,
            width,
            height,
            next_seq: 0,
        })
    }

    fn normalise(&self, raw: &opencv_core::Mat) -> Result<Vec<u8>, AppError> {
        let read_err = |e: opencv::Error| AppError::FrameRead(e.to_string());
        if raw.channels() != 3 {
            return Err(AppError::FrameRead(format!(
                "expected 3-channel BGR frame, got {} channel(s)",
                raw.channels()
            )));
        }
        let target = opencv_core::Size::new(self.width as i32, self.height as i32);
        if raw.size().map_err(read_err)? == target {
            if raw.is_continuous() {
                return Ok(raw.data_bytes().map_err(read_err)?.to_vec());
            }
            let packed = raw.try_clone().map_err(read_err)?;
            return Ok(packed.data_bytes().map_err(read_err)?.to_vec());
        }
        let mut resized = opencv_core::Mat::default();
        imgproc::resize(raw, &mut resized, target, 0.0, 0.0, imgproc::INTER_LINEAR).map_err(read_err)?;
        Ok(resized.data_bytes().map_err(read_err)?.to_vec())
    }
}

impl FrameSource for OpenCvSource {
    fn describe(&self) -> String {
        format!("opencv:{}", self.source)
    }

    fn next_frame(&mut self) -> Result<Frame, AppError> {
        let mut raw = opencv_core::Mat::default();
        let got_frame = self
            .capture
            .read(&mut raw)
            .map_err(|e| AppError::FrameRead(format!("read failed on '{}': {}", self.source, e)))?;
        if !got_frame || raw.empty() {
            return Err(AppError::FrameRead(format!("no frame from '{}'", self.source)));
        }
        let data = self.normalise(&raw)?;
        let frame = Frame::new(self.next_seq, self.width, self.height, data);
        self.next_seq += 1;
        Ok(frame)
    }

    fn frame_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

/// Maps the configured codec name onto a FOURCC the way OpenCV expects it for the container.
fn fourcc_for(codec: &str, container: &str) -> &'static str {
    match codec.to_lowercase().as_str() {
        "mjpg" | "mjpeg" => "MJPG",
        "xvid" => "XVID",
        "mp4v" => "mp4v",
        "h264" if container.eq_ignore_ascii_case("avi") => "H264",
        "h264" => "avc1",
        other => {
            warn!("⚠️ Unsupported video_codec '{}' for container '{}'. Defaulting to MJPG.", other, container);
            "MJPG"
        }
    }
}

#[derive(Default)]
pub struct OpenCvEncoder {
    writer: Option<videoio::VideoWriter>,
    path: Option<PathBuf>,
    size: (u32, u32),
}

impl OpenCvEncoder {
    pub fn new() -> Self {
        Self::default()
    }
}

impl VideoEncoder for OpenCvEncoder {
    fn open(&mut self, path: &Path, spec: &EncoderSpec) -> Result<(), AppError> {
        if self.writer.is_some() {
            self.close()?;
        }
        let open_err = |details: String| AppError::EncoderOpen {
            path: path.display().to_string(),
            details,
        };
        let path_str = path.to_str().ok_or_else(|| open_err("path is not valid UTF-8".into()))?;
        let container = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        let code: Vec<char> = fourcc_for(&spec.codec, container).chars().collect();
        let fourcc = videoio::VideoWriter::fourcc(code[0], code[1], code[2], code[3])
            .map_err(|e| open_err(e.to_string()))?;

        let writer = videoio::VideoWriter::new(
            path_str,
            fourcc,
            spec.frame_rate,
            opencv_core::Size::new(spec.width as i32, spec.height as i32),
            true,
        )
        .map_err(|e| open_err(e.to_string()))?;
        if !writer.is_opened().map_err(|e| open_err(e.to_string()))? {
            if path.exists() {
                if let Err(del_err) = std::fs::remove_file(path) {
                    warn!("Failed to delete partial file {} after VideoWriter open error: {}", path.display(), del_err);
                }
            }
            return Err(open_err("VideoWriter refused to open".into()));
        }

        debug!("VideoWriter opened: {} ({}x{} @ {} fps)", path.display(), spec.width, spec.height, spec.frame_rate);
        self.writer = Some(writer);
        self.path = Some(path.to_path_buf());
        self.size = (spec.width, spec.height);
        Ok(())
    }

    fn write(&mut self, frame: &Frame) -> Result<(), AppError> {
        let Some(writer) = self.writer.as_mut() else {
            return Err(AppError::Encoder("write called with no open file".into()));
        };
        if frame.size() != self.size {
            return Err(AppError::Encoder(format!(
                "frame #{} is {}x{}, encoder expects {}x{}",
                frame.seq, frame.width, frame.height, self.size.0, self.size.1
            )));
        }
        let mut mat = opencv_core::Mat::new_rows_cols_with_default(
            frame.height as i32,
            frame.width as i32,
            opencv_core::CV_8UC3,
            opencv_core::Scalar::all(0.0),
        )?;
        let bytes = mat.data_bytes_mut()?;
        if bytes.len() != frame.data.len() {
            return Err(AppError::Encoder(format!(
                "frame #{} carries {} bytes, expected {}",
                frame.seq,
                frame.data.len(),
                bytes.len()
            )));
        }
        bytes.copy_from_slice(&frame.data);
        writer.write(&mat)?;
        Ok(())
    }

    fn close(&mut self) -> Result<(), AppError> {
        if let Some(mut writer) = self.writer.take() {
            writer.release()?;
            if let Some(path) = self.path.take() {
                debug!("VideoWriter released: {}", path.display());
            }
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.writer.is_some()
    }
}

impl Drop for OpenCvEncoder {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!("⚠️ Failed to release VideoWriter on drop: {}", e);
        }
    }
}
