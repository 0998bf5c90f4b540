use crate::core::capture_source::{Frame, FrameSource};
use crate::errors::AppError;
use std::time::{Duration, Instant};

/// Synthetic BGR source for running the recorder without a camera. Emits a moving gradient
/// paced to the configured frame rate.
pub struct TestPatternSource {
    width: u32,
    height: u32,
    frame_interval: Duration,
    next_seq: u64,
    next_due: Option<Instant>,
}

impl TestPatternSource {
    pub fn new(frame_size: (u32, u32), frame_rate: u32) -> Self {
        TestPatternSource {
            width: frame_size.0,
            height: frame_size.1,
            frame_interval: Duration::from_secs(1) / frame_rate.max(1),
            next_seq: 0,
            next_due: None,
        }
    }

    fn render(&self, seq: u64) -> Vec<u8> {
        let (w, h) = (self.width as usize, self.height as usize);
        let shift = (seq % 256) as usize;
        let mut data = Vec::with_capacity(w * h * 3);
        for y in 0..h {
            for x in 0..w {
                data.push(((x + shift) % 256) as u8);
                data.push(((y + shift) % 256) as u8);
                data.push(shift as u8);
            }
        }
        data
    }
}

impl FrameSource for TestPatternSource {
    fn describe(&self) -> String {
        format!("test-pattern:{}x{}", self.width, self.height)
    }

    fn next_frame(&mut self) -> Result<Frame, AppError> {
        let now = Instant::now();
        if let Some(due) = self.next_due {
            if due > now {
                std::thread::sleep(due - now);
            }
        }
        self.next_due = Some(self.next_due.unwrap_or(now).max(now) + self.frame_interval);

        let seq = self.next_seq;
        self.next_seq += 1;
        Ok(Frame::new(seq, self.width, self.height, self.render(seq)))
    }

    fn frame_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}
