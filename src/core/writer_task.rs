use crate::core::capture_source::{EncoderSpec, Frame, VideoEncoder};
use crate::core::write_queue::QueueItem;
use crate::errors::AppError;
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError};
use log::{debug, error, info, warn};
use parking_lot::Mutex;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// The encoder together with the session its current file belongs to.
pub struct EncoderSlot {
    encoder: Box<dyn VideoEncoder>,
    session: Option<u64>,
}

impl EncoderSlot {
    pub fn open_for(&mut self, session: u64, path: &Path, spec: &EncoderSpec) -> Result<(), AppError> {
        self.session = None;
        self.encoder.open(path, spec)?;
        self.session = Some(session);
        Ok(())
    }

    pub fn close(&mut self) -> Result<(), AppError> {
        self.session = None;
        self.encoder.close()
    }

    pub fn is_open(&self) -> bool {
        self.encoder.is_open()
    }

    /// Writes the frame only if the open file belongs to `session`. Returns whether it was written.
    fn write_for(&mut self, session: u64, frame: &Frame) -> Result<bool, AppError> {
        if self.session != Some(session) || !self.encoder.is_open() {
            return Ok(false);
        }
        self.encoder.write(frame)?;
        Ok(true)
    }
}

/// Encoder slot shared by the writer (writes) and the session logic (open/close).
/// The mutex makes open/close and an in-flight write mutually exclusive.
pub type SharedEncoder = Arc<Mutex<EncoderSlot>>;

pub fn shared_encoder(encoder: Box<dyn VideoEncoder>) -> SharedEncoder {
    Arc::new(Mutex::new(EncoderSlot { encoder, session: None }))
}

pub struct WriterHandle {
    join: JoinHandle<()>,
    done_rx: Receiver<()>,
    frames_written: Arc<AtomicU64>,
}

impl WriterHandle {
    pub fn frames_written(&self) -> u64 {
        self.frames_written.load(Ordering::Relaxed)
    }

    /// Joins the writer thread if it finishes within `timeout`. Otherwise the thread is left
    /// detached and `false` is returned.
    pub fn join_with_timeout(self, timeout: Duration) -> bool {
        match self.done_rx.recv_timeout(timeout) {
            Err(RecvTimeoutError::Timeout) => {
                warn!("⏳ Writer task did not finish within {:?}; leaving it detached.", timeout);
                false
            }
            _ => {
                if self.join.join().is_err() {
                    error!("💀 Writer task panicked.");
                    return false;
                }
                true
            }
        }
    }
}

/// Starts the single consumer that drains the write queue into the currently open encoder.
pub fn spawn_writer(
    rx: Receiver<QueueItem>,
    encoder: SharedEncoder,
    running: Arc<AtomicBool>,
    poll_interval: Duration,
) -> Result<WriterHandle, AppError> {
    let frames_written = Arc::new(AtomicU64::new(0));
    let counter = Arc::clone(&frames_written);
    // Dropped when the thread exits, which is what `join_with_timeout` waits on.
    let (done_tx, done_rx) = bounded::<()>(1);

    let join = thread::Builder::new()
        .name("frame-writer".to_string())
        .spawn(move || {
            let _done = done_tx;
            run_writer(rx, encoder, running, poll_interval, counter);
        })
        .map_err(|e| AppError::Io(format!("Failed to spawn writer thread: {}", e)))?;

    Ok(WriterHandle {
        join,
        done_rx,
        frames_written,
    })
}

fn run_writer(
    rx: Receiver<QueueItem>,
    encoder: SharedEncoder,
    running: Arc<AtomicBool>,
    poll_interval: Duration,
    frames_written: Arc<AtomicU64>,
) {
    info!("✍️ Writer task started.");
    let started = Instant::now();
    let mut discarded: u64 = 0;
    loop {
        match rx.recv_timeout(poll_interval) {
            Ok(QueueItem::Frame { frame, session }) => match encoder.lock().write_for(session, &frame) {
                Ok(true) => {
                    frames_written.fetch_add(1, Ordering::Relaxed);
                }
                Ok(false) => discarded += 1,
                Err(e) => error!("❌ Writer error on frame #{}: {}", frame.seq, e),
            },
            Ok(QueueItem::Flush(ack)) => {
                debug!("Writer reached flush marker.");
                let _ = ack.send(());
            }
            Ok(QueueItem::Shutdown) => {
                debug!("Writer received shutdown sentinel.");
                break;
            }
            Err(RecvTimeoutError::Timeout) => {
                if !running.load(Ordering::SeqCst) {
                    debug!("Writer idle and pipeline stopped.");
                    break;
                }
            }
            Err(RecvTimeoutError::Disconnected) => {
                debug!("Write queue closed.");
                break;
            }
        }
    }
    if discarded > 0 {
        debug!("Writer discarded {} frame(s) with no matching open file.", discarded);
    }
    info!(
        "🏁 Writer task finished after {:?}: {} frame(s) written.",
        started.elapsed(),
        frames_written.load(Ordering::Relaxed)
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::write_queue::write_queue;

    #[derive(Default)]
    struct RecordingEncoder {
        open: bool,
        written: Arc<Mutex<Vec<u64>>>,
    }

    impl VideoEncoder for RecordingEncoder {
        fn open(&mut self, _path: &Path, _spec: &EncoderSpec) -> Result<(), AppError> {
            self.open = true;
            Ok(())
        }
        fn write(&mut self, frame: &Frame) -> Result<(), AppError> {
            self.written.lock().push(frame.seq);
            Ok(())
        }
        fn close(&mut self) -> Result<(), AppError> {
            self.open = false;
            Ok(())
        }
        fn is_open(&self) -> bool {
            self.open
        }
    }

    fn frame(seq: u64) -> Frame {
        Frame::new(seq, 1, 1, vec![0; 3])
    }

    fn spec() -> EncoderSpec {
        EncoderSpec { frame_rate: 10.0, width: 1, height: 1, codec: "mp4v".into() }
    }

    #[test]
    fn writes_in_order_and_stops_on_sentinel() {
        let written = Arc::new(Mutex::new(Vec::new()));
        let encoder = RecordingEncoder { open: false, written: Arc::clone(&written) };
        let shared = shared_encoder(Box::new(encoder));
        shared.lock().open_for(1, Path::new("a.mp4"), &spec()).unwrap();
        let running = Arc::new(AtomicBool::new(true));
        let (queue, rx) = write_queue(16);
        let handle = spawn_writer(rx, shared, running, Duration::from_millis(20)).unwrap();

        for seq in 1..=10 {
            assert!(queue.enqueue(frame(seq), 1, Duration::from_millis(100)));
        }
        assert!(queue.flush(Duration::from_secs(2)));
        assert_eq!(*written.lock(), (1..=10).collect::<Vec<_>>());
        assert_eq!(handle.frames_written(), 10);

        assert!(queue.send_shutdown(Duration::from_secs(1)));
        assert!(handle.join_with_timeout(Duration::from_secs(2)));
    }

    #[test]
    fn frames_without_open_encoder_are_discarded() {
        let written = Arc::new(Mutex::new(Vec::new()));
        let encoder = RecordingEncoder { open: false, written: Arc::clone(&written) };
        let shared = shared_encoder(Box::new(encoder));
        let running = Arc::new(AtomicBool::new(true));
        let (queue, rx) = write_queue(4);
        let handle = spawn_writer(rx, shared, running, Duration::from_millis(20)).unwrap();

        assert!(queue.enqueue(frame(1), 1, Duration::from_millis(100)));
        assert!(queue.flush(Duration::from_secs(2)));
        assert!(written.lock().is_empty());
        assert_eq!(handle.frames_written(), 0);

        assert!(queue.send_shutdown(Duration::from_secs(1)));
        assert!(handle.join_with_timeout(Duration::from_secs(2)));
    }

    #[test]
    fn frames_of_an_earlier_session_never_reach_a_new_file() {
        let written = Arc::new(Mutex::new(Vec::new()));
        let encoder = RecordingEncoder { open: false, written: Arc::clone(&written) };
        let shared = shared_encoder(Box::new(encoder));
        let running = Arc::new(AtomicBool::new(true));
        let (queue, rx) = write_queue(16);

        // Leftovers of session 1 are still queued when session 2 opens its file.
        for seq in 1..=3 {
            assert!(queue.enqueue(frame(seq), 1, Duration::from_millis(100)));
        }
        shared.lock().open_for(2, Path::new("b.mp4"), &spec()).unwrap();
        assert!(queue.enqueue(frame(4), 2, Duration::from_millis(100)));

        let handle = spawn_writer(rx, Arc::clone(&shared), running, Duration::from_millis(20)).unwrap();
        assert!(queue.flush(Duration::from_secs(2)));
        assert_eq!(*written.lock(), vec![4]);
        assert_eq!(handle.frames_written(), 1);

        shared.lock().close().unwrap();
        assert!(!shared.lock().is_open());
        assert!(queue.send_shutdown(Duration::from_secs(1)));
        assert!(handle.join_with_timeout(Duration::from_secs(2)));
    }

    #[test]
    fn exits_when_running_flag_clears() {
        let shared = shared_encoder(Box::new(RecordingEncoder::default()));
        let running = Arc::new(AtomicBool::new(true));
        let (_queue, rx) = write_queue(4);
        let handle = spawn_writer(rx, shared, Arc::clone(&running), Duration::from_millis(10)).unwrap();

        running.store(false, Ordering::SeqCst);
        assert!(handle.join_with_timeout(Duration::from_secs(2)));
    }
}
