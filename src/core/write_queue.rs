use crate::core::capture_source::Frame;
use crossbeam_channel::{bounded, Receiver, SendTimeoutError, Sender};
use log::{debug, warn};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// What travels through the write queue. `Flush` and `Shutdown` are reserved sentinels.
#[derive(Debug)]
pub enum QueueItem {
    /// A frame bound to the session it was captured for. The writer only hands it to an
    /// encoder opened for that same session.
    Frame { frame: Frame, session: u64 },
    /// Acknowledged by the writer once every item queued before it has been written.
    Flush(Sender<()>),
    Shutdown,
}

/// Producer side of the bounded FIFO between the capture loop and the writer task.
#[derive(Clone)]
pub struct WriteQueue {
    tx: Sender<QueueItem>,
    capacity: usize,
    dropped: Arc<AtomicU64>,
}

pub fn write_queue(capacity: usize) -> (WriteQueue, Receiver<QueueItem>) {
    let (tx, rx) = bounded(capacity);
    let queue = WriteQueue {
        tx,
        capacity,
        dropped: Arc::new(AtomicU64::new(0)),
    };
    (queue, rx)
}

impl WriteQueue {
    /// Tries to enqueue for at most `timeout`. A frame that does not fit in time is dropped
    /// and counted; it is never retried.
    pub fn enqueue(&self, frame: Frame, session: u64, timeout: Duration) -> bool {
        match self.tx.send_timeout(QueueItem::Frame { frame, session }, timeout) {
            Ok(()) => true,
            Err(SendTimeoutError::Timeout(QueueItem::Frame { frame, .. })) => {
                let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                debug!("Write queue full, dropped frame #{} (total dropped: {})", frame.seq, dropped);
                false
            }
            Err(SendTimeoutError::Timeout(_)) => false,
            Err(SendTimeoutError::Disconnected(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                warn!("Write queue disconnected, writer task is gone. Frame dropped.");
                false
            }
        }
    }

    /// Waits until the writer has consumed everything queued so far.
    pub fn flush(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let (ack_tx, ack_rx) = bounded(1);
        if self.tx.send_deadline(QueueItem::Flush(ack_tx), deadline).is_err() {
            return false;
        }
        ack_rx.recv_deadline(deadline).is_ok()
    }

    /// Delivers the shutdown sentinel. A writer that already exited on its own counts as
    /// stopped; only a sentinel stuck behind a full queue reports `false`.
    pub fn send_shutdown(&self, timeout: Duration) -> bool {
        match self.tx.send_timeout(QueueItem::Shutdown, timeout) {
            Ok(()) => true,
            Err(SendTimeoutError::Disconnected(_)) => {
                debug!("Writer already stopped; no shutdown sentinel needed.");
                true
            }
            Err(SendTimeoutError::Timeout(_)) => false,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}
