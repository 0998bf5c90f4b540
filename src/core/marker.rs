use crate::common::file_utils::sanitize_marker;
use parking_lot::Mutex;
use std::sync::Arc;

/// Single-slot, last-write-wins mailbox between the marker source and the capture loop.
/// Reading the slot clears it, so a marker is consumed at most once.
#[derive(Clone, Default)]
pub struct MarkerSlot {
    inner: Arc<Mutex<Option<String>>>,
}

impl MarkerSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a sanitized marker, replacing any marker not yet consumed.
    /// Returns `false` if the value was empty after stripping line endings.
    pub fn submit(&self, raw: &str) -> bool {
        match sanitize_marker(raw) {
            Some(marker) => {
                let replaced = self.inner.lock().replace(marker);
                if let Some(lost) = replaced {
                    log::debug!("Marker '{}' replaced before it was consumed.", lost);
                }
                true
            }
            None => false,
        }
    }

    pub fn take(&self) -> Option<String> {
        self.inner.lock().take()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn take_clears_the_slot() {
        let slot = MarkerSlot::new();
        assert!(slot.submit("A1\r\n"));
        assert_eq!(slot.take().as_deref(), Some("A1"));
        assert_eq!(slot.take(), None);
    }

    #[test]
    fn last_write_wins() {
        let slot = MarkerSlot::new();
        slot.submit("first");
        slot.submit("second");
        assert_eq!(slot.take().as_deref(), Some("second"));
        assert!(slot.is_empty());
    }

    #[test]
    fn blank_markers_are_rejected() {
        let slot = MarkerSlot::new();
        assert!(!slot.submit("\r\n"));
        assert!(slot.is_empty());
    }

    #[test]
    fn clones_share_the_slot() {
        let slot = MarkerSlot::new();
        let producer = slot.clone();
        std::thread::spawn(move || producer.submit("X9")).join().unwrap();
        assert_eq!(slot.take().as_deref(), Some("X9"));
    }
}
