use crate::core::capture_source::Frame;
use log::debug;
use std::collections::VecDeque;

/// Pre-roll buffer: the most recent `capacity` frames, oldest evicted first.
/// Only fed while no session is active.
pub struct PreRollBuffer {
    frames: VecDeque<Frame>,
    capacity: usize,
}

impl PreRollBuffer {
    pub fn new(capacity: usize) -> Self {
        debug!("🌀 Pre-roll buffer sized for {} frames", capacity);
        PreRollBuffer {
            frames: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, frame: Frame) {
        if self.capacity == 0 {
            return;
        }
        if self.frames.len() == self.capacity {
            self.frames.pop_front();
        }
        self.frames.push_back(frame);
    }

    /// Returns every buffered frame oldest-first and empties the buffer.
    pub fn drain_in_order(&mut self) -> Vec<Frame> {
        self.frames.drain(..).collect()
    }

    pub fn clear(&mut self) {
        self.frames.clear();
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn sequence_numbers(&self) -> Vec<u64> {
        self.frames.iter().map(|f| f.seq).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(seq: u64) -> Frame {
        Frame::new(seq, 2, 2, vec![0; 12])
    }

    #[test]
    fn holds_min_of_seen_and_capacity() {
        for capacity in [1usize, 5, 20] {
            let mut buf = PreRollBuffer::new(capacity);
            for seen in 1..=50u64 {
                buf.push(frame(seen));
                let expected = (seen as usize).min(capacity);
                assert_eq!(buf.len(), expected);
                // always the most recent frames
                let first = seen + 1 - expected as u64;
                assert_eq!(buf.sequence_numbers(), (first..=seen).collect::<Vec<_>>());
            }
        }
    }

    #[test]
    fn drain_is_chronological_and_empties() {
        let mut buf = PreRollBuffer::new(20);
        for seq in 1..=30 {
            buf.push(frame(seq));
        }
        let drained: Vec<u64> = buf.drain_in_order().iter().map(|f| f.seq).collect();
        assert_eq!(drained, (11..=30).collect::<Vec<_>>());
        assert!(buf.is_empty());
        assert_eq!(buf.capacity(), 20);
    }

    #[test]
    fn zero_capacity_keeps_nothing() {
        let mut buf = PreRollBuffer::new(0);
        buf.push(frame(1));
        assert!(buf.is_empty());
        assert!(buf.drain_in_order().is_empty());
    }
}
