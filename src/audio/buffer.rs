//! Lock-free ring buffer for audio frames
//!
//! A bounded single-producer single-consumer queue between a session pump
//! and the audio hardware callback. Neither side may block: a push into a
//! full buffer drops the offered frame, a pop from an empty buffer returns
//! `None`. Both outcomes are counted, not treated as faults.

use crossbeam::queue::ArrayQueue;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::audio::frame::Frame;

/// Lock-free ring buffer for audio frames
pub struct RingBuffer {
    queue: ArrayQueue<Frame>,
    overflow_count: AtomicUsize,
    underrun_count: AtomicUsize,
}

impl RingBuffer {
    /// Create a new ring buffer with the specified capacity
    pub fn new(capacity: usize) -> Self {
        Self {
            queue: ArrayQueue::new(capacity),
            overflow_count: AtomicUsize::new(0),
            underrun_count: AtomicUsize::new(0),
        }
    }

    /// Push a frame into the buffer
    /// Returns false if the buffer is full (overflow); the frame is dropped
    pub fn push(&self, frame: Frame) -> bool {
        match self.queue.push(frame) {
            Ok(()) => true,
            Err(_) => {
                self.overflow_count.fetch_add(1, Ordering::Relaxed);
                false
            }
        }
    }

    /// Pop a frame from the buffer
    /// Returns None if the buffer is empty (underrun)
    pub fn pop(&self) -> Option<Frame> {
        match self.queue.pop() {
            Some(frame) => Some(frame),
            None => {
                self.underrun_count.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Try to pop without counting an underrun
    pub fn try_pop(&self) -> Option<Frame> {
        self.queue.pop()
    }

    /// Check if the buffer is empty
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Check if the buffer is full
    pub fn is_full(&self) -> bool {
        self.queue.is_full()
    }

    /// Get current buffer length
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Get buffer capacity
    pub fn capacity(&self) -> usize {
        self.queue.capacity()
    }

    /// Get overflow count
    pub fn overflow_count(&self) -> usize {
        self.overflow_count.load(Ordering::Relaxed)
    }

    /// Get underrun count
    pub fn underrun_count(&self) -> usize {
        self.underrun_count.load(Ordering::Relaxed)
    }

    /// Reset statistics
    pub fn reset_stats(&self) {
        self.overflow_count.store(0, Ordering::Relaxed);
        self.underrun_count.store(0, Ordering::Relaxed);
    }
}

/// Thread-safe handle to a ring buffer
pub type SharedRingBuffer = Arc<RingBuffer>;

/// Create a new shared ring buffer
pub fn create_shared_buffer(capacity: usize) -> SharedRingBuffer {
    Arc::new(RingBuffer::new(capacity))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ring_buffer_basic() {
        let buffer = RingBuffer::new(4);

        let mut frame1 = Frame::new(2, 4);
        frame1.channel_mut(0)[0] = 1.0;
        let frame2 = Frame::new(2, 4);

        assert!(buffer.push(frame1));
        assert!(buffer.push(frame2));
        assert_eq!(buffer.len(), 2);

        let popped = buffer.pop().unwrap();
        assert_eq!(popped.channel(0)[0], 1.0);

        let popped = buffer.pop().unwrap();
        assert_eq!(popped.channel(0)[0], 0.0);

        assert!(buffer.is_empty());
    }

    #[test]
    fn test_overflow_drops_newest() {
        let capacity = 2;
        let buffer = RingBuffer::new(capacity);

        for i in 0..=capacity {
            let mut frame = Frame::new(1, 1);
            frame.channel_mut(0)[0] = i as f32;
            let accepted = buffer.push(frame);
            assert_eq!(accepted, i < capacity);
        }

        // Exactly one frame was dropped, and it was the last one offered.
        assert_eq!(buffer.overflow_count(), 1);
        assert_eq!(buffer.pop().unwrap().channel(0)[0], 0.0);
        assert_eq!(buffer.pop().unwrap().channel(0)[0], 1.0);
        assert!(buffer.pop().is_none());
        assert_eq!(buffer.underrun_count(), 1);
    }

    #[test]
    fn test_try_pop_does_not_count_underrun() {
        let buffer = RingBuffer::new(2);
        assert!(buffer.try_pop().is_none());
        assert_eq!(buffer.underrun_count(), 0);
    }
}
