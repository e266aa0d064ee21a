//! Bounded frame buffer between the capture thread and the processing loop

use crate::models::Frame;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Result of waiting for a full window
#[derive(Debug)]
pub enum DrainOutcome {
    /// Exactly the requested number of frames, oldest first
    Frames(Vec<Frame>),
    /// Not enough frames arrived before the timeout
    Timeout,
    /// The producer finished and fewer frames than requested remain
    Closed,
}

struct State {
    frames: VecDeque<Frame>,
    closed: bool,
}

/// Bounded FIFO that evicts its oldest frame instead of blocking the producer
pub struct FrameQueue {
    state: Mutex<State>,
    ready: Condvar,
    capacity: usize,
    evicted: AtomicU64,
}

impl FrameQueue {
    /// Queue holding at most `capacity` frames (at least one)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            state: Mutex::new(State {
                frames: VecDeque::with_capacity(capacity),
                closed: false,
            }),
            ready: Condvar::new(),
            capacity,
            evicted: AtomicU64::new(0),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        // A panicking holder cannot leave the deque half-updated
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append a frame, returning the oldest one if the queue was full
    pub fn push(&self, frame: Frame) -> Option<Frame> {
        let mut state = self.lock();
        let evicted = if state.frames.len() >= self.capacity {
            self.evicted.fetch_add(1, Ordering::Relaxed);
            state.frames.pop_front()
        } else {
            None
        };
        state.frames.push_back(frame);
        drop(state);
        self.ready.notify_one();
        evicted
    }

    /// Remove the `n` oldest frames once at least `n` are queued
    ///
    /// Waits at most `timeout`. A closed queue still hands out a full window
    /// if one is buffered.
    pub fn drain_exact(&self, n: usize, timeout: Duration) -> DrainOutcome {
        let deadline = Instant::now() + timeout;
        let mut state = self.lock();
        loop {
            if state.frames.len() >= n {
                return DrainOutcome::Frames(state.frames.drain(..n).collect());
            }
            if state.closed {
                return DrainOutcome::Closed;
            }
            let now = Instant::now();
            if now >= deadline {
                return DrainOutcome::Timeout;
            }
            state = self
                .ready
                .wait_timeout(state, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }

    /// Mark the producer side finished and wake any waiting consumer
    pub fn close(&self) {
        self.lock().closed = true;
        self.ready.notify_all();
    }

    /// True once the producer has finished
    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Frames currently buffered
    pub fn len(&self) -> usize {
        self.lock().frames.len()
    }

    /// True when no frame is buffered
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Frames held before the oldest is evicted
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Frames dropped to make room since creation
    pub fn evicted(&self) -> u64 {
        self.evicted.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PixelFormat;
    use std::sync::Arc;
    use std::thread;

    fn frame(tag: u8) -> Frame {
        Frame::filled(1, 1, PixelFormat::Gray8, tag)
    }

    fn tags(frames: &[Frame]) -> Vec<u8> {
        frames.iter().map(|f| f.data()[0]).collect()
    }

    #[test]
    fn test_push_evicts_oldest() {
        let queue = FrameQueue::new(3);
        for tag in 0..3 {
            assert!(queue.push(frame(tag)).is_none());
        }
        let evicted = queue.push(frame(3)).unwrap();
        assert_eq!(evicted.data()[0], 0);
        assert_eq!(queue.len(), 3);
        assert_eq!(queue.evicted(), 1);

        match queue.drain_exact(3, Duration::ZERO) {
            DrainOutcome::Frames(frames) => assert_eq!(tags(&frames), vec![1, 2, 3]),
            other => panic!("unexpected {other:?}"),
        }
        assert!(queue.is_empty());
    }

    #[test]
    fn test_never_exceeds_capacity() {
        let queue = FrameQueue::new(5);
        for tag in 0..50 {
            queue.push(frame(tag));
            assert!(queue.len() <= 5);
        }
        assert_eq!(queue.evicted(), 45);
    }

    #[test]
    fn test_drain_times_out_when_short() {
        let queue = FrameQueue::new(5);
        queue.push(frame(1));
        assert!(matches!(
            queue.drain_exact(5, Duration::from_millis(5)),
            DrainOutcome::Timeout
        ));
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_closed_queue_hands_out_buffered_window() {
        let queue = FrameQueue::new(2);
        queue.push(frame(1));
        queue.push(frame(2));
        queue.close();
        assert!(matches!(
            queue.drain_exact(2, Duration::ZERO),
            DrainOutcome::Frames(_)
        ));
        assert!(matches!(
            queue.drain_exact(2, Duration::ZERO),
            DrainOutcome::Closed
        ));
    }

    #[test]
    fn test_close_wakes_waiting_consumer() {
        let queue = Arc::new(FrameQueue::new(4));
        let consumer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || queue.drain_exact(4, Duration::from_secs(10)))
        };
        thread::sleep(Duration::from_millis(20));
        queue.close();
        assert!(matches!(consumer.join().unwrap(), DrainOutcome::Closed));
    }
}
