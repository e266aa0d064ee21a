use super::FrameSource;
use crate::error::{Result, ScanError};
use crate::models::Frame;
use std::collections::VecDeque;

/// Replays a fixed list of frames, then ends
#[derive(Debug, Default)]
pub struct MemorySource {
    frames: VecDeque<Frame>,
    total: usize,
}

impl MemorySource {
    /// Replay `frames` in order
    pub fn new(frames: Vec<Frame>) -> Self {
        let total = frames.len();
        Self {
            frames: frames.into(),
            total,
        }
    }

    /// Frames not yet handed out
    pub fn remaining(&self) -> usize {
        self.frames.len()
    }
}

impl FrameSource for MemorySource {
    fn next_frame(&mut self) -> Result<Frame> {
        self.frames.pop_front().ok_or(ScanError::EndOfStream)
    }

    fn close(&mut self) {
        self.frames.clear();
    }

    fn describe(&self) -> String {
        format!("memory ({} frames)", self.total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PixelFormat;

    #[test]
    fn test_replays_then_ends() {
        let mut source = MemorySource::new(vec![Frame::filled(2, 2, PixelFormat::Gray8, 1); 2]);
        assert!(source.next_frame().is_ok());
        assert_eq!(source.remaining(), 1);
        assert!(source.next_frame().is_ok());
        assert!(matches!(source.next_frame(), Err(ScanError::EndOfStream)));
    }
}
