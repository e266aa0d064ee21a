//! Temporal averaging of consecutive frames

use crate::error::{Result, ScanError};
use crate::models::Frame;
use rayon::prelude::*;
use tracing::trace;

/// Averages a fixed window of frames into one lower-noise frame
#[derive(Debug, Clone, Copy)]
pub struct FrameStacker {
    size: usize,
}

impl FrameStacker {
    /// Stacker for windows of `size` frames
    pub fn new(size: usize) -> Self {
        Self { size }
    }

    /// Frames per window
    pub fn size(&self) -> usize {
        self.size
    }

    /// Per-sample truncated mean of exactly `size` frames of equal geometry
    ///
    /// The result carries the timestamp of the newest input.
    pub fn stack(&self, frames: &[Frame]) -> Result<Frame> {
        if frames.len() != self.size || frames.is_empty() {
            return Err(ScanError::StackSize {
                expected: self.size,
                found: frames.len(),
            });
        }

        let first = &frames[0];
        let expected = first.geometry();
        for (index, frame) in frames.iter().enumerate().skip(1) {
            if frame.geometry() != expected {
                return Err(ScanError::DimensionMismatch {
                    index,
                    expected,
                    found: frame.geometry(),
                });
            }
        }

        let row_bytes = first.width() * first.channels();
        let count = frames.len() as u32;
        let mut out = vec![0u8; first.data().len()];
        if row_bytes > 0 {
            out.par_chunks_mut(row_bytes)
                .enumerate()
                .for_each(|(row, dst)| {
                    let offset = row * row_bytes;
                    for (i, sample) in dst.iter_mut().enumerate() {
                        let sum: u32 = frames.iter().map(|f| f.data()[offset + i] as u32).sum();
                        *sample = (sum / count) as u8;
                    }
                });
        }

        let newest = frames
            .iter()
            .map(Frame::captured_at)
            .max()
            .unwrap_or_else(|| first.captured_at());
        trace!(frames = frames.len(), "stacked window");
        Ok(Frame::new(first.width(), first.height(), first.format(), out)?.with_timestamp(newest))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PixelFormat;
    use std::time::{Duration, Instant};

    #[test]
    fn test_identical_frames_stack_to_themselves() {
        let data: Vec<u8> = (0..48).map(|v| (v * 5) as u8).collect();
        let frame = Frame::new(4, 4, PixelFormat::Rgb8, data.clone()).unwrap();
        let frames = vec![frame; 5];
        let stacked = FrameStacker::new(5).stack(&frames).unwrap();
        assert_eq!(stacked.data(), &data[..]);
    }

    #[test]
    fn test_mean_truncates() {
        let values = [10u8, 11, 11, 12, 13]; // mean 11.4
        let frames: Vec<Frame> = values
            .iter()
            .map(|&v| Frame::filled(3, 2, PixelFormat::Gray8, v))
            .collect();
        let stacked = FrameStacker::new(5).stack(&frames).unwrap();
        assert!(stacked.data().iter().all(|&v| v == 11));
    }

    #[test]
    fn test_full_range_does_not_overflow() {
        let frames = vec![Frame::filled(2, 2, PixelFormat::Gray8, 255); 5];
        let stacked = FrameStacker::new(5).stack(&frames).unwrap();
        assert!(stacked.data().iter().all(|&v| v == 255));
    }

    #[test]
    fn test_newest_timestamp() {
        let base = Instant::now();
        let frames: Vec<Frame> = (0..3)
            .map(|i| {
                Frame::filled(2, 2, PixelFormat::Gray8, 0)
                    .with_timestamp(base + Duration::from_millis(i * 10))
            })
            .collect();
        let stacked = FrameStacker::new(3).stack(&frames).unwrap();
        assert_eq!(stacked.captured_at(), base + Duration::from_millis(20));
    }

    #[test]
    fn test_wrong_count() {
        let frames = vec![Frame::filled(2, 2, PixelFormat::Gray8, 0); 4];
        let err = FrameStacker::new(5).stack(&frames).unwrap_err();
        assert!(matches!(
            err,
            ScanError::StackSize {
                expected: 5,
                found: 4
            }
        ));
    }

    #[test]
    fn test_dimension_mismatch() {
        let mut frames = vec![Frame::filled(4, 4, PixelFormat::Gray8, 0); 4];
        frames.push(Frame::filled(4, 3, PixelFormat::Gray8, 0));
        let err = FrameStacker::new(5).stack(&frames).unwrap_err();
        assert!(matches!(err, ScanError::DimensionMismatch { index: 4, .. }));

        let mut frames = vec![Frame::filled(4, 4, PixelFormat::Gray8, 0); 2];
        frames[1] = Frame::filled(4, 4, PixelFormat::Rgb8, 0).to_gray();
        frames.push(Frame::filled(4, 4, PixelFormat::Bgr8, 0));
        let err = FrameStacker::new(3).stack(&frames).unwrap_err();
        assert!(matches!(err, ScanError::DimensionMismatch { index: 2, .. }));
    }
}
