use super::BoundingBox;
use crate::error::{Result, ScanError};
use crate::utils::grayscale::{bgr_to_grayscale, luma, rgb_to_grayscale};
use image::RgbImage;
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Sample layout of a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PixelFormat {
    /// One luminance byte per pixel
    Gray8,
    /// Three bytes per pixel, red first
    Rgb8,
    /// Three bytes per pixel, blue first (typical camera order)
    Bgr8,
}

impl PixelFormat {
    /// Bytes per pixel
    pub fn channels(&self) -> usize {
        match self {
            PixelFormat::Gray8 => 1,
            PixelFormat::Rgb8 | PixelFormat::Bgr8 => 3,
        }
    }
}

/// Raster image with capture time
///
/// Frames are immutable once built and are moved from stage to stage.
#[derive(Debug, Clone)]
pub struct Frame {
    width: usize,
    height: usize,
    format: PixelFormat,
    data: Vec<u8>,
    captured_at: Instant,
}

impl Frame {
    /// Wrap a row-major pixel buffer, stamped with the current time
    pub fn new(width: usize, height: usize, format: PixelFormat, data: Vec<u8>) -> Result<Self> {
        let expected = width * height * format.channels();
        if data.len() != expected {
            return Err(ScanError::InvalidFrame {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            format,
            data,
            captured_at: Instant::now(),
        })
    }

    /// Frame of a single repeated sample value
    pub fn filled(width: usize, height: usize, format: PixelFormat, value: u8) -> Self {
        Self {
            width,
            height,
            format,
            data: vec![value; width * height * format.channels()],
            captured_at: Instant::now(),
        }
    }

    /// Replace the capture timestamp
    pub fn with_timestamp(mut self, captured_at: Instant) -> Self {
        self.captured_at = captured_at;
        self
    }

    /// Frame width in pixels
    pub fn width(&self) -> usize {
        self.width
    }

    /// Frame height in pixels
    pub fn height(&self) -> usize {
        self.height
    }

    /// Pixel layout
    pub fn format(&self) -> PixelFormat {
        self.format
    }

    /// Bytes per pixel
    pub fn channels(&self) -> usize {
        self.format.channels()
    }

    /// (width, height, format) triple, used for geometry checks
    pub fn geometry(&self) -> (usize, usize, PixelFormat) {
        (self.width, self.height, self.format)
    }

    /// When the frame was captured
    pub fn captured_at(&self) -> Instant {
        self.captured_at
    }

    /// Raw samples
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Take the raw samples
    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    /// True when the frame holds no pixels
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Luminance of the pixel at (x, y)
    pub fn luma(&self, x: usize, y: usize) -> u8 {
        let idx = (y * self.width + x) * self.channels();
        match self.format {
            PixelFormat::Gray8 => self.data[idx],
            PixelFormat::Rgb8 => luma(self.data[idx], self.data[idx + 1], self.data[idx + 2]),
            PixelFormat::Bgr8 => luma(self.data[idx + 2], self.data[idx + 1], self.data[idx]),
        }
    }

    /// Grayscale copy (cheap clone when already gray)
    pub fn to_gray(&self) -> Frame {
        let data = match self.format {
            PixelFormat::Gray8 => self.data.clone(),
            PixelFormat::Rgb8 => rgb_to_grayscale(&self.data, self.width, self.height),
            PixelFormat::Bgr8 => bgr_to_grayscale(&self.data, self.width, self.height),
        };
        Frame {
            width: self.width,
            height: self.height,
            format: PixelFormat::Gray8,
            data,
            captured_at: self.captured_at,
        }
    }

    /// Copy of the pixels inside `bbox`, clamped to the frame
    pub fn crop(&self, bbox: &BoundingBox) -> Frame {
        let clamped = bbox.clamp_to(self.width, self.height);
        let channels = self.channels();
        let row_bytes = clamped.width * channels;
        let mut data = Vec::with_capacity(row_bytes * clamped.height);
        for y in clamped.y..clamped.y + clamped.height {
            let start = (y * self.width + clamped.x) * channels;
            data.extend_from_slice(&self.data[start..start + row_bytes]);
        }
        Frame {
            width: clamped.width,
            height: clamped.height,
            format: self.format,
            data,
            captured_at: self.captured_at,
        }
    }

    /// Build from an `image` RGB buffer
    pub fn from_rgb_image(image: RgbImage) -> Self {
        let (width, height) = image.dimensions();
        Self {
            width: width as usize,
            height: height as usize,
            format: PixelFormat::Rgb8,
            data: image.into_raw(),
            captured_at: Instant::now(),
        }
    }

    /// RGB view for drawing and encoding
    pub fn to_rgb_image(&self) -> RgbImage {
        let data = match self.format {
            PixelFormat::Rgb8 => self.data.clone(),
            PixelFormat::Bgr8 => self
                .data
                .chunks_exact(3)
                .flat_map(|px| [px[2], px[1], px[0]])
                .collect(),
            PixelFormat::Gray8 => self.data.iter().flat_map(|&v| [v, v, v]).collect(),
        };
        // Length is width * height * 3 by construction
        RgbImage::from_raw(self.width as u32, self.height as u32, data).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_rejects_short_buffer() {
        let err = Frame::new(4, 4, PixelFormat::Rgb8, vec![0; 40]).unwrap_err();
        assert!(matches!(
            err,
            ScanError::InvalidFrame {
                expected: 48,
                actual: 40
            }
        ));
    }

    #[test]
    fn test_crop_clamps_to_frame() {
        let data: Vec<u8> = (0..100).collect();
        let frame = Frame::new(10, 10, PixelFormat::Gray8, data).unwrap();
        let crop = frame.crop(&BoundingBox::new(8, 8, 5, 5));
        assert_eq!((crop.width(), crop.height()), (2, 2));
        assert_eq!(crop.data(), &[88, 89, 98, 99]);
    }

    #[test]
    fn test_bgr_round_trips_to_rgb_image() {
        let frame = Frame::new(1, 1, PixelFormat::Bgr8, vec![10, 20, 30]).unwrap();
        let rgb = frame.to_rgb_image();
        assert_eq!(rgb.get_pixel(0, 0).0, [30, 20, 10]);
    }

    #[test]
    fn test_to_gray_keeps_geometry() {
        let frame = Frame::filled(6, 3, PixelFormat::Rgb8, 200);
        let gray = frame.to_gray();
        assert_eq!(gray.format(), PixelFormat::Gray8);
        assert_eq!(gray.data().len(), 18);
        assert!(gray.data().iter().all(|&v| (198..=200).contains(&v)));
    }
}
