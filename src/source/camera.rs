//! Live capture through Video4Linux2

use super::FrameSource;
use crate::error::{Result, ScanError};
use crate::models::{Frame, PixelFormat};
use tracing::{info, warn};
use v4l::buffer::Type;
use v4l::io::mmap::Stream as MmapStream;
use v4l::io::traits::CaptureStream;
use v4l::video::Capture;
use v4l::{Device, FourCC};

const ENODEV: i32 = 19;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Encoding {
    Mjpeg,
    Yuyv,
    Rgb,
}

impl Encoding {
    fn from_fourcc(fourcc: FourCC) -> Option<Self> {
        match &fourcc.repr {
            b"MJPG" => Some(Encoding::Mjpeg),
            b"YUYV" => Some(Encoding::Yuyv),
            b"RGB3" => Some(Encoding::Rgb),
            _ => None,
        }
    }
}

/// V4L2 camera producing RGB frames
pub struct V4lSource {
    path: String,
    stream: Option<MmapStream<'static>>,
    _device: Device,
    width: usize,
    height: usize,
    encoding: Encoding,
}

fn device_path(device: &str) -> String {
    match device.parse::<u32>() {
        Ok(index) => format!("/dev/video{index}"),
        Err(_) => device.to_string(),
    }
}

impl V4lSource {
    /// Open `device` (index or path) and request `width x height` MJPG
    pub fn open(device: &str, width: u32, height: u32) -> Result<Self> {
        let path = device_path(device);
        let unavailable = |reason: String| ScanError::DeviceUnavailable {
            device: path.clone(),
            reason,
        };

        let dev = Device::with_path(&path).map_err(|e| unavailable(e.to_string()))?;
        let mut format = dev.format().map_err(|e| unavailable(e.to_string()))?;
        format.width = width;
        format.height = height;
        format.fourcc = FourCC::new(b"MJPG");
        let format = match dev.set_format(&format) {
            Ok(applied) => applied,
            Err(err) => {
                warn!(error = %err, "could not set capture format, using device default");
                dev.format().map_err(|e| unavailable(e.to_string()))?
            }
        };
        let encoding = Encoding::from_fourcc(format.fourcc)
            .ok_or_else(|| unavailable(format!("unsupported pixel format {}", format.fourcc)))?;
        if (format.width, format.height) != (width, height) {
            warn!(
                requested_width = width,
                requested_height = height,
                width = format.width,
                height = format.height,
                "camera chose a different resolution"
            );
        }

        let stream = MmapStream::with_buffers(&dev, Type::VideoCapture, 4)
            .map_err(|e| unavailable(e.to_string()))?;
        info!(device = %path, width = format.width, height = format.height, fourcc = %format.fourcc, "camera opened");

        Ok(Self {
            path,
            stream: Some(stream),
            _device: dev,
            width: format.width as usize,
            height: format.height as usize,
            encoding,
        })
    }

    fn convert(&self, buf: &[u8]) -> Result<Frame> {
        match self.encoding {
            Encoding::Mjpeg => {
                let image = image::load_from_memory_with_format(buf, image::ImageFormat::Jpeg)
                    .map_err(|e| ScanError::Capture(format!("corrupt MJPG frame: {e}")))?;
                Ok(Frame::from_rgb_image(image.to_rgb8()))
            }
            Encoding::Yuyv => {
                let needed = self.width * self.height * 2;
                if buf.len() < needed {
                    return Err(ScanError::Capture(format!(
                        "short YUYV frame: {} of {needed} bytes",
                        buf.len()
                    )));
                }
                Frame::new(self.width, self.height, PixelFormat::Rgb8, yuyv_to_rgb(&buf[..needed]))
            }
            Encoding::Rgb => {
                let needed = self.width * self.height * 3;
                if buf.len() < needed {
                    return Err(ScanError::Capture(format!(
                        "short RGB frame: {} of {needed} bytes",
                        buf.len()
                    )));
                }
                Frame::new(self.width, self.height, PixelFormat::Rgb8, buf[..needed].to_vec())
            }
        }
    }
}

fn yuyv_to_rgb(yuyv: &[u8]) -> Vec<u8> {
    let mut rgb = Vec::with_capacity(yuyv.len() / 2 * 3);
    for chunk in yuyv.chunks_exact(4) {
        let (y0, u, y1, v) = (chunk[0] as f32, chunk[1] as f32 - 128.0, chunk[2] as f32, chunk[3] as f32 - 128.0);
        for y in [y0, y1] {
            rgb.push((y + 1.402 * v).clamp(0.0, 255.0) as u8);
            rgb.push((y - 0.344 * u - 0.714 * v).clamp(0.0, 255.0) as u8);
            rgb.push((y + 1.772 * u).clamp(0.0, 255.0) as u8);
        }
    }
    rgb
}

impl FrameSource for V4lSource {
    fn next_frame(&mut self) -> Result<Frame> {
        let stream = self.stream.as_mut().ok_or(ScanError::EndOfStream)?;
        let buf = match stream.next() {
            Ok((buf, meta)) => {
                let used = (meta.bytesused as usize).min(buf.len());
                if used == 0 { buf.to_vec() } else { buf[..used].to_vec() }
            }
            // Camera unplugged
            Err(err) if err.raw_os_error() == Some(ENODEV) => return Err(ScanError::EndOfStream),
            Err(err) => return Err(ScanError::Capture(err.to_string())),
        };
        self.convert(&buf)
    }

    fn close(&mut self) {
        if self.stream.take().is_some() {
            info!(device = %self.path, "camera closed");
        }
    }

    fn describe(&self) -> String {
        format!("camera {} ({}x{})", self.path, self.width, self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_path() {
        assert_eq!(device_path("1"), "/dev/video1");
        assert_eq!(device_path("/dev/video3"), "/dev/video3");
    }

    #[test]
    fn test_yuyv_gray() {
        // Neutral chroma gives gray pixels
        assert_eq!(yuyv_to_rgb(&[100, 128, 200, 128]), vec![100, 100, 100, 200, 200, 200]);
    }
}
