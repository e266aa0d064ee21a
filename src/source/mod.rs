//! Frame producers
//!
//! A [`FrameSource`] yields frames until it reports
//! [`ScanError::EndOfStream`]. [`open`] picks an implementation from the
//! configured device string.

/// In-memory replay
pub mod memory;
/// Still images and image directories
pub mod sequence;
/// Video4Linux2 capture
#[cfg(feature = "v4l")]
pub mod camera;

pub use memory::MemorySource;
pub use sequence::ImageSequenceSource;

use crate::config::SourceConfig;
use crate::error::{Result, ScanError};
use crate::models::Frame;
use std::path::Path;

/// Anything that produces frames for the pipeline
pub trait FrameSource: Send {
    /// Next frame; `EndOfStream` when exhausted, `Capture` for a transient
    /// failure the caller may retry
    fn next_frame(&mut self) -> Result<Frame>;

    /// Release the underlying device
    fn close(&mut self) {}

    /// Human-readable description for logs
    fn describe(&self) -> String;
}

/// True for `N` or `/dev/videoN` style device names
pub fn is_camera_device(device: &str) -> bool {
    device.parse::<u32>().is_ok() || device.starts_with("/dev/video")
}

/// Open the configured source
///
/// Existing files and directories become an [`ImageSequenceSource`]; camera
/// indices and `/dev/video*` paths open a V4L2 device.
pub fn open(config: &SourceConfig) -> Result<Box<dyn FrameSource>> {
    let device = config.device.as_str();
    let path = Path::new(device);
    if path.exists() && !device.starts_with("/dev/") {
        return Ok(Box::new(ImageSequenceSource::open(
            path,
            config.repeat,
            config.looping,
        )?));
    }
    if is_camera_device(device) {
        return open_camera(config);
    }
    Err(ScanError::DeviceUnavailable {
        device: device.to_string(),
        reason: "no such file, directory or camera".into(),
    })
}

#[cfg(feature = "v4l")]
fn open_camera(config: &SourceConfig) -> Result<Box<dyn FrameSource>> {
    Ok(Box::new(camera::V4lSource::open(
        &config.device,
        config.width,
        config.height,
    )?))
}

#[cfg(not(feature = "v4l"))]
fn open_camera(config: &SourceConfig) -> Result<Box<dyn FrameSource>> {
    Err(ScanError::DeviceUnavailable {
        device: config.device.clone(),
        reason: "camera capture requires the `v4l` feature".into(),
    })
}
