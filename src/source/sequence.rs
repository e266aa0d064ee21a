use super::FrameSource;
use crate::error::{Result, ScanError};
use crate::models::Frame;
use crate::tools::{image_files_in, load_frame};
use image::imageops::{self, FilterType};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Plays a still image or a directory of images as a camera would
///
/// Every image is emitted `repeat` times in a row. The first image fixes the
/// geometry; later images of another size are resized to it.
pub struct ImageSequenceSource {
    origin: PathBuf,
    files: Vec<PathBuf>,
    repeat: u32,
    looping: bool,
    position: usize,
    emitted: u32,
    current: Option<Frame>,
    size: (usize, usize),
}

impl ImageSequenceSource {
    /// Open a file or directory; fails if there is nothing decodable to show
    pub fn open(path: impl AsRef<Path>, repeat: u32, looping: bool) -> Result<Self> {
        let origin = path.as_ref().to_path_buf();
        let unavailable = |reason: String| ScanError::DeviceUnavailable {
            device: origin.display().to_string(),
            reason,
        };

        let files = if origin.is_dir() {
            image_files_in(&origin)
        } else if origin.is_file() {
            vec![origin.clone()]
        } else {
            return Err(unavailable("path does not exist".into()));
        };
        if files.is_empty() {
            return Err(unavailable("no image files found".into()));
        }

        let first = load_frame(&files[0]).map_err(|e| unavailable(e.to_string()))?;
        let size = (first.width(), first.height());
        debug!(files = files.len(), width = size.0, height = size.1, "opened image sequence");

        Ok(Self {
            origin,
            files,
            repeat: repeat.max(1),
            looping,
            position: 0,
            emitted: 0,
            current: Some(first),
            size,
        })
    }

    /// Number of image files in the sequence
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Never true for an opened sequence
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    fn load(&self, index: usize) -> Result<Frame> {
        let frame = load_frame(&self.files[index])
            .map_err(|e| ScanError::Capture(format!("{}: {e}", self.files[index].display())))?;
        if (frame.width(), frame.height()) == self.size {
            return Ok(frame);
        }
        warn!(
            file = %self.files[index].display(),
            width = frame.width(),
            height = frame.height(),
            "resizing image to the sequence geometry"
        );
        let resized = imageops::resize(
            &frame.to_rgb_image(),
            self.size.0 as u32,
            self.size.1 as u32,
            FilterType::Triangle,
        );
        Ok(Frame::from_rgb_image(resized))
    }
}

impl FrameSource for ImageSequenceSource {
    fn next_frame(&mut self) -> Result<Frame> {
        loop {
            if self.position >= self.files.len() {
                if !self.looping {
                    return Err(ScanError::EndOfStream);
                }
                self.position = 0;
            }
            if self.emitted < self.repeat {
                if self.current.is_none() {
                    match self.load(self.position) {
                        Ok(frame) => self.current = Some(frame),
                        Err(err) => {
                            // Skip the unreadable file but report it once
                            self.position += 1;
                            self.emitted = 0;
                            return Err(err);
                        }
                    }
                }
                if let Some(frame) = &self.current {
                    self.emitted += 1;
                    return Ok(frame.clone().with_timestamp(std::time::Instant::now()));
                }
            }
            self.position += 1;
            self.emitted = 0;
            self.current = None;
        }
    }

    fn close(&mut self) {
        self.current = None;
        self.position = self.files.len();
        self.looping = false;
    }

    fn describe(&self) -> String {
        format!("images at {} ({} files)", self.origin.display(), self.files.len())
    }
}
