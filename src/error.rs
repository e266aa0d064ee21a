//! Error types for the scanning pipeline
//!
//! Only [`ScanError`] ever leaves the pipeline. Decoder and enhancer errors are
//! absorbed by the stage that produced them (see `DecoderFusion` and
//! `SuperResolver`).

use crate::models::PixelFormat;
use thiserror::Error;

/// Result alias used across the crate
pub type Result<T, E = ScanError> = std::result::Result<T, E>;

/// Pipeline-level errors
#[derive(Debug, Error)]
pub enum ScanError {
    /// The capture device or file could not be opened or configured
    #[error("capture device {device:?} unavailable: {reason}")]
    DeviceUnavailable {
        /// Device index, path or URI as configured
        device: String,
        /// Why opening failed
        reason: String,
    },
    /// The frame source has no more frames
    #[error("frame source reached end of stream")]
    EndOfStream,
    /// A single frame could not be read; the source may recover
    #[error("frame capture failed: {0}")]
    Capture(String),
    /// Frames handed to the stacker do not share geometry
    #[error("frame {index} is {found:?}, expected {expected:?}")]
    DimensionMismatch {
        /// Position of the offending frame in the stack window
        index: usize,
        /// (width, height, format) of the first frame
        expected: (usize, usize, PixelFormat),
        /// (width, height, format) of the offending frame
        found: (usize, usize, PixelFormat),
    },
    /// The stacker received the wrong number of frames
    #[error("stack window expects {expected} frames, got {found}")]
    StackSize {
        /// Configured window size
        expected: usize,
        /// Frames actually supplied
        found: usize,
    },
    /// A pixel buffer does not match its declared geometry
    #[error("frame buffer holds {actual} bytes, {expected} required for its dimensions")]
    InvalidFrame {
        /// Bytes required by width * height * channels
        expected: usize,
        /// Bytes supplied
        actual: usize,
    },
    /// Rejected configuration value
    #[error("invalid configuration: {0}")]
    Config(String),
    /// Image decoding or encoding failure
    #[error(transparent)]
    Image(#[from] image::ImageError),
    /// Filesystem failure
    #[error(transparent)]
    Io(#[from] std::io::Error),
    /// Configuration file could not be parsed
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    /// A pipeline thread panicked
    #[error("pipeline worker panicked: {0}")]
    WorkerPanic(String),
}

impl ScanError {
    /// Pipeline stage the error originates from, for diagnostics
    pub fn stage(&self) -> &'static str {
        match self {
            ScanError::DeviceUnavailable { .. } | ScanError::EndOfStream | ScanError::Capture(_) => {
                "frame source"
            }
            ScanError::DimensionMismatch { .. } | ScanError::StackSize { .. } => "frame stacker",
            ScanError::InvalidFrame { .. } | ScanError::Image(_) => "frame buffer",
            ScanError::Config(_) | ScanError::Json(_) => "configuration",
            ScanError::Io(_) => "filesystem",
            ScanError::WorkerPanic(_) => "orchestrator",
        }
    }

    /// Whether the error must stop the pipeline
    pub fn is_fatal(&self) -> bool {
        !matches!(self, ScanError::Capture(_))
    }
}

/// Failure inside one decoder backend
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The crop has no pixels
    #[error("cannot decode an empty image")]
    EmptyImage,
    /// Backend-specific failure
    #[error("{backend}: {message}")]
    Backend {
        /// Backend name
        backend: String,
        /// Backend diagnostic
        message: String,
    },
}

/// Failure inside the enhancer
#[derive(Debug, Error)]
pub enum EnhanceError {
    /// Scale factor outside `1..=MAX_UPSCALE`
    #[error("upscale factor must be between 1 and 16, got {0}")]
    InvalidScale(u32),
    /// The crop has no pixels
    #[error("cannot enhance an empty crop")]
    EmptyCrop,
    /// The model resource could not be loaded
    #[error("upscaling model unavailable: {0}")]
    ModelUnavailable(String),
    /// The model ran but failed
    #[error("upscaling model failed: {0}")]
    Model(String),
}
