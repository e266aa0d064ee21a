//! codescan - real-time optical code scanning
//!
//! Frames from a camera or image source are averaged in small windows to
//! suppress sensor noise, searched for bright rectangular label regions,
//! upscaled and handed to several decoder backends whose results are merged.
//!
//! The [`pipeline::Pipeline`] runs this continuously against a
//! [`source::FrameSource`]; [`scan_image`] does the same for one still image.

#![warn(missing_docs)]
#![allow(clippy::missing_docs_in_private_items)]

/// Pipeline configuration and environment overrides
pub mod config;
/// Decoder backends and result fusion
pub mod decoder;
/// Candidate region detection (binarization, components, contours)
pub mod detector;
/// Crop upscaling before decoding
pub mod enhance;
/// Error types
pub mod error;
/// Core data structures (Frame, BitMatrix, regions, decoded results)
pub mod models;
/// Capture loop, scanner, annotation and sinks
pub mod pipeline;
/// Frame producers
pub mod source;
/// Temporal frame averaging
pub mod stacker;
/// Image loading and diagnostics helpers
pub mod tools;
/// Utility functions (grayscale, filters, binarization, polygon geometry)
pub mod utils;

pub use config::{ScanConfig, SourceConfig};
pub use decoder::{Decoder, DecoderFusion, DecoderKind, DedupKey};
pub use detector::{DetectorParams, RegionDetector};
pub use enhance::{Enhancer, SuperResolver, UpscalePolicy};
pub use error::{DecodeError, EnhanceError, Result, ScanError};
pub use models::{BoundingBox, CandidateRegion, DecodedResult, Frame, PixelFormat, Symbology};
pub use pipeline::{CycleOutput, Pipeline, PipelineHandle, PipelineReport, PipelineState, Scanner, Sink};
pub use stacker::FrameStacker;

/// Scan one still frame with every stage built from `config`
///
/// Runs detection, enhancement, decoding and annotation once; no stacking
/// is applied.
pub fn scan_image(frame: &Frame, config: &ScanConfig) -> Result<CycleOutput> {
    config.validate()?;
    let scanner = Scanner::from_config(config);
    Ok(scanner.process(frame, 0))
}

/// Candidate regions of an RGB buffer using default detector parameters
///
/// # Arguments
/// * `image` - Raw RGB bytes (3 bytes per pixel)
/// * `width` - Image width in pixels
/// * `height` - Image height in pixels
pub fn detect_regions(image: &[u8], width: usize, height: usize) -> Result<Vec<CandidateRegion>> {
    let frame = Frame::new(width, height, PixelFormat::Rgb8, image.to_vec())?;
    Ok(RegionDetector::default().detect(&frame))
}
