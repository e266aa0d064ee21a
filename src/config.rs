//! Runtime configuration
//!
//! Layered as defaults, then an optional JSON file, then `SCAN_*` environment
//! variables, then command line flags. [`ScanConfig::validate`] runs before a
//! pipeline is built.

use crate::decoder::{DecoderKind, DedupKey};
use crate::detector::DetectorParams;
use crate::enhance::{EnhancerKind, MAX_UPSCALE, UpscalePolicy};
use crate::error::{Result, ScanError};
use crate::pipeline::AnnotationConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

fn parse_env_string(name: &str, default: String) -> String {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or(default)
}

fn parse_env_u32(name: &str, default: u32) -> u32 {
    std::env::var(name)
        .ok()
        .and_then(|v| v.trim().parse::<u32>().ok())
        .unwrap_or(default)
}

fn parse_env_usize(name: &str, default: usize) -> usize {
    std::env::var(name)
        .ok()
        .and_then(|v| v.trim().parse::<usize>().ok())
        .unwrap_or(default)
}

fn parse_env_f32(name: &str, default: f32) -> f32 {
    std::env::var(name)
        .ok()
        .and_then(|v| v.trim().parse::<f32>().ok())
        .unwrap_or(default)
}

fn parse_env_bool_u8(name: &str, default: bool) -> bool {
    std::env::var(name)
        .ok()
        .and_then(|v| v.trim().parse::<u8>().ok())
        .map(|v| v != 0)
        .unwrap_or(default)
}

/// Where frames come from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Camera index, `/dev/videoN`, image file or directory of images
    pub device: String,
    /// Requested capture width
    pub width: u32,
    /// Requested capture height
    pub height: u32,
    /// Consecutive capture errors tolerated before the source counts as failed
    pub max_consecutive_failures: u32,
    /// Times each still image is emitted in a row
    pub repeat: u32,
    /// Restart an image sequence at its end instead of finishing
    pub looping: bool,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            device: "0".to_string(),
            width: 1920,
            height: 1080,
            max_consecutive_failures: 10,
            repeat: 1,
            looping: false,
        }
    }
}

/// Full pipeline configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Where frames come from
    pub source: SourceConfig,
    /// Frames averaged per cycle; also the queue capacity
    pub stack_size: usize,
    /// Region detection settings
    pub detector: DetectorParams,
    /// Crop scale factor selection
    pub upscale: UpscalePolicy,
    /// Decoder backends in priority order
    pub decoders: Vec<DecoderKind>,
    /// Upscaling backend
    pub enhancer: EnhancerKind,
    /// Duplicate criterion within a crop and a cycle
    pub dedup: DedupKey,
    /// Decode regions of one cycle concurrently
    pub parallel_regions: bool,
    /// Upper bound on one wait for a full window
    pub poll_interval_ms: u64,
    /// Overlay drawing
    pub annotation: AnnotationConfig,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            source: SourceConfig::default(),
            stack_size: 5,
            detector: DetectorParams::default(),
            upscale: UpscalePolicy::default(),
            decoders: vec![DecoderKind::DataMatrix, DecoderKind::Qr, DecoderKind::Linear],
            enhancer: EnhancerKind::default(),
            dedup: DedupKey::default(),
            parallel_regions: false,
            poll_interval_ms: 10,
            annotation: AnnotationConfig::default(),
        }
    }
}

impl ScanConfig {
    /// Read a JSON file; missing keys keep their defaults
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Defaults or the given file, with environment overrides applied
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_json_file(path)?,
            None => Self::default(),
        };
        config.apply_env();
        Ok(config)
    }

    /// Apply `SCAN_*` environment overrides
    pub fn apply_env(&mut self) {
        self.source.device = parse_env_string("SCAN_DEVICE", std::mem::take(&mut self.source.device));
        self.source.width = parse_env_u32("SCAN_WIDTH", self.source.width);
        self.source.height = parse_env_u32("SCAN_HEIGHT", self.source.height);
        self.stack_size = parse_env_usize("SCAN_STACK_SIZE", self.stack_size);
        self.detector.min_area = parse_env_f32("SCAN_MIN_AREA", self.detector.min_area);
        if let Ok(v) = std::env::var("SCAN_UPSCALE")
            && let Ok(factor) = v.trim().parse::<u32>()
        {
            self.upscale = UpscalePolicy::Fixed { factor };
        }
        self.parallel_regions = parse_env_bool_u8("SCAN_PARALLEL", self.parallel_regions);
    }

    /// Reject values no pipeline can run with
    pub fn validate(&self) -> Result<()> {
        if self.source.width == 0 || self.source.height == 0 {
            return Err(ScanError::Config(format!(
                "frame size must be positive, got {}x{}",
                self.source.width, self.source.height
            )));
        }
        if self.stack_size == 0 {
            return Err(ScanError::Config("stack_size must be at least 1".into()));
        }
        if self.source.repeat == 0 {
            return Err(ScanError::Config("source.repeat must be at least 1".into()));
        }
        match self.upscale {
            UpscalePolicy::Fixed { factor: 0 } => {
                return Err(ScanError::Config("upscale factor must be at least 1".into()));
            }
            UpscalePolicy::Fixed { factor } if factor > MAX_UPSCALE => {
                return Err(ScanError::Config(format!(
                    "upscale factor {factor} exceeds {MAX_UPSCALE}"
                )));
            }
            UpscalePolicy::Adaptive { target, max } if target == 0 || max == 0 => {
                return Err(ScanError::Config(
                    "adaptive upscale needs a positive target and max".into(),
                ));
            }
            UpscalePolicy::Adaptive { max, .. } if max > MAX_UPSCALE => {
                return Err(ScanError::Config(format!(
                    "adaptive upscale max {max} exceeds {MAX_UPSCALE}"
                )));
            }
            _ => {}
        }
        if self.decoders.is_empty() {
            return Err(ScanError::Config("at least one decoder is required".into()));
        }
        self.detector.validate()
    }
}
