//! Crop upscaling before decoding
//!
//! Two strategies sit behind the [`Enhancer`] trait: deterministic cubic
//! interpolation, always available, and a learned model that falls back to
//! interpolation whenever it fails. [`SuperResolver`] picks one from config.

/// ONNX Runtime model backend
#[cfg(feature = "onnx")]
pub mod onnx;

use crate::error::EnhanceError;
use crate::models::{Frame, PixelFormat};
use image::imageops::{self, FilterType};
use image::{GrayImage, RgbImage};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, warn};

/// Upscales a crop by an integer factor
pub trait Enhancer: Send + Sync {
    /// Short name for logs
    fn name(&self) -> &str;

    /// Crop resized to exactly `(width * scale, height * scale)`
    fn enhance(&self, crop: &Frame, scale: u32) -> Result<Frame, EnhanceError>;
}

/// Largest upscale factor any enhancer accepts
pub const MAX_UPSCALE: u32 = 16;

fn check_input(crop: &Frame, scale: u32) -> Result<(), EnhanceError> {
    if scale == 0 || scale > MAX_UPSCALE {
        return Err(EnhanceError::InvalidScale(scale));
    }
    if crop.is_empty() {
        return Err(EnhanceError::EmptyCrop);
    }
    Ok(())
}

/// Catmull-Rom resize of a frame to an exact size
pub(crate) fn resize_frame(frame: &Frame, width: u32, height: u32) -> Result<Frame, EnhanceError> {
    let (w, h) = (frame.width() as u32, frame.height() as u32);
    let data = match frame.format() {
        PixelFormat::Gray8 => {
            let image = GrayImage::from_raw(w, h, frame.data().to_vec()).ok_or(EnhanceError::EmptyCrop)?;
            imageops::resize(&image, width, height, FilterType::CatmullRom).into_raw()
        }
        // Channel order does not matter to the filter
        PixelFormat::Rgb8 | PixelFormat::Bgr8 => {
            let image = RgbImage::from_raw(w, h, frame.data().to_vec()).ok_or(EnhanceError::EmptyCrop)?;
            imageops::resize(&image, width, height, FilterType::CatmullRom).into_raw()
        }
    };
    Frame::new(width as usize, height as usize, frame.format(), data)
        .map(|f| f.with_timestamp(frame.captured_at()))
        .map_err(|e| EnhanceError::Model(e.to_string()))
}

/// Cubic interpolation upscaling
#[derive(Debug, Clone, Copy, Default)]
pub struct InterpolationEnhancer;

impl Enhancer for InterpolationEnhancer {
    fn name(&self) -> &str {
        "interpolation"
    }

    fn enhance(&self, crop: &Frame, scale: u32) -> Result<Frame, EnhanceError> {
        check_input(crop, scale)?;
        if scale == 1 {
            return Ok(crop.clone());
        }
        resize_frame(
            crop,
            crop.width() as u32 * scale,
            crop.height() as u32 * scale,
        )
    }
}

/// A learned upscaler with a fixed native factor
pub trait UpscaleModel: Send + Sync {
    /// Factor the model was trained for
    fn native_scale(&self) -> u32;

    /// Run the model once over a crop
    fn upscale(&self, crop: &Frame) -> Result<Frame, EnhanceError>;
}

/// Model-backed upscaling with interpolation fallback
pub struct ModelEnhancer {
    model: Box<dyn UpscaleModel>,
    fallback: InterpolationEnhancer,
}

impl ModelEnhancer {
    /// Wrap a model; interpolation covers its failures
    pub fn new(model: Box<dyn UpscaleModel>) -> Self {
        Self {
            model,
            fallback: InterpolationEnhancer,
        }
    }

    fn try_model(&self, crop: &Frame, scale: u32) -> Result<Frame, EnhanceError> {
        let target_w = crop.width() as u32 * scale;
        let target_h = crop.height() as u32 * scale;
        let out = self.model.upscale(crop)?;
        if out.format() != crop.format() {
            return Err(EnhanceError::Model(format!(
                "model returned {:?} for a {:?} crop",
                out.format(),
                crop.format()
            )));
        }
        if out.is_empty() {
            return Err(EnhanceError::Model("model returned an empty image".into()));
        }
        if (out.width() as u32, out.height() as u32) == (target_w, target_h) {
            return Ok(out);
        }
        debug!(
            native = self.model.native_scale(),
            requested = scale,
            "resizing model output to the requested factor"
        );
        resize_frame(&out, target_w, target_h)
    }
}

impl Enhancer for ModelEnhancer {
    fn name(&self) -> &str {
        "model"
    }

    fn enhance(&self, crop: &Frame, scale: u32) -> Result<Frame, EnhanceError> {
        check_input(crop, scale)?;
        match self.try_model(crop, scale) {
            Ok(frame) => Ok(frame),
            Err(err) => {
                warn!(error = %err, "upscaling model failed, using interpolation");
                self.fallback.enhance(crop, scale)
            }
        }
    }
}

/// How the upscale factor is chosen per crop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum UpscalePolicy {
    /// Same factor for every crop
    Fixed {
        /// Upscale factor
        factor: u32,
    },
    /// Bring the longer side to about `target` pixels, capped at `max`
    Adaptive {
        /// Desired size of the longer side
        target: u32,
        /// Largest factor applied
        max: u32,
    },
}

impl Default for UpscalePolicy {
    fn default() -> Self {
        UpscalePolicy::Fixed { factor: 2 }
    }
}

impl UpscalePolicy {
    /// Factor for a crop of the given size, within `1..=MAX_UPSCALE`
    pub fn scale_for(&self, width: usize, height: usize) -> u32 {
        match *self {
            UpscalePolicy::Fixed { factor } => factor.clamp(1, MAX_UPSCALE),
            UpscalePolicy::Adaptive { target, max } => {
                let longest = width.max(height).max(1) as u32;
                (target / longest).clamp(1, max.clamp(1, MAX_UPSCALE))
            }
        }
    }
}

/// Which enhancer the pipeline should use
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EnhancerKind {
    /// Cubic interpolation
    #[default]
    Interpolation,
    /// ONNX super-resolution model
    Model {
        /// Model file
        path: PathBuf,
        /// Factor the model was trained for
        native_scale: u32,
    },
}

/// Enhancer selected from configuration
pub struct SuperResolver {
    inner: Box<dyn Enhancer>,
}

impl SuperResolver {
    /// Resolver around any enhancer
    pub fn new(inner: Box<dyn Enhancer>) -> Self {
        Self { inner }
    }

    /// Build the configured enhancer; a model that cannot be loaded degrades
    /// to interpolation with a warning
    pub fn from_kind(kind: &EnhancerKind) -> Self {
        match kind {
            EnhancerKind::Interpolation => Self::new(Box::new(InterpolationEnhancer)),
            EnhancerKind::Model { path, native_scale } => match load_model(path, *native_scale) {
                Ok(model) => {
                    debug!(path = %path.display(), "loaded upscaling model");
                    Self::new(Box::new(ModelEnhancer::new(model)))
                }
                Err(err) => {
                    warn!(error = %err, "falling back to interpolation upscaling");
                    Self::new(Box::new(InterpolationEnhancer))
                }
            },
        }
    }
}

impl Enhancer for SuperResolver {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn enhance(&self, crop: &Frame, scale: u32) -> Result<Frame, EnhanceError> {
        self.inner.enhance(crop, scale)
    }
}

impl Default for SuperResolver {
    fn default() -> Self {
        Self::from_kind(&EnhancerKind::Interpolation)
    }
}

#[cfg(feature = "onnx")]
fn load_model(path: &std::path::Path, native_scale: u32) -> Result<Box<dyn UpscaleModel>, EnhanceError> {
    Ok(Box::new(onnx::OnnxUpscaler::load(path, native_scale)?))
}

#[cfg(not(feature = "onnx"))]
fn load_model(path: &std::path::Path, _native_scale: u32) -> Result<Box<dyn UpscaleModel>, EnhanceError> {
    Err(EnhanceError::ModelUnavailable(format!(
        "{} (built without the `onnx` feature)",
        path.display()
    )))
}
