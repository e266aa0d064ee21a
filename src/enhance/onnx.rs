//! ONNX Runtime super-resolution model

use super::UpscaleModel;
use crate::error::EnhanceError;
use crate::models::{Frame, PixelFormat};
use ort::session::Session;
use ort::value::Tensor;
use std::path::Path;
use std::sync::Mutex;

/// Single-input, single-output image-to-image network
///
/// Input is NCHW float in [0, 1] with one channel for gray crops and three
/// for color crops; the output is expected in the same layout.
pub struct OnnxUpscaler {
    session: Mutex<Session>,
    input_name: String,
    native_scale: u32,
}

fn model_err(err: impl std::fmt::Display) -> EnhanceError {
    EnhanceError::Model(err.to_string())
}

impl OnnxUpscaler {
    /// Load a model file
    pub fn load(path: &Path, native_scale: u32) -> Result<Self, EnhanceError> {
        let session = Session::builder()
            .and_then(|builder| builder.commit_from_file(path))
            .map_err(|e| EnhanceError::ModelUnavailable(format!("{}: {e}", path.display())))?;
        let input_name = session
            .inputs
            .first()
            .map(|input| input.name.clone())
            .ok_or_else(|| EnhanceError::ModelUnavailable("model declares no inputs".into()))?;
        Ok(Self {
            session: Mutex::new(session),
            input_name,
            native_scale: native_scale.max(1),
        })
    }
}

impl UpscaleModel for OnnxUpscaler {
    fn native_scale(&self) -> u32 {
        self.native_scale
    }

    fn upscale(&self, crop: &Frame) -> Result<Frame, EnhanceError> {
        let (w, h, c) = (crop.width(), crop.height(), crop.channels());
        let plane = w * h;
        let mut input = vec![0f32; c * plane];
        for (idx, px) in crop.data().chunks_exact(c).enumerate() {
            for (ch, &v) in px.iter().enumerate() {
                input[ch * plane + idx] = v as f32 / 255.0;
            }
        }
        let tensor = Tensor::from_array(([1usize, c, h, w], input.into_boxed_slice())).map_err(model_err)?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| EnhanceError::Model("session lock poisoned".into()))?;
        let outputs = session
            .run(ort::inputs![self.input_name.as_str() => tensor])
            .map_err(model_err)?;
        let (_, value) = outputs
            .iter()
            .next()
            .ok_or_else(|| EnhanceError::Model("model produced no outputs".into()))?;
        let (shape, data) = value.try_extract_tensor::<f32>().map_err(model_err)?;

        let dims: Vec<i64> = shape.iter().copied().collect();
        let [_, out_c, out_h, out_w] = dims[..] else {
            return Err(EnhanceError::Model(format!("unexpected output shape {dims:?}")));
        };
        let (out_c, out_h, out_w) = (out_c as usize, out_h as usize, out_w as usize);
        if out_c != c {
            return Err(EnhanceError::Model(format!(
                "model returned {out_c} channels for a {c}-channel crop"
            )));
        }

        let out_plane = out_w * out_h;
        if data.len() < out_c * out_plane {
            return Err(EnhanceError::Model("output tensor shorter than its shape".into()));
        }
        let mut pixels = vec![0u8; out_c * out_plane];
        for idx in 0..out_plane {
            for ch in 0..out_c {
                pixels[idx * out_c + ch] = (data[ch * out_plane + idx] * 255.0).round().clamp(0.0, 255.0) as u8;
            }
        }
        let format = if out_c == 1 { PixelFormat::Gray8 } else { crop.format() };
        Frame::new(out_w, out_h, format, pixels)
            .map(|f| f.with_timestamp(crop.captured_at()))
            .map_err(model_err)
    }
}
