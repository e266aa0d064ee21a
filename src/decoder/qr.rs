use super::Decoder;
use crate::error::DecodeError;
use crate::models::{DecodedResult, Frame, Point, Symbology};
use tracing::trace;

/// QR decoding through rqrr
#[derive(Debug, Clone, Copy, Default)]
pub struct QrDecoder;

impl Decoder for QrDecoder {
    fn name(&self) -> &str {
        "rqrr"
    }

    fn try_decode(&self, crop: &Frame) -> Result<Vec<DecodedResult>, DecodeError> {
        if crop.is_empty() {
            return Err(DecodeError::EmptyImage);
        }
        let gray = crop.to_gray();
        let (w, h) = (gray.width(), gray.height());
        let luma = gray.data();
        let mut prepared = rqrr::PreparedImage::prepare_from_greyscale(w, h, |x, y| luma[y * w + x]);
        let grids = prepared.detect_grids();

        let mut results = Vec::new();
        let mut last_error = None;
        for grid in &grids {
            match grid.decode() {
                Ok((_meta, content)) => {
                    let polygon = grid
                        .bounds
                        .iter()
                        .map(|p| Point::new(p.x as f32, p.y as f32))
                        .collect();
                    results.push(
                        DecodedResult::new(content, Symbology::QrCode, self.name())
                            .with_polygon(polygon),
                    );
                }
                Err(err) => {
                    trace!(error = %err, "rqrr grid failed to decode");
                    last_error = Some(err);
                }
            }
        }

        // A grid was found but nothing in the crop decoded
        match last_error {
            Some(err) if results.is_empty() => Err(DecodeError::Backend {
                backend: self.name().to_string(),
                message: err.to_string(),
            }),
            _ => Ok(results),
        }
    }
}
