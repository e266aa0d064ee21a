use super::Decoder;
use crate::error::DecodeError;
use crate::models::{DecodedResult, Frame, Point, Symbology};
use rxing::{BarcodeFormat, DecodeHints};
use std::collections::HashSet;
use tracing::trace;

/// Linear symbologies read by [`RxingDecoder::linear`]
pub const LINEAR_FORMATS: [BarcodeFormat; 9] = [
    BarcodeFormat::CODE_128,
    BarcodeFormat::CODE_39,
    BarcodeFormat::CODE_93,
    BarcodeFormat::CODABAR,
    BarcodeFormat::EAN_8,
    BarcodeFormat::EAN_13,
    BarcodeFormat::UPC_A,
    BarcodeFormat::UPC_E,
    BarcodeFormat::ITF,
];

/// rxing reader restricted to a set of symbologies
#[derive(Debug, Clone)]
pub struct RxingDecoder {
    name: String,
    formats: Vec<BarcodeFormat>,
}

impl RxingDecoder {
    /// Decoder for an explicit symbology list
    pub fn with_formats(name: impl Into<String>, formats: Vec<BarcodeFormat>) -> Self {
        Self {
            name: name.into(),
            formats,
        }
    }

    /// Data Matrix only
    pub fn data_matrix() -> Self {
        Self::with_formats("rxing-datamatrix", vec![BarcodeFormat::DATA_MATRIX])
    }

    /// Common 1D retail and logistics codes
    pub fn linear() -> Self {
        Self::with_formats("rxing-linear", LINEAR_FORMATS.to_vec())
    }

    /// Symbologies this decoder looks for
    pub fn formats(&self) -> &[BarcodeFormat] {
        &self.formats
    }

    fn hints(&self) -> DecodeHints {
        DecodeHints {
            PossibleFormats: Some(self.formats.iter().cloned().collect::<HashSet<_>>()),
            TryHarder: Some(true),
            ..Default::default()
        }
    }
}

/// Map an rxing format onto the crate's symbology names
pub fn symbology_of(format: &BarcodeFormat) -> Symbology {
    match format {
        BarcodeFormat::QR_CODE => Symbology::QrCode,
        BarcodeFormat::DATA_MATRIX => Symbology::DataMatrix,
        BarcodeFormat::AZTEC => Symbology::Aztec,
        BarcodeFormat::PDF_417 => Symbology::Pdf417,
        BarcodeFormat::CODE_128 => Symbology::Code128,
        BarcodeFormat::CODE_39 => Symbology::Code39,
        BarcodeFormat::CODE_93 => Symbology::Code93,
        BarcodeFormat::CODABAR => Symbology::Codabar,
        BarcodeFormat::EAN_8 => Symbology::Ean8,
        BarcodeFormat::EAN_13 => Symbology::Ean13,
        BarcodeFormat::UPC_A => Symbology::UpcA,
        BarcodeFormat::UPC_E => Symbology::UpcE,
        BarcodeFormat::ITF => Symbology::Itf,
        other => Symbology::Other(format!("{other:?}")),
    }
}

impl Decoder for RxingDecoder {
    fn name(&self) -> &str {
        &self.name
    }

    fn try_decode(&self, crop: &Frame) -> Result<Vec<DecodedResult>, DecodeError> {
        if crop.is_empty() {
            return Err(DecodeError::EmptyImage);
        }
        let gray = crop.to_gray();
        let (w, h) = (gray.width() as u32, gray.height() as u32);
        let luma = gray.into_data();

        // An empty hint set would let rxing try every format
        if self.formats.is_empty() {
            return Ok(Vec::new());
        }

        let mut hints: rxing::DecodingHintDictionary = self.hints().into();
        match rxing::helpers::detect_in_luma_with_hints(luma, w, h, None, &mut hints) {
            Ok(found) => {
                let polygon: Vec<Point> = found
                    .getPoints()
                    .iter()
                    .map(|p| Point::new(p.x, p.y))
                    .collect();
                let mut result = DecodedResult::new(
                    found.getText(),
                    symbology_of(found.getBarcodeFormat()),
                    self.name.as_str(),
                );
                if !polygon.is_empty() {
                    result = result.with_polygon(polygon);
                }
                Ok(vec![result])
            }
            // Not finding a code is the common case
            Err(err) => {
                trace!(decoder = %self.name, error = %err, "no symbol");
                Ok(Vec::new())
            }
        }
    }
}
