use super::Point;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Encoding family of a decoded code
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Symbology {
    /// QR code
    QrCode,
    /// Data Matrix (ECC 200)
    DataMatrix,
    /// Aztec code
    Aztec,
    /// PDF417 stacked linear code
    Pdf417,
    /// Code 128
    Code128,
    /// Code 39
    Code39,
    /// Code 93
    Code93,
    /// Codabar
    Codabar,
    /// EAN-8
    Ean8,
    /// EAN-13
    Ean13,
    /// UPC-A
    UpcA,
    /// UPC-E
    UpcE,
    /// Interleaved 2 of 5
    Itf,
    /// Anything else a backend reports
    Other(String),
}

impl fmt::Display for Symbology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Symbology::QrCode => "QRCODE",
            Symbology::DataMatrix => "DATAMATRIX",
            Symbology::Aztec => "AZTEC",
            Symbology::Pdf417 => "PDF417",
            Symbology::Code128 => "CODE128",
            Symbology::Code39 => "CODE39",
            Symbology::Code93 => "CODE93",
            Symbology::Codabar => "CODABAR",
            Symbology::Ean8 => "EAN8",
            Symbology::Ean13 => "EAN13",
            Symbology::UpcA => "UPCA",
            Symbology::UpcE => "UPCE",
            Symbology::Itf => "ITF",
            Symbology::Other(name) => name,
        };
        f.write_str(name)
    }
}

/// One payload read from a crop
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecodedResult {
    /// Payload as UTF-8 text
    pub text: String,
    /// Encoding family
    pub symbology: Symbology,
    /// Backend confidence, when reported
    pub confidence: Option<f32>,
    /// Corners of the code; crop coordinates until the pipeline maps them
    pub polygon: Option<Vec<Point>>,
    /// Backend that produced the result
    pub backend: String,
}

impl DecodedResult {
    /// Result without confidence or location
    pub fn new(text: impl Into<String>, symbology: Symbology, backend: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            symbology,
            confidence: None,
            polygon: None,
            backend: backend.into(),
        }
    }

    /// Attach a corner polygon
    pub fn with_polygon(mut self, polygon: Vec<Point>) -> Self {
        self.polygon = Some(polygon);
        self
    }

    /// Attach a confidence score
    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = Some(confidence);
        self
    }

    /// Map the polygon out of an upscaled crop into frame coordinates
    pub fn into_frame_coordinates(mut self, scale: u32, origin_x: usize, origin_y: usize) -> Self {
        if let Some(polygon) = self.polygon.as_mut() {
            for p in polygon.iter_mut() {
                *p = p.unscale(scale as f32, origin_x as f32, origin_y as f32);
            }
        }
        self
    }

    /// Overlay label, e.g. `"ABC123 (DATAMATRIX)"`
    pub fn label(&self) -> String {
        format!("{} ({})", self.text, self.symbology)
    }
}
