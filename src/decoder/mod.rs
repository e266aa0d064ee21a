//! Decoder backends and result fusion
//!
//! Every backend implements [`Decoder`]. [`DecoderFusion`] runs an ordered
//! list of them over one crop, absorbs their failures and merges the results.

/// Data Matrix and linear codes through rxing
pub mod multi_format;
/// QR codes through rqrr
pub mod qr;

pub use multi_format::RxingDecoder;
pub use qr::QrDecoder;

use crate::error::DecodeError;
use crate::models::{DecodedResult, Frame, Symbology};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::panic::{AssertUnwindSafe, catch_unwind};
use tracing::{debug, warn};

/// A symbology reader
///
/// Implementations must be stateless per call so one instance can serve
/// several regions at once.
pub trait Decoder: Send + Sync {
    /// Backend name used in logs and results
    fn name(&self) -> &str;

    /// Every payload found in the crop; an empty vector means nothing found
    fn try_decode(&self, crop: &Frame) -> Result<Vec<DecodedResult>, DecodeError>;
}

/// What makes two results duplicates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DedupKey {
    /// Same payload text
    #[default]
    Text,
    /// Same payload text and symbology
    TextAndSymbology,
}

impl DedupKey {
    /// Identity of a result under this key
    pub fn key_for(&self, result: &DecodedResult) -> (String, Option<Symbology>) {
        let symbology = match self {
            DedupKey::Text => None,
            DedupKey::TextAndSymbology => Some(result.symbology.clone()),
        };
        (result.text.clone(), symbology)
    }
}

/// Keep the first occurrence of each key, preserving order
pub fn dedup_results(results: Vec<DecodedResult>, key: DedupKey) -> Vec<DecodedResult> {
    let mut seen = HashSet::new();
    results
        .into_iter()
        .filter(|r| seen.insert(key.key_for(r)))
        .collect()
}

/// Built-in backends, selectable from configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecoderKind {
    /// rxing Data Matrix
    DataMatrix,
    /// rqrr QR
    Qr,
    /// rxing 1D codes
    Linear,
}

impl DecoderKind {
    /// Instantiate the backend
    pub fn build(self) -> Box<dyn Decoder> {
        match self {
            DecoderKind::DataMatrix => Box::new(RxingDecoder::data_matrix()),
            DecoderKind::Qr => Box::new(QrDecoder),
            DecoderKind::Linear => Box::new(RxingDecoder::linear()),
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Ordered decoder registry with per-crop deduplication
pub struct DecoderFusion {
    backends: Vec<Box<dyn Decoder>>,
    dedup: DedupKey,
}

impl DecoderFusion {
    /// Fusion with no backends registered
    pub fn new(dedup: DedupKey) -> Self {
        Self {
            backends: Vec::new(),
            dedup,
        }
    }

    /// Registry of the built-in backends, in the given order
    pub fn from_kinds(kinds: &[DecoderKind], dedup: DedupKey) -> Self {
        kinds
            .iter()
            .fold(Self::new(dedup), |fusion, kind| fusion.with_backend(kind.build()))
    }

    /// Append a backend; earlier backends win ties
    pub fn with_backend(mut self, backend: Box<dyn Decoder>) -> Self {
        self.backends.push(backend);
        self
    }

    /// Names of the registered backends, in order
    pub fn backend_names(&self) -> Vec<&str> {
        self.backends.iter().map(|b| b.name()).collect()
    }

    /// Duplicate criterion in use
    pub fn dedup_key(&self) -> DedupKey {
        self.dedup
    }

    /// Union of every backend's results, deduplicated
    ///
    /// Backend errors and panics count as "nothing found".
    pub fn decode(&self, crop: &Frame) -> Vec<DecodedResult> {
        let mut all = Vec::new();
        for backend in &self.backends {
            match catch_unwind(AssertUnwindSafe(|| backend.try_decode(crop))) {
                Ok(Ok(found)) => {
                    if !found.is_empty() {
                        debug!(backend = backend.name(), count = found.len(), "decoded");
                    }
                    all.extend(found);
                }
                Ok(Err(err)) => {
                    debug!(backend = backend.name(), error = %err, "decoder failed");
                }
                Err(payload) => {
                    warn!(
                        backend = backend.name(),
                        panic = %panic_message(payload.as_ref()),
                        "decoder panicked"
                    );
                }
            }
        }
        dedup_results(all, self.dedup)
    }
}
