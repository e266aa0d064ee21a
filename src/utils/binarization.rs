//! Binarization of grayscale frames into foreground / background
//!
//! Foreground is whatever the configured [`Polarity`] calls the code label:
//! bright labels on a dark background by default.

use crate::models::BitMatrix;
use serde::{Deserialize, Serialize};

/// Which side of the threshold counts as foreground
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Polarity {
    /// Pixels above the threshold are foreground
    #[default]
    BrightOnDark,
    /// Pixels at or below the threshold are foreground
    DarkOnBright,
}

impl Polarity {
    #[inline]
    fn foreground(self, above: bool) -> bool {
        match self {
            Polarity::BrightOnDark => above,
            Polarity::DarkOnBright => !above,
        }
    }
}

/// Thresholding strategy
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ThresholdMode {
    /// Global threshold chosen by Otsu's method
    #[default]
    Otsu,
    /// Local mean of a `block_size` square window, minus `offset`
    Adaptive {
        /// Odd window side length, at least 3
        block_size: usize,
        /// Subtracted from the local mean
        offset: i32,
    },
}

/// Otsu's threshold: pixels `<= t` form the dark class
///
/// Returns `None` when the image has a single intensity (no contrast).
pub fn otsu_threshold(gray: &[u8]) -> Option<u8> {
    let mut histogram = [0u64; 256];
    for &pixel in gray {
        histogram[pixel as usize] += 1;
    }

    let total = gray.len() as f64;
    let total_sum: f64 = histogram
        .iter()
        .enumerate()
        .map(|(i, &c)| i as f64 * c as f64)
        .sum();

    let mut weight_dark = 0.0;
    let mut sum_dark = 0.0;
    let mut best: Option<(u8, f64)> = None;

    // Cumulative sums make this a single pass over the histogram
    for t in 0..255usize {
        weight_dark += histogram[t] as f64;
        sum_dark += t as f64 * histogram[t] as f64;
        let weight_bright = total - weight_dark;
        if weight_dark == 0.0 || weight_bright == 0.0 {
            continue;
        }

        let mean_dark = sum_dark / weight_dark;
        let mean_bright = (total_sum - sum_dark) / weight_bright;
        let variance = weight_dark * weight_bright * (mean_dark - mean_bright).powi(2);

        if best.is_none_or(|(_, v)| variance > v) {
            best = Some((t as u8, variance));
        }
    }

    best.map(|(t, _)| t)
}

/// Binarize with Otsu's threshold; a flat image yields an empty matrix
pub fn otsu_binarize(gray: &[u8], width: usize, height: usize, polarity: Polarity) -> BitMatrix {
    match otsu_threshold(&gray[..width * height]) {
        Some(threshold) => threshold_binarize(gray, width, height, threshold, polarity),
        None => BitMatrix::new(width, height),
    }
}

/// Simple global threshold binarization (`v > threshold` is above)
pub fn threshold_binarize(
    gray: &[u8],
    width: usize,
    height: usize,
    threshold: u8,
    polarity: Polarity,
) -> BitMatrix {
    BitMatrix::from_fn(width, height, |x, y| {
        polarity.foreground(gray[y * width + x] > threshold)
    })
}

/// Local-mean threshold over a `block_size` window (clipped at the border)
///
/// A pixel is above when `v > mean - offset`.
pub fn adaptive_binarize(
    gray: &[u8],
    width: usize,
    height: usize,
    block_size: usize,
    offset: i32,
    polarity: Polarity,
) -> BitMatrix {
    if width == 0 || height == 0 {
        return BitMatrix::new(width, height);
    }

    // Integral image with a zero row and column in front
    let stride = width + 1;
    let mut integral = vec![0u64; stride * (height + 1)];
    for y in 0..height {
        let mut row_sum = 0u64;
        for x in 0..width {
            row_sum += gray[y * width + x] as u64;
            integral[(y + 1) * stride + x + 1] = integral[y * stride + x + 1] + row_sum;
        }
    }

    let radius = block_size / 2;
    BitMatrix::from_fn(width, height, |x, y| {
        let x0 = x.saturating_sub(radius);
        let y0 = y.saturating_sub(radius);
        let x1 = (x + radius + 1).min(width);
        let y1 = (y + radius + 1).min(height);
        let sum = integral[y1 * stride + x1] + integral[y0 * stride + x0]
            - integral[y0 * stride + x1]
            - integral[y1 * stride + x0];
        let count = ((x1 - x0) * (y1 - y0)) as f64;
        let mean = sum as f64 / count;
        let v = gray[y * width + x] as f64;
        polarity.foreground(v > mean - offset as f64)
    })
}

/// Dispatch on the configured mode
pub fn binarize(
    gray: &[u8],
    width: usize,
    height: usize,
    mode: ThresholdMode,
    polarity: Polarity,
) -> BitMatrix {
    match mode {
        ThresholdMode::Otsu => otsu_binarize(gray, width, height, polarity),
        ThresholdMode::Adaptive { block_size, offset } => {
            adaptive_binarize(gray, width, height, block_size, offset, polarity)
        }
    }
}
