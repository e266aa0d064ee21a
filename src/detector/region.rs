//! Candidate region detection on stacked frames

use crate::detector::contour::find_external_contours;
use crate::error::{Result, ScanError};
use crate::models::{BitMatrix, BoundingBox, CandidateRegion, Frame, Point};
use crate::utils::binarization::{Polarity, ThresholdMode, binarize};
use crate::utils::filter::{gaussian_blur_5x5, morph_close};
use crate::utils::geometry::{approx_polygon, arc_length, is_convex, polygon_area};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

/// Shape filter and thresholding settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorParams {
    /// Polygon area must exceed this (square pixels)
    pub min_area: f32,
    /// Polygon area may not exceed this fraction of the frame
    pub max_area_fraction: f32,
    /// Optional accepted range of bounding box width / height
    pub aspect_ratio: Option<(f32, f32)>,
    /// Simplification tolerance as a fraction of the contour perimeter
    pub epsilon_fraction: f32,
    /// Binarization strategy
    pub threshold: ThresholdMode,
    /// Whether codes appear bright on dark or dark on bright
    pub polarity: Polarity,
    /// Closing passes after adaptive thresholding
    pub close_iterations: usize,
}

impl Default for DetectorParams {
    fn default() -> Self {
        Self {
            min_area: 100.0,
            max_area_fraction: 1.0,
            aspect_ratio: None,
            epsilon_fraction: 0.02,
            threshold: ThresholdMode::Otsu,
            polarity: Polarity::BrightOnDark,
            close_iterations: 2,
        }
    }
}

impl DetectorParams {
    /// Reject settings that cannot produce a sensible detector
    pub fn validate(&self) -> Result<()> {
        if !(self.epsilon_fraction > 0.0 && self.epsilon_fraction < 1.0) {
            return Err(ScanError::Config(format!(
                "detector.epsilon_fraction must be in (0, 1), got {}",
                self.epsilon_fraction
            )));
        }
        if self.min_area < 0.0 {
            return Err(ScanError::Config("detector.min_area must not be negative".into()));
        }
        if !(self.max_area_fraction > 0.0 && self.max_area_fraction <= 1.0) {
            return Err(ScanError::Config(format!(
                "detector.max_area_fraction must be in (0, 1], got {}",
                self.max_area_fraction
            )));
        }
        if let Some((lo, hi)) = self.aspect_ratio
            && (lo <= 0.0 || lo > hi)
        {
            return Err(ScanError::Config(format!(
                "detector.aspect_ratio range ({lo}, {hi}) is empty"
            )));
        }
        if let ThresholdMode::Adaptive { block_size, .. } = self.threshold
            && (block_size < 3 || block_size % 2 == 0)
        {
            return Err(ScanError::Config(format!(
                "adaptive block size must be odd and at least 3, got {block_size}"
            )));
        }
        Ok(())
    }
}

/// Finds quadrilateral high-contrast areas likely to hold a code
#[derive(Debug, Clone, Default)]
pub struct RegionDetector {
    params: DetectorParams,
}

impl RegionDetector {
    /// Detector with the given parameters
    pub fn new(params: DetectorParams) -> Self {
        Self { params }
    }

    /// Active parameters
    pub fn params(&self) -> &DetectorParams {
        &self.params
    }

    /// Blur and threshold a frame into a foreground mask
    pub fn binarize(&self, frame: &Frame) -> BitMatrix {
        let gray = frame.to_gray();
        let (w, h) = (gray.width(), gray.height());
        let blurred = gaussian_blur_5x5(gray.data(), w, h);
        let binary = binarize(&blurred, w, h, self.params.threshold, self.params.polarity);
        match self.params.threshold {
            ThresholdMode::Adaptive { .. } if self.params.close_iterations > 0 => {
                morph_close(&binary, self.params.close_iterations)
            }
            _ => binary,
        }
    }

    /// Candidate regions in detection order; never fails, may be empty
    pub fn detect(&self, frame: &Frame) -> Vec<CandidateRegion> {
        if frame.is_empty() {
            return Vec::new();
        }

        let binary = self.binarize(frame);
        let contours = find_external_contours(&binary);
        let frame_area = (frame.width() * frame.height()) as f32;
        let max_area = self.params.max_area_fraction * frame_area;

        let mut regions = Vec::new();
        for contour in &contours {
            if contour.len() < 4 {
                continue;
            }
            let epsilon = self.params.epsilon_fraction * arc_length(contour, true);
            let polygon = approx_polygon(contour, epsilon);
            if polygon.len() != 4 || !is_convex(&polygon) {
                continue;
            }

            let area = polygon_area(&polygon);
            if area <= self.params.min_area || area > max_area {
                trace!(area, "rejected quadrilateral by area");
                continue;
            }

            let corners = [
                Point::from(polygon[0]),
                Point::from(polygon[1]),
                Point::from(polygon[2]),
                Point::from(polygon[3]),
            ];
            let Some(bbox) = BoundingBox::enclosing(&corners) else {
                continue;
            };
            let aspect_ratio = bbox.aspect_ratio();
            if let Some((lo, hi)) = self.params.aspect_ratio
                && !(lo..=hi).contains(&aspect_ratio)
            {
                trace!(aspect_ratio, "rejected quadrilateral by aspect ratio");
                continue;
            }

            regions.push(CandidateRegion {
                id: regions.len(),
                bbox,
                corners,
                area,
                aspect_ratio,
            });
        }

        debug!(
            contours = contours.len(),
            regions = regions.len(),
            "region detection finished"
        );
        regions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PixelFormat;

    fn frame_with_block(w: usize, h: usize, x0: usize, y0: usize, side: usize) -> Frame {
        let mut data = vec![20u8; w * h];
        for y in y0..y0 + side {
            for x in x0..x0 + side {
                data[y * w + x] = 230;
            }
        }
        Frame::new(w, h, PixelFormat::Gray8, data).unwrap()
    }

    #[test]
    fn test_blank_frame_has_no_regions() {
        let frame = Frame::filled(64, 48, PixelFormat::Gray8, 128);
        assert!(RegionDetector::default().detect(&frame).is_empty());
    }

    #[test]
    fn test_small_square_below_min_area() {
        // 8x8 block: polygon area 49 < 100
        let frame = frame_with_block(64, 64, 20, 20, 8);
        assert!(RegionDetector::default().detect(&frame).is_empty());
    }

    #[test]
    fn test_block_detected() {
        let frame = frame_with_block(160, 120, 40, 30, 40);
        let regions = RegionDetector::default().detect(&frame);
        assert_eq!(regions.len(), 1);
        let truth = BoundingBox::new(40, 30, 40, 40);
        assert!(regions[0].bbox.iou(&truth) > 0.9);
        assert_eq!(regions[0].id, 0);
    }

    #[test]
    fn test_aspect_ratio_filter() {
        let params = DetectorParams {
            aspect_ratio: Some((2.0, 4.0)),
            ..DetectorParams::default()
        };
        let frame = frame_with_block(160, 120, 40, 30, 40);
        assert!(RegionDetector::new(params).detect(&frame).is_empty());
    }

    #[test]
    fn test_validate() {
        assert!(DetectorParams::default().validate().is_ok());
        let bad = DetectorParams {
            threshold: ThresholdMode::Adaptive {
                block_size: 10,
                offset: 2,
            },
            ..DetectorParams::default()
        };
        assert!(matches!(bad.validate(), Err(ScanError::Config(_))));
    }
}
