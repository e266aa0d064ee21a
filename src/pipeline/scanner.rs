//! One processing cycle: detect, enhance, decode and annotate

use super::annotate::Annotator;
use super::sink::{CycleOutput, RegionResult};
use crate::config::ScanConfig;
use crate::decoder::{DecoderFusion, DedupKey};
use crate::detector::RegionDetector;
use crate::enhance::{Enhancer, SuperResolver, UpscalePolicy};
use crate::models::{CandidateRegion, Frame};
use rayon::prelude::*;
use std::collections::HashSet;
use tracing::{debug, warn};

/// Stateless per-frame processing shared by the pipeline and still-image scans
pub struct Scanner {
    detector: RegionDetector,
    enhancer: Box<dyn Enhancer>,
    upscale: UpscalePolicy,
    fusion: DecoderFusion,
    annotator: Annotator,
    parallel_regions: bool,
}

impl Scanner {
    /// Assemble a scanner from its stages
    pub fn new(
        detector: RegionDetector,
        enhancer: Box<dyn Enhancer>,
        upscale: UpscalePolicy,
        fusion: DecoderFusion,
        annotator: Annotator,
    ) -> Self {
        Self {
            detector,
            enhancer,
            upscale,
            fusion,
            annotator,
            parallel_regions: false,
        }
    }

    /// Scanner with every stage built from configuration
    pub fn from_config(config: &ScanConfig) -> Self {
        Self::new(
            RegionDetector::new(config.detector.clone()),
            Box::new(SuperResolver::from_kind(&config.enhancer)),
            config.upscale,
            DecoderFusion::from_kinds(&config.decoders, config.dedup),
            Annotator::new(&config.annotation),
        )
        .with_parallel_regions(config.parallel_regions)
    }

    /// Decode regions on the rayon pool instead of one after another
    pub fn with_parallel_regions(mut self, parallel: bool) -> Self {
        self.parallel_regions = parallel;
        self
    }

    /// Replace the decoder registry
    pub fn with_fusion(mut self, fusion: DecoderFusion) -> Self {
        self.fusion = fusion;
        self
    }

    /// Region detector in use
    pub fn detector(&self) -> &RegionDetector {
        &self.detector
    }

    /// Crop, upscale and decode one region; results are in frame coordinates
    pub fn scan_region(&self, frame: &Frame, region: &CandidateRegion) -> Vec<RegionResult> {
        let crop = frame.crop(&region.bbox);
        let scale = self.upscale.scale_for(crop.width(), crop.height());
        let enhanced = match self.enhancer.enhance(&crop, scale) {
            Ok(enhanced) => enhanced,
            Err(err) => {
                warn!(region = region.id, error = %err, "skipping region");
                return Vec::new();
            }
        };

        self.fusion
            .decode(&enhanced)
            .into_iter()
            .map(|result| RegionResult {
                region_id: region.id,
                result: result.into_frame_coordinates(scale, region.bbox.x, region.bbox.y),
            })
            .collect()
    }

    /// Run a full cycle over a stacked frame
    pub fn process(&self, frame: &Frame, cycle: u64) -> CycleOutput {
        let regions = self.detector.detect(frame);

        let per_region: Vec<Vec<RegionResult>> = if self.parallel_regions {
            regions
                .par_iter()
                .map(|region| self.scan_region(frame, region))
                .collect()
        } else {
            regions
                .iter()
                .map(|region| self.scan_region(frame, region))
                .collect()
        };

        let results = dedup_across_regions(per_region, self.fusion.dedup_key());
        debug!(
            cycle,
            regions = regions.len(),
            results = results.len(),
            "processed stacked frame"
        );

        CycleOutput {
            cycle,
            captured_at: frame.captured_at(),
            annotated: self.annotator.annotate(frame, &regions, &results),
            regions,
            results,
        }
    }
}

/// Collapse repeats of one payload seen in several regions of a cycle;
/// the lowest region id wins
fn dedup_across_regions(per_region: Vec<Vec<RegionResult>>, key: DedupKey) -> Vec<RegionResult> {
    let mut seen = HashSet::new();
    per_region
        .into_iter()
        .flatten()
        .filter(|r| seen.insert(key.key_for(&r.result)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::Decoder;
    use crate::error::DecodeError;
    use crate::models::{DecodedResult, PixelFormat, Point, Symbology};

    /// Reports one payload with a polygon at the crop corners
    struct Corners;

    impl Decoder for Corners {
        fn name(&self) -> &str {
            "corners"
        }

        fn try_decode(&self, crop: &Frame) -> Result<Vec<DecodedResult>, DecodeError> {
            let (w, h) = (crop.width() as f32, crop.height() as f32);
            Ok(vec![DecodedResult::new("SAME", Symbology::DataMatrix, "corners")
                .with_polygon(vec![Point::new(0.0, 0.0), Point::new(w, h)])])
        }
    }

    fn two_blocks() -> Frame {
        let (w, h) = (200, 100);
        let mut data = vec![15u8; w * h];
        for (x0, y0) in [(20, 30), (120, 30)] {
            for y in y0..y0 + 40 {
                for x in x0..x0 + 40 {
                    data[y * w + x] = 240;
                }
            }
        }
        Frame::new(w, h, PixelFormat::Gray8, data).unwrap()
    }

    fn scanner(parallel: bool) -> Scanner {
        Scanner::from_config(&ScanConfig::default())
            .with_fusion(DecoderFusion::new(DedupKey::Text).with_backend(Box::new(Corners)))
            .with_parallel_regions(parallel)
    }

    #[test]
    fn test_cycle_dedups_across_regions() {
        for parallel in [false, true] {
            let output = scanner(parallel).process(&two_blocks(), 3);
            assert_eq!(output.cycle, 3);
            assert_eq!(output.regions.len(), 2);
            assert_eq!(output.results.len(), 1);
            assert_eq!(output.results[0].region_id, 0);
            assert_eq!(output.annotated.dimensions(), (200, 100));
        }
    }

    #[test]
    fn test_polygon_mapped_to_frame_coordinates() {
        let frame = two_blocks();
        let scanner = scanner(false);
        let regions = scanner.detector().detect(&frame);
        let results = scanner.scan_region(&frame, &regions[0]);
        let polygon = results[0].result.polygon.clone().unwrap();
        let bbox = regions[0].bbox;
        assert_eq!(polygon[0], Point::new(bbox.x as f32, bbox.y as f32));
        assert_eq!(
            polygon[1],
            Point::new((bbox.x + bbox.width) as f32, (bbox.y + bbox.height) as f32)
        );
    }
}
