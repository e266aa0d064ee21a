//! Overlay drawing for the display sink

use super::sink::RegionResult;
use crate::models::{BoundingBox, CandidateRegion, Frame};
use ab_glyph::{FontVec, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, warn};

const DECODED: Rgb<u8> = Rgb([0, 255, 0]);
const CANDIDATE: Rgb<u8> = Rgb([128, 128, 128]);
const LABEL_SCALE: f32 = 18.0;

/// Overlay options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnnotationConfig {
    /// TrueType/OpenType font for labels; boxes only when unset
    pub font: Option<PathBuf>,
    /// Also outline regions that produced no result
    pub draw_candidates: bool,
}

impl Default for AnnotationConfig {
    fn default() -> Self {
        Self {
            font: None,
            draw_candidates: true,
        }
    }
}

/// Draws region outlines and `"text (symbology)"` labels
pub struct Annotator {
    font: Option<FontVec>,
    draw_candidates: bool,
}

impl Annotator {
    /// Load the label font; labels are skipped when it cannot be read
    pub fn new(config: &AnnotationConfig) -> Self {
        let font = config.font.as_ref().and_then(|path| {
            let loaded = std::fs::read(path)
                .map_err(|e| e.to_string())
                .and_then(|bytes| FontVec::try_from_vec(bytes).map_err(|e| e.to_string()));
            match loaded {
                Ok(font) => Some(font),
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "cannot load label font");
                    None
                }
            }
        });
        if font.is_none() {
            debug!("annotating without labels");
        }
        Self {
            font,
            draw_candidates: config.draw_candidates,
        }
    }

    fn outline(image: &mut RgbImage, bbox: &BoundingBox, color: Rgb<u8>) {
        let bbox = bbox.clamp_to(image.width() as usize, image.height() as usize);
        if bbox.width == 0 || bbox.height == 0 {
            return;
        }
        let rect = Rect::at(bbox.x as i32, bbox.y as i32).of_size(bbox.width as u32, bbox.height as u32);
        draw_hollow_rect_mut(image, rect, color);
        // Second ring for a 2px stroke
        if bbox.width > 2 && bbox.height > 2 {
            let inner = Rect::at(bbox.x as i32 + 1, bbox.y as i32 + 1)
                .of_size(bbox.width as u32 - 2, bbox.height as u32 - 2);
            draw_hollow_rect_mut(image, inner, color);
        }
    }

    /// RGB copy of `frame` with the cycle's regions drawn on it
    pub fn annotate(
        &self,
        frame: &Frame,
        regions: &[CandidateRegion],
        results: &[RegionResult],
    ) -> RgbImage {
        let mut image = frame.to_rgb_image();
        for region in regions {
            let first = results.iter().find(|r| r.region_id == region.id);
            match first {
                Some(hit) => {
                    Self::outline(&mut image, &region.bbox, DECODED);
                    if let Some(font) = &self.font {
                        let y = region.bbox.y as i32 - LABEL_SCALE as i32 - 2;
                        draw_text_mut(
                            &mut image,
                            DECODED,
                            region.bbox.x as i32,
                            y.max(0),
                            PxScale::from(LABEL_SCALE),
                            font,
                            &hit.result.label(),
                        );
                    }
                }
                None if self.draw_candidates => Self::outline(&mut image, &region.bbox, CANDIDATE),
                None => {}
            }
        }
        image
    }
}

impl Default for Annotator {
    fn default() -> Self {
        Self::new(&AnnotationConfig::default())
    }
}
