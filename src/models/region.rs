use super::Point;
use serde::{Deserialize, Serialize};

/// Axis-aligned box in pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Left edge
    pub x: usize,
    /// Top edge
    pub y: usize,
    /// Width in pixels
    pub width: usize,
    /// Height in pixels
    pub height: usize,
}

impl BoundingBox {
    /// Create a box from its top-left corner and size
    pub fn new(x: usize, y: usize, width: usize, height: usize) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Smallest box containing every point (inclusive pixel extents)
    pub fn enclosing(points: &[Point]) -> Option<Self> {
        let first = points.first()?;
        let (mut min_x, mut min_y, mut max_x, mut max_y) = (first.x, first.y, first.x, first.y);
        for p in &points[1..] {
            min_x = min_x.min(p.x);
            min_y = min_y.min(p.y);
            max_x = max_x.max(p.x);
            max_y = max_y.max(p.y);
        }
        let min_x = min_x.max(0.0).floor();
        let min_y = min_y.max(0.0).floor();
        let max_x = max_x.max(0.0).floor();
        let max_y = max_y.max(0.0).floor();
        Some(Self::new(
            min_x as usize,
            min_y as usize,
            (max_x - min_x) as usize + 1,
            (max_y - min_y) as usize + 1,
        ))
    }

    /// Area in pixels
    pub fn area(&self) -> usize {
        self.width * self.height
    }

    /// Exclusive right edge
    pub fn right(&self) -> usize {
        self.x + self.width
    }

    /// Exclusive bottom edge
    pub fn bottom(&self) -> usize {
        self.y + self.height
    }

    /// Width / height
    pub fn aspect_ratio(&self) -> f32 {
        if self.height == 0 {
            return 0.0;
        }
        self.width as f32 / self.height as f32
    }

    /// Intersection with the frame `[0, width) x [0, height)`
    pub fn clamp_to(&self, width: usize, height: usize) -> Self {
        let x = self.x.min(width);
        let y = self.y.min(height);
        Self::new(
            x,
            y,
            self.right().min(width) - x,
            self.bottom().min(height) - y,
        )
    }

    /// Overlapping area with another box
    pub fn intersection_area(&self, other: &BoundingBox) -> usize {
        let l = self.x.max(other.x);
        let r = self.right().min(other.right());
        let t = self.y.max(other.y);
        let b = self.bottom().min(other.bottom());
        r.saturating_sub(l) * b.saturating_sub(t)
    }

    /// Intersection over union
    pub fn iou(&self, other: &BoundingBox) -> f32 {
        let inter = self.intersection_area(other);
        let union = self.area() + other.area() - inter;
        if union == 0 {
            return 0.0;
        }
        inter as f32 / union as f32
    }
}

/// Area of a stacked frame judged likely to hold a code
///
/// Regions live for one processing cycle; `id` is the detection order within
/// that cycle and is how decode results are attributed back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateRegion {
    /// Detection order within the cycle
    pub id: usize,
    /// Axis-aligned bounds of the simplified polygon
    pub bbox: BoundingBox,
    /// Simplified quadrilateral in frame coordinates
    pub corners: [Point; 4],
    /// Polygon area in square pixels
    pub area: f32,
    /// Bounding box width / height
    pub aspect_ratio: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_iou_identical_and_disjoint() {
        let a = BoundingBox::new(10, 10, 20, 20);
        assert!((a.iou(&a) - 1.0).abs() < 1e-6);
        let b = BoundingBox::new(40, 40, 5, 5);
        assert_eq!(a.iou(&b), 0.0);
    }

    #[test]
    fn test_iou_half_overlap() {
        let a = BoundingBox::new(0, 0, 10, 10);
        let b = BoundingBox::new(5, 0, 10, 10);
        // 50 / 150
        assert!((a.iou(&b) - 1.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_enclosing_is_inclusive() {
        let pts = [Point::new(2.0, 3.0), Point::new(7.0, 3.0), Point::new(7.0, 9.0)];
        let bbox = BoundingBox::enclosing(&pts).unwrap();
        assert_eq!(bbox, BoundingBox::new(2, 3, 6, 7));
    }

    #[test]
    fn test_clamp_to_frame() {
        let bbox = BoundingBox::new(90, 10, 20, 20).clamp_to(100, 20);
        assert_eq!(bbox, BoundingBox::new(90, 10, 10, 10));
    }
}
