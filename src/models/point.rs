use serde::{Deserialize, Serialize};

/// 2D point with floating point coordinates
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    /// X coordinate
    pub x: f32,
    /// Y coordinate
    pub y: f32,
}

impl Point {
    /// Create a new point
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Map a point from an upscaled crop back into frame coordinates
    pub fn unscale(&self, scale: f32, origin_x: f32, origin_y: f32) -> Self {
        Self {
            x: self.x / scale + origin_x,
            y: self.y / scale + origin_y,
        }
    }
}

impl From<PointI> for Point {
    fn from(p: PointI) -> Self {
        Self::new(p.x as f32, p.y as f32)
    }
}

/// Integer point for pixel coordinates (contour tracing)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PointI {
    /// X coordinate
    pub x: i32,
    /// Y coordinate
    pub y: i32,
}

impl PointI {
    /// Create a new integer point
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Neighbor in direction (dx, dy)
    pub fn offset(&self, dx: i32, dy: i32) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unscale() {
        let p = Point::new(40.0, 20.0).unscale(2.0, 100.0, 50.0);
        assert_eq!(p, Point::new(120.0, 60.0));
    }
}
