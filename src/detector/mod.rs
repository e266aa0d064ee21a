//! Candidate region detection
//!
//! This module finds areas of a stacked frame that are likely to hold a
//! printed code:
//! - Connected component labeling of the binarized frame
//! - Outer boundary tracing of external components
//! - Quadrilateral filtering by convexity, area and aspect ratio

/// Union-find labeling of 8-connected foreground
pub mod connected_components;
/// Moore-neighbor boundary tracing
pub mod contour;
/// Blur, threshold and shape filtering
pub mod region;

pub use region::{DetectorParams, RegionDetector};
