//! Low-level image helpers shared by the detector and the stacker
//!
//! - Grayscale conversion (RGB/BGR to luminance)
//! - Binarization (Otsu's method, adaptive local mean, fixed threshold)
//! - Gaussian blur and binary morphology
//! - Polygon geometry for contour simplification

pub mod binarization;
pub mod filter;
pub mod geometry;
pub mod grayscale;
