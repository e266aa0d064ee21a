pub mod decoded;
pub mod frame;
pub mod matrix;
pub mod point;
pub mod region;

pub use decoded::{DecodedResult, Symbology};
pub use frame::{Frame, PixelFormat};
pub use matrix::BitMatrix;
pub use point::{Point, PointI};
pub use region::{BoundingBox, CandidateRegion};
