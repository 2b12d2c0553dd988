//! Geometric primitives for stitched-grid reconstruction.
//!
//! This crate is intentionally small and purely geometric. It does *not*
//! depend on any concrete raster type; everything here operates on points
//! and returns `Option` for degenerate inputs.

use serde::{Deserialize, Serialize};

pub mod affine;
pub mod ellipse;
pub mod logger;
pub mod polygon;

pub use affine::Affine2;
pub use ellipse::fit_ellipse_center;
pub use polygon::{bounding_box, signed_area};

/// Integer grid coordinates (x, y) in reconstructed-grid space.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct GridIndex {
    pub x: i32,
    pub y: i32,
}

impl GridIndex {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Component-wise offset, used when propagating indices to neighbours.
    pub fn offset(self, dx: i32, dy: i32) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
        }
    }
}

impl std::fmt::Display for GridIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}
